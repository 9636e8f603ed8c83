use std::path::Path;

use anyhow::{bail, Context, Result};
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject, InMemDicomObject};
use tracing::{info, warn};

use crate::case_id::CaseId;
use crate::deidentify::{is_policy_tag, DEIDENTIFIED_FIELDS};
use crate::dicom_access::ElementAccess;
use crate::discovery;
use crate::models::ComplianceReport;

/// Policy violations in a de-identified object. Empty when compliant.
pub fn check_policy<T: ElementAccess>(obj: &T, case_id: &CaseId) -> Vec<String> {
    let mut violations = Vec::new();
    for field in &DEIDENTIFIED_FIELDS {
        let expected = field.expected(case_id);
        match obj.element_str(field.tag) {
            None => violations.push(format!("{} is missing", field.keyword)),
            Some(actual) if actual != expected => violations.push(format!(
                "{} is {:?}, expected {:?}",
                field.keyword, actual, expected
            )),
            Some(_) => {}
        }
    }
    violations
}

/// Differences outside the policy fields between a source object and its de-identified copy.
pub fn compare_preserved(source: &InMemDicomObject, output: &InMemDicomObject) -> Vec<String> {
    let mut differences = Vec::new();
    let preserved = |tag: Tag| !is_policy_tag(tag) && tag != tags::PIXEL_DATA;

    for elem in source.iter() {
        let tag = elem.header().tag;
        if !preserved(tag) {
            continue;
        }
        match output.element(tag) {
            Ok(out) if out == elem => {}
            Ok(_) => differences.push(format!("{tag} differs from source")),
            Err(_) => differences.push(format!("{tag} missing from output")),
        }
    }
    for elem in output.iter() {
        let tag = elem.header().tag;
        if preserved(tag) && source.element(tag).is_err() {
            differences.push(format!("{tag} not present in source"));
        }
    }

    if source.pixel_fingerprint() != output.pixel_fingerprint() {
        differences.push("Pixel Data differs from source".to_string());
    }
    differences
}

fn compare_meta(source: &DefaultDicomObject, output: &DefaultDicomObject) -> Vec<String> {
    let (src, out) = (source.meta(), output.meta());
    let mut differences = Vec::new();
    if src.transfer_syntax() != out.transfer_syntax() {
        differences.push("Transfer Syntax differs from source".to_string());
    }
    if src.media_storage_sop_instance_uid != out.media_storage_sop_instance_uid {
        differences.push("Media Storage SOP Instance UID differs from source".to_string());
    }
    differences
}

/// Check one output file against the policy and, when given, its source file.
pub fn verify_file(path: &Path, case_id: &CaseId, source: Option<&Path>) -> Result<ComplianceReport> {
    let obj = open_file(path)
        .with_context(|| format!("Failed to open DICOM file {}", path.display()))?;
    let mut violations = check_policy(&obj, case_id);

    if let Some(source_path) = source {
        if source_path.is_file() {
            let src = open_file(source_path)
                .with_context(|| format!("Failed to open DICOM file {}", source_path.display()))?;
            violations.extend(compare_meta(&src, &obj));
            violations.extend(compare_preserved(&src, &obj));
        } else {
            violations.push(format!("no source file at {}", source_path.display()));
        }
    }

    Ok(ComplianceReport::new(path.to_path_buf(), violations))
}

/// Verify every DICOM file below `dir`. Sources are paired by relative path under `source_dir`.
pub fn verify_dir(
    dir: &Path,
    case_id: &CaseId,
    source_dir: Option<&Path>,
) -> Result<Vec<ComplianceReport>> {
    let found = discovery::find_dicom_files(dir)?;
    found
        .sources
        .iter()
        .map(|entry| {
            let source = source_dir.map(|root| root.join(&entry.relative));
            verify_file(&entry.path, case_id, source.as_deref())
        })
        .collect()
}

pub fn check_dir(dir: &Path, case_id: &CaseId, source_dir: Option<&Path>, json: bool) -> Result<()> {
    let reports = verify_dir(dir, case_id, source_dir)?;
    let failing = reports.iter().filter(|r| !r.compliant).count();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            if report.compliant {
                println!("OK      {}", report.path.display());
            } else {
                println!("FAILED  {}", report.path.display());
                for violation in &report.violations {
                    println!("          {violation}");
                }
            }
        }
        println!("{} file(s) checked, {} non-compliant", reports.len(), failing);
    }

    if failing > 0 {
        warn!(failing, "de-identification check failed");
        bail!("{failing} of {} file(s) are not compliant", reports.len());
    }
    info!(files = reports.len(), case = %case_id, "all files compliant");
    Ok(())
}
