//
// deidentify.rs
// Perphix-Deid
//
// Applies the fixed de-identification policy to DICOM objects, single files, and whole directory trees.
//

use std::fs;
use std::path::{Path, PathBuf};

use dicom::core::value::PrimitiveValue;
use dicom::core::{DataElement, Tag, VR};
use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject, InMemDicomObject};
use tracing::{debug, info};

use crate::case_id::CaseId;
use crate::discovery::{self, DicomSource};
use crate::error::{DeidError, Result};
use crate::models::{DeidentifySummary, OutputRecord};

/// Placeholder written to PatientName.
pub const ANONYMOUS_PATIENT_NAME: &str = "Anonymous";

/// What a policy field holds after processing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Placeholder,
    CaseId,
    Empty,
}

#[derive(Debug, Copy, Clone)]
pub struct PolicyField {
    pub tag: Tag,
    pub vr: VR,
    pub keyword: &'static str,
    pub value: FieldValue,
}

/// Every header field touched by de-identification. Anything else is left as read.
pub const DEIDENTIFIED_FIELDS: [PolicyField; 6] = [
    PolicyField {
        tag: tags::PATIENT_NAME,
        vr: VR::PN,
        keyword: "PatientName",
        value: FieldValue::Placeholder,
    },
    PolicyField {
        tag: tags::PATIENT_ID,
        vr: VR::LO,
        keyword: "PatientID",
        value: FieldValue::CaseId,
    },
    PolicyField {
        tag: tags::PATIENT_BIRTH_DATE,
        vr: VR::DA,
        keyword: "PatientBirthDate",
        value: FieldValue::Empty,
    },
    PolicyField {
        tag: tags::PATIENT_ADDRESS,
        vr: VR::LO,
        keyword: "PatientAddress",
        value: FieldValue::Empty,
    },
    PolicyField {
        tag: tags::MILITARY_RANK,
        vr: VR::LO,
        keyword: "MilitaryRank",
        value: FieldValue::Empty,
    },
    PolicyField {
        tag: tags::ETHNIC_GROUP,
        vr: VR::SH,
        keyword: "EthnicGroup",
        value: FieldValue::Empty,
    },
];

pub fn is_policy_tag(tag: Tag) -> bool {
    DEIDENTIFIED_FIELDS.iter().any(|f| f.tag == tag)
}

impl PolicyField {
    /// Expected text of the field once the policy has been applied.
    pub fn expected<'a>(&self, case_id: &'a CaseId) -> &'a str {
        match self.value {
            FieldValue::Placeholder => ANONYMOUS_PATIENT_NAME,
            FieldValue::CaseId => case_id.as_str(),
            FieldValue::Empty => "",
        }
    }
}

/// How output files are named inside the output tree.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum NamingScheme {
    /// Keep the source file name.
    #[default]
    Preserve,
    /// `<case>_<NNNN>.dcm`, numbered in walk order starting at 1.
    Case,
}

#[derive(Debug, Clone)]
pub struct DeidentifyOptions {
    pub case_id: CaseId,
    pub naming: NamingScheme,
}

impl DeidentifyOptions {
    pub fn new(case_id: CaseId) -> Self {
        Self {
            case_id,
            naming: NamingScheme::default(),
        }
    }

    pub fn with_naming(mut self, naming: NamingScheme) -> Self {
        self.naming = naming;
        self
    }
}

/// Overwrite the policy fields in place. Fields missing from the data set are inserted.
pub fn apply_policy(obj: &mut InMemDicomObject, case_id: &CaseId) {
    for field in &DEIDENTIFIED_FIELDS {
        let value = match field.value {
            FieldValue::Empty => PrimitiveValue::Empty,
            _ => PrimitiveValue::from(field.expected(case_id)),
        };
        obj.put(DataElement::new(field.tag, field.vr, value));
    }
}

/// De-identified copy of `obj`; the input is left untouched.
pub fn deidentify_object(obj: &DefaultDicomObject, case_id: &CaseId) -> DefaultDicomObject {
    let mut out = obj.clone();
    apply_policy(&mut out, case_id);
    out
}

/// Read one DICOM file, apply the policy and persist the result at `output`.
pub fn deidentify_file(input: &Path, output: &Path, case_id: &CaseId) -> Result<()> {
    if output.exists() && same_file(input, output)? {
        return Err(DeidError::OutputInsideInput {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        });
    }

    let mut obj = open_file(input).map_err(|source| DeidError::Read {
        path: input.to_path_buf(),
        source,
    })?;

    apply_policy(&mut obj, case_id);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DeidError::io(parent, e))?;
    }
    obj.write_to_file(output).map_err(|source| DeidError::Write {
        path: output.to_path_buf(),
        source,
    })?;

    debug!(input = %input.display(), output = %output.display(), "de-identified file");
    Ok(())
}

/// De-identify every DICOM file below `input_dir`, mirroring the layout under `output_dir`.
///
/// Files without the DICOM magic are skipped. The run stops at the first
/// file that fails to read or write.
pub fn deidentify_dir(
    input_dir: &Path,
    output_dir: &Path,
    options: &DeidentifyOptions,
) -> Result<DeidentifySummary> {
    ensure_separate_trees(input_dir, output_dir)?;
    fs::create_dir_all(output_dir).map_err(|e| DeidError::io(output_dir, e))?;

    let found = discovery::find_dicom_files(input_dir)?;
    info!(
        input = %input_dir.display(),
        output = %output_dir.display(),
        case = %options.case_id,
        files = found.sources.len(),
        skipped = found.skipped,
        "de-identifying directory"
    );

    let mut outputs = Vec::with_capacity(found.sources.len());
    for (idx, source) in found.sources.iter().enumerate() {
        let destination = output_path(output_dir, source, idx + 1, options);
        deidentify_file(&source.path, &destination, &options.case_id)?;
        outputs.push(OutputRecord {
            source: source.path.clone(),
            destination,
        });
    }

    Ok(DeidentifySummary {
        case_id: options.case_id.clone(),
        files_written: outputs.len(),
        files_skipped: found.skipped,
        outputs,
    })
}

fn output_path(
    output_dir: &Path,
    source: &DicomSource,
    index: usize,
    options: &DeidentifyOptions,
) -> PathBuf {
    let mirrored = output_dir.join(&source.relative);
    match options.naming {
        NamingScheme::Preserve => mirrored,
        NamingScheme::Case => {
            mirrored.with_file_name(format!("{}_{:04}.dcm", options.case_id, index))
        }
    }
}

fn ensure_separate_trees(input_dir: &Path, output_dir: &Path) -> Result<()> {
    if !input_dir.exists() {
        return Err(DeidError::InputNotFound(input_dir.to_path_buf()));
    }
    if !input_dir.is_dir() {
        return Err(DeidError::NotADirectory(input_dir.to_path_buf()));
    }

    let input = input_dir
        .canonicalize()
        .map_err(|e| DeidError::io(input_dir, e))?;
    let output = canonical_prefix(output_dir)?;
    if output.starts_with(&input) {
        return Err(DeidError::OutputInsideInput {
            input: input_dir.to_path_buf(),
            output: output_dir.to_path_buf(),
        });
    }
    // mirrored destinations under an ancestor can land on source files
    if input.starts_with(&output) {
        return Err(DeidError::InputInsideOutput {
            input: input_dir.to_path_buf(),
            output: output_dir.to_path_buf(),
        });
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> Result<bool> {
    let a = a.canonicalize().map_err(|e| DeidError::io(a, e))?;
    let b = b.canonicalize().map_err(|e| DeidError::io(b, e))?;
    Ok(a == b)
}

/// Canonical form of a path that may not exist yet: resolve the deepest existing ancestor.
fn canonical_prefix(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| DeidError::io(path, e))?
            .join(path)
    };

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing
        .canonicalize()
        .map_err(|e| DeidError::io(existing, e))?;
    for name in rest.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}
