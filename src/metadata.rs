use std::path::Path;

use anyhow::{Context, Result};
use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject};

use crate::dicom_access::ElementAccess;
use crate::models::PatientFields;

pub fn extract_patient_fields<T: ElementAccess>(obj: &T) -> PatientFields {
    PatientFields {
        patient_name: obj.element_str(tags::PATIENT_NAME),
        patient_id: obj.element_str(tags::PATIENT_ID),
        patient_birth_date: obj.element_str(tags::PATIENT_BIRTH_DATE),
        patient_address: obj.element_str(tags::PATIENT_ADDRESS),
        military_rank: obj.element_str(tags::MILITARY_RANK),
        ethnic_group: obj.element_str(tags::ETHNIC_GROUP),
        pixel_data_sha256: obj.pixel_fingerprint(),
    }
}

pub fn read_patient_fields(path: &Path) -> Result<PatientFields> {
    let obj: DefaultDicomObject = open_file(path)
        .with_context(|| format!("Failed to open DICOM file {}", path.display()))?;
    Ok(extract_patient_fields(&obj))
}

pub fn print_info(path: &Path, json: bool) -> Result<()> {
    let fields = read_patient_fields(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
        return Ok(());
    }

    let show = |value: &Option<String>| match value.as_deref() {
        None => "<absent>".to_string(),
        Some("") => "<empty>".to_string(),
        Some(v) => v.to_string(),
    };

    println!("{}", "=".repeat(80));
    println!("DICOM File: {}", path.display());
    println!("{}", "=".repeat(80));
    println!("  PatientName:      {}", show(&fields.patient_name));
    println!("  PatientID:        {}", show(&fields.patient_id));
    println!("  PatientBirthDate: {}", show(&fields.patient_birth_date));
    println!("  PatientAddress:   {}", show(&fields.patient_address));
    println!("  MilitaryRank:     {}", show(&fields.military_rank));
    println!("  EthnicGroup:      {}", show(&fields.ethnic_group));
    println!("  Pixel Data:       {}", show(&fields.pixel_data_sha256));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.dcm");
        let err = read_patient_fields(&path).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Failed to open DICOM file {}", path.display())
        );
    }
}
