//
// models.rs
// Perphix-Deid
//
// Defines serializable data structures for field inspection, run summaries, and compliance reports.
//

use std::path::PathBuf;

use serde::Serialize;

use crate::case_id::CaseId;

/// The patient fields covered by the de-identification policy, as read from a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatientFields {
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub patient_birth_date: Option<String>,
    pub patient_address: Option<String>,
    pub military_rank: Option<String>,
    pub ethnic_group: Option<String>,
    pub pixel_data_sha256: Option<String>,
}

/// One file written by a directory run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Outcome of de-identifying a directory.
#[derive(Debug, Clone, Serialize)]
pub struct DeidentifySummary {
    pub case_id: CaseId,
    pub files_written: usize,
    pub files_skipped: usize,
    pub outputs: Vec<OutputRecord>,
}

/// Policy check for a single output file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub path: PathBuf,
    pub compliant: bool,
    pub violations: Vec<String>,
}

impl ComplianceReport {
    pub fn new(path: PathBuf, violations: Vec<String>) -> Self {
        Self {
            path,
            compliant: violations.is_empty(),
            violations,
        }
    }
}
