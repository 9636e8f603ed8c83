//
// lib.rs
// Perphix-Deid
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//

pub mod annotations;
pub mod case_id;
pub mod categories;
pub mod cli;
pub mod deidentify;
pub mod dicom_access;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod models;
pub mod validate;

pub use case_id::CaseId;
pub use cli::{run as run_cli, Cli, Commands};
pub use deidentify::{
    apply_policy, deidentify_dir, deidentify_file, deidentify_object, DeidentifyOptions,
    NamingScheme, ANONYMOUS_PATIENT_NAME,
};
pub use error::{DatasetError, DeidError, Result};
