//
// error.rs
// Perphix-Deid
//
// Error taxonomy for the de-identification library; the CLI wraps these with anyhow context.
//

use std::path::PathBuf;

use thiserror::Error;

use crate::case_id::InvalidCaseId;

pub type Result<T, E = DeidError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DeidError {
    #[error("input directory {} does not exist", .0.display())]
    InputNotFound(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error(
        "output {} must not be the input {} or lie inside it",
        .output.display(),
        .input.display()
    )]
    OutputInsideInput { input: PathBuf, output: PathBuf },

    #[error(
        "input directory {} must not lie inside the output directory {}",
        .input.display(),
        .output.display()
    )]
    InputInsideOutput { input: PathBuf, output: PathBuf },

    #[error(transparent)]
    InvalidCaseId(#[from] InvalidCaseId),

    #[error("unexpected file type: {}", .0.display())]
    UnexpectedFileType(PathBuf),

    #[error("failed to walk {}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read DICOM file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: dicom::object::ReadError,
    },

    #[error("failed to write DICOM file {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: dicom::object::WriteError,
    },
}

impl DeidError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeidError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while reshaping COCO-style annotation documents.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("annotation document has no `{0}` array")]
    MissingField(&'static str),

    #[error("image entry {index} has no `{field}`")]
    MalformedImage { index: usize, field: &'static str },

    #[error("image file name {0:?} does not end in task-activity-acquisition-frame labels")]
    MalformedFileName(String),

    #[error("unknown annotation category {0:?}")]
    UnknownAnnotationCategory(String),

    #[error("unknown {level} sequence category {name:?}")]
    UnknownSequenceCategory { level: &'static str, name: String },

    #[error("unknown category id {0}")]
    UnknownCategoryId(u32),
}
