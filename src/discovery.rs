use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{DeidError, Result};

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";

/// A DICOM file found below a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DicomSource {
    pub path: PathBuf,
    /// Path relative to the walked root, used to mirror the layout on output.
    pub relative: PathBuf,
}

#[derive(Debug, Default)]
pub struct Discovered {
    pub sources: Vec<DicomSource>,
    /// Regular files that did not carry the DICOM magic.
    pub skipped: usize,
}

/// Whether the file has a Part 10 preamble followed by `DICM`.
pub fn is_dicom_file(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| DeidError::io(path, e))?;
    let mut header = [0_u8; PREAMBLE_LEN + 4];
    match file.read_exact(&mut header) {
        Ok(()) => Ok(&header[PREAMBLE_LEN..] == MAGIC),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(DeidError::io(path, e)),
    }
}

/// Recursively collect the DICOM files below `dir`, sorted by file name at each level.
pub fn find_dicom_files(dir: &Path) -> Result<Discovered> {
    if !dir.exists() {
        return Err(DeidError::InputNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(DeidError::NotADirectory(dir.to_path_buf()));
    }

    let mut found = Discovered::default();
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .min_depth(1);

    for entry in walker {
        let entry = entry.map_err(|source| DeidError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            return Err(DeidError::UnexpectedFileType(entry.path().to_path_buf()));
        }

        let path = entry.path();
        if !is_dicom_file(path)? {
            warn!(path = %path.display(), "skipping non-DICOM file");
            found.skipped += 1;
            continue;
        }

        // strip_prefix cannot fail: walkdir yields paths under the root it was given
        let relative = path.strip_prefix(dir).unwrap_or(path).to_path_buf();
        debug!(path = %path.display(), "found DICOM file");
        found.sources.push(DicomSource {
            path: path.to_path_buf(),
            relative,
        });
    }

    Ok(found)
}
