//! Upload payload preparation.
//!
//! Buckets and file containers only accept gzip-compressed delimited files.
//! `.csv.gz` files are sent untouched, plain `.csv` files are compressed in
//! memory and sent as `<name>.csv.gz`.

use crate::transport::FilePart;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name used for the zero-byte upload of the truncate idiom.
pub const EMPTY_UPLOAD_NAME: &str = "empty";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// A zero-byte file.
    Empty,
    File(PathBuf),
}

impl From<PathBuf> for UploadSource {
    fn from(path: PathBuf) -> Self {
        UploadSource::File(path)
    }
}

impl From<&Path> for UploadSource {
    fn from(path: &Path) -> Self {
        UploadSource::File(path.to_path_buf())
    }
}

fn lower_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn is_compressed_csv(path: &Path) -> bool {
    lower_name(path).ends_with(".csv.gz")
}

pub fn is_plain_csv(path: &Path) -> bool {
    lower_name(path).ends_with(".csv")
}

/// Keeps the paths that exist and have a `.csv` or `.csv.gz` extension, in
/// their original order. Everything else is skipped with a warning.
pub fn resolve_file_list<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    if paths.is_empty() {
        warn!("File(s) must be specified.");
        return Vec::new();
    }

    let mut resolved = Vec::new();
    for path in paths.iter().map(AsRef::as_ref) {
        if !path.exists() {
            warn!(path = %path.display(), "file not found, skipping");
            continue;
        }
        if is_plain_csv(path) || is_compressed_csv(path) {
            resolved.push(path.to_path_buf());
        } else {
            warn!(path = %path.display(), "file is not a .csv or .csv.gz file, skipping");
        }
    }
    resolved
}

pub fn gzip(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Builds the multipart file part for one upload.
pub async fn prepare_upload(source: &UploadSource) -> io::Result<FilePart> {
    let path = match source {
        UploadSource::Empty => {
            return Ok(FilePart {
                filename: EMPTY_UPLOAD_NAME.to_string(),
                bytes: Vec::new(),
            })
        }
        UploadSource::File(path) => path,
    };

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", path.display()),
            )
        })?;
    let contents = tokio::fs::read(path).await?;

    if is_compressed_csv(path) {
        debug!(path = %path.display(), bytes = contents.len(), "uploading compressed file as-is");
        Ok(FilePart {
            filename,
            bytes: contents,
        })
    } else if is_plain_csv(path) {
        let compressed = gzip(&contents)?;
        debug!(
            path = %path.display(),
            raw_bytes = contents.len(),
            compressed_bytes = compressed.len(),
            "compressed csv for upload"
        );
        Ok(FilePart {
            filename: format!("{filename}.gz"),
            bytes: compressed,
        })
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a .csv or .csv.gz file", path.display()),
        ))
    }
}
