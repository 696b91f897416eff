//! Documents selected for upload.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Media type the ingestion service accepts.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";
const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// Errors raised while building a candidate from a path.
#[derive(Debug, Error)]
pub enum CandidateError {
    /// File metadata could not be read.
    #[error("failed to inspect {path}: {source}")]
    Io {
        /// Location of the selected file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Path does not point at a regular file.
    #[error("{0} is not a file")]
    NotAFile(PathBuf),
}

/// A file chosen for ingestion.
///
/// Not `Clone`. The upload orchestrator owns the selected candidate until the upload resolves.
#[derive(Debug, PartialEq, Eq)]
pub struct UploadCandidate {
    path: PathBuf,
    display_name: String,
    size: u64,
    media_type: String,
}

impl UploadCandidate {
    /// Describe a file with an explicitly declared media type.
    pub fn new(
        path: impl Into<PathBuf>,
        display_name: impl Into<String>,
        size: u64,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            display_name: display_name.into(),
            size,
            media_type: media_type.into(),
        }
    }

    /// Inspect a file on disk, declaring its media type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CandidateError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| CandidateError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if !metadata.is_file() {
            return Err(CandidateError::NotAFile(path.to_path_buf()));
        }
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(
            path,
            display_name,
            metadata.len(),
            declared_media_type(path),
        ))
    }

    /// Location of the file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name shown to the user and sent as the multipart filename.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Declared media type.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Whether the declared media type is PDF.
    pub fn is_pdf(&self) -> bool {
        self.media_type.eq_ignore_ascii_case(PDF_MEDIA_TYPE)
    }

    /// Human readable size, e.g. `1.50 MB`.
    pub fn size_label(&self) -> String {
        format!("{:.2} MB", self.size as f64 / 1024.0 / 1024.0)
    }
}

fn declared_media_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => PDF_MEDIA_TYPE,
        _ => FALLBACK_MEDIA_TYPE,
    }
}
