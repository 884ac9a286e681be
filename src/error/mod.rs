use std::path::PathBuf;

use thiserror::Error;

pub type CanvasResult<T> = std::result::Result<T, CanvasError>;

/// Failures of the filesystem-facing surfaces. Interaction and rendering never
/// return these; they degrade to a skipped step instead.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("nothing to export: the document has zero area")]
    EmptyExport,
    #[error("no base image loaded")]
    MissingImage,
}
