//! Wire types exchanged with the media backend.
//!
//! The backend is loose about field names and numeric types, so decoding
//! here is forgiving: missing fields default, `null` reads as
//! empty and numbers may arrive as integers or floats.

mod de;
pub mod files;
pub mod pdf;
pub mod progress;
pub mod units;
pub mod video;

use serde::{Deserialize, Serialize};

pub use files::{ConvertOptions, ImageFormat, ProcessedFile, ProcessedFiles};
pub use pdf::{SplitOptions, SplitType, WatermarkKind, WatermarkOptions};
pub use progress::{DownloadProgress, DownloadStatus};
pub use video::{DownloadedVideo, VideoFormat, VideoInfo, VideoRequest};

/// Multipart text fields of a request, in the order they are sent.
pub type FormFields = Vec<(&'static str, String)>;

/// Error body returned by the backend on a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unsupported image format: '{0}'")]
    ImageFormat(String),
    #[error("Unsupported split type: '{0}', expected one of ranges, pages, interval")]
    SplitType(String),
}
