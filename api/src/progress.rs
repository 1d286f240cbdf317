use serde::{Deserialize, Serialize};

use crate::de::{lenient_string, to_u64};
use crate::units::{format_bytes, format_duration};

/// Lifecycle reported by the backend for the current video download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    #[default]
    Idle,
    Starting,
    Downloading,
    Finished,
    Error,
    /// Any status string the client does not know about.
    #[serde(other)]
    Unknown,
}

/// Snapshot of `GET /api/download-progress`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawProgress")]
pub struct DownloadProgress {
    pub status: DownloadStatus,
    /// Percentage, 0 to 100.
    pub progress: f64,
    pub downloaded: u64,
    pub total: u64,
    pub speed: String,
    pub eta: String,
    pub title: String,
}

impl DownloadProgress {
    pub fn with_status(status: DownloadStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

/// `speed` and `eta` are display strings for the front end but raw numbers
/// when they come straight from the downloader hook.
#[derive(Deserialize)]
#[serde(untagged)]
enum Metric {
    Text(String),
    Number(f64),
}

#[derive(Deserialize)]
struct RawProgress {
    #[serde(default)]
    status: Option<DownloadStatus>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default, alias = "downloaded_bytes")]
    downloaded: Option<f64>,
    #[serde(default, alias = "total_bytes")]
    total: Option<f64>,
    #[serde(default)]
    speed: Option<Metric>,
    #[serde(default)]
    eta: Option<Metric>,
    #[serde(default, alias = "filename", deserialize_with = "lenient_string")]
    title: String,
}

impl From<RawProgress> for DownloadProgress {
    fn from(raw: RawProgress) -> Self {
        let downloaded = raw.downloaded.map(to_u64).unwrap_or(0);
        let total = raw.total.map(to_u64).unwrap_or(0);
        let progress = match raw.progress {
            Some(value) => value,
            None if total > 0 => downloaded as f64 / total as f64 * 100.0,
            None => 0.0,
        };
        let speed = match raw.speed {
            Some(Metric::Text(text)) => text,
            Some(Metric::Number(bytes)) => format!("{}/s", format_bytes(to_u64(bytes))),
            None => String::new(),
        };
        let eta = match raw.eta {
            Some(Metric::Text(text)) => text,
            Some(Metric::Number(seconds)) => format_duration(to_u64(seconds)),
            None => String::new(),
        };
        DownloadProgress {
            status: raw.status.unwrap_or_default(),
            progress: if progress.is_finite() {
                progress.clamp(0.0, 100.0)
            } else {
                0.0
            },
            downloaded,
            total,
            speed,
            eta,
            title: raw.title,
        }
    }
}
