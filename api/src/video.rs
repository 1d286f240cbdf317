use serde::{Deserialize, Serialize};

use crate::de::{lenient_f64, lenient_string, lenient_u64};
use crate::FormFields;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub format_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub resolution: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize_approx: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vcodec: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fps: f64,
}

/// Response of `POST /api/get-video-info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    /// Seconds.
    #[serde(default, deserialize_with = "lenient_u64")]
    pub duration: u64,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<VideoFormat>,
}

/// Response of `POST /api/download-video`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadedVideo {
    pub download_path: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub duration: u64,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRequest {
    pub url: String,
    pub format_id: Option<String>,
    pub audio_only: bool,
}

impl VideoRequest {
    pub fn video(url: impl Into<String>, format_id: Option<String>) -> Self {
        Self {
            url: url.into(),
            format_id,
            audio_only: false,
        }
    }

    pub fn audio(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format_id: None,
            audio_only: true,
        }
    }

    /// Audio-only downloads ask for mp3 and never carry a format id.
    pub fn form_fields(&self) -> FormFields {
        let mut fields = vec![("url", self.url.clone())];
        if self.audio_only {
            fields.push(("format", "mp3".to_owned()));
        } else if let Some(format_id) = &self.format_id {
            fields.push(("format_id", format_id.clone()));
        }
        fields.push(("audio_only", self.audio_only.to_string()));
        fields
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn video_info_tolerates_loose_numbers() -> Result<(), serde_json::Error> {
        let json = r#"{
            "title": "A talk",
            "duration": 3723.4,
            "thumbnail": null,
            "formats": [
                {"format_id": "137", "resolution": "1080p", "filesize_approx": 1.5e6, "vcodec": "avc1", "fps": 29.97},
                {"format_id": "22", "resolution": "720p", "filesize_approx": null, "vcodec": null, "fps": null}
            ]
        }"#;
        let info: VideoInfo = serde_json::from_str(json)?;
        assert_eq!(info.duration, 3723);
        assert_eq!(info.thumbnail, None);
        assert_eq!(info.formats.len(), 2);
        assert_eq!(info.formats[0].filesize_approx, 1_500_000);
        assert_eq!(info.formats[1].filesize_approx, 0);
        assert_eq!(info.formats[1].vcodec, "");
        Ok(())
    }

    #[test]
    fn audio_request_sends_mp3_without_format_id() {
        let fields = VideoRequest::audio("https://example.org/v").form_fields();
        assert_eq!(
            fields,
            vec![
                ("url", "https://example.org/v".to_owned()),
                ("format", "mp3".to_owned()),
                ("audio_only", "true".to_owned()),
            ]
        );
    }

    #[test]
    fn video_request_sends_format_id() {
        let fields =
            VideoRequest::video("https://example.org/v", Some("137".to_owned())).form_fields();
        assert_eq!(
            fields,
            vec![
                ("url", "https://example.org/v".to_owned()),
                ("format_id", "137".to_owned()),
                ("audio_only", "false".to_owned()),
            ]
        );
    }
}
