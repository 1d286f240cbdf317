use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{FormFields, ParseError};

/// A result artifact the backend keeps for retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedFile {
    pub filename: String,
    /// Backend relative path, `/api/download/<filename>`.
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedFiles {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub files: Vec<ProcessedFile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpg,
    Jpeg,
    Webp,
    Gif,
    Bmp,
    Tiff,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" => Ok(ImageFormat::Jpg),
            "jpeg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::Webp),
            "gif" => Ok(ImageFormat::Gif),
            "bmp" => Ok(ImageFormat::Bmp),
            "tiff" | "tif" => Ok(ImageFormat::Tiff),
            _ => Err(ParseError::ImageFormat(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub format: ImageFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ConvertOptions {
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            width: None,
            height: None,
        }
    }

    pub fn form_fields(&self) -> FormFields {
        let mut fields = vec![("format", self.format.to_string())];
        if let Some(width) = self.width {
            fields.push(("width", width.to_string()));
        }
        if let Some(height) = self.height {
            fields.push(("height", height.to_string()));
        }
        fields
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn image_format_parses_case_insensitively() {
        assert_eq!("PNG".parse(), Ok(ImageFormat::Png));
        assert_eq!(" webp ".parse(), Ok(ImageFormat::Webp));
        assert_eq!("tif".parse(), Ok(ImageFormat::Tiff));
        assert_eq!(
            "svg".parse::<ImageFormat>(),
            Err(ParseError::ImageFormat("svg".to_owned()))
        );
    }

    #[test]
    fn convert_options_skip_missing_dimensions() {
        let mut options = ConvertOptions::new(ImageFormat::Jpg);
        assert_eq!(options.form_fields(), vec![("format", "jpg".to_owned())]);
        options.height = Some(480);
        assert_eq!(
            options.form_fields(),
            vec![("format", "jpg".to_owned()), ("height", "480".to_owned())]
        );
    }

    #[test]
    fn processed_files_without_message() -> Result<(), serde_json::Error> {
        let files: ProcessedFiles = serde_json::from_str(
            r#"{"files": [{"filename": "nobg_cat.png", "url": "/api/download/nobg_cat.png"}]}"#,
        )?;
        assert_eq!(files.message, None);
        assert_eq!(files.files[0].filename, "nobg_cat.png");
        Ok(())
    }
}
