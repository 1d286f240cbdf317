use std::path::PathBuf;
use std::str::FromStr;

use crate::{FormFields, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitType {
    Ranges,
    Pages,
    Interval,
}

impl SplitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitType::Ranges => "ranges",
            SplitType::Pages => "pages",
            SplitType::Interval => "interval",
        }
    }
}

impl FromStr for SplitType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ranges" => Ok(SplitType::Ranges),
            "pages" => Ok(SplitType::Pages),
            "interval" => Ok(SplitType::Interval),
            _ => Err(ParseError::SplitType(s.to_owned())),
        }
    }
}

/// `split_value` is e.g. `1-3,4-6` for ranges or `2` for an interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    pub split_type: SplitType,
    pub split_value: String,
}

impl SplitOptions {
    pub fn form_fields(&self) -> FormFields {
        vec![
            ("split_type", self.split_type.as_str().to_owned()),
            ("split_value", self.split_value.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatermarkKind {
    Text(String),
    /// Local image uploaded alongside the document.
    Image(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkOptions {
    pub kind: WatermarkKind,
    pub font_size: u32,
    pub rotation: i32,
    pub opacity: f32,
    pub width_spacer: u32,
    pub height_spacer: u32,
}

impl WatermarkOptions {
    pub fn new(kind: WatermarkKind) -> Self {
        Self {
            kind,
            font_size: 30,
            rotation: 0,
            opacity: 0.5,
            width_spacer: 50,
            height_spacer: 50,
        }
    }

    /// Text fields only; an image watermark travels as a file part.
    pub fn form_fields(&self) -> FormFields {
        let mut fields = match &self.kind {
            WatermarkKind::Text(text) => vec![
                ("watermark_type", "text".to_owned()),
                ("watermark_text", text.clone()),
            ],
            WatermarkKind::Image(_) => vec![("watermark_type", "image".to_owned())],
        };
        fields.extend([
            ("font_size", self.font_size.to_string()),
            ("rotation", self.rotation.to_string()),
            ("opacity", self.opacity.to_string()),
            ("width_spacer", self.width_spacer.to_string()),
            ("height_spacer", self.height_spacer.to_string()),
        ]);
        fields
    }
}
