//! Output image formats and their media-type associations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Image format produced by a transcoding job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// AV1 Image File Format. Quality is controlled by a CRF value.
    #[default]
    Avif,
    /// WebP. Quality is controlled by a 0-100 percentage.
    Webp,
}

impl TargetFormat {
    /// File extension (without the dot) for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Avif => "avif",
            TargetFormat::Webp => "webp",
        }
    }

    /// MIME media type for this format.
    pub fn media_type(&self) -> &'static str {
        match self {
            TargetFormat::Avif => "image/avif",
            TargetFormat::Webp => "image/webp",
        }
    }

    /// Look up the format registered for a media type.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type.trim().to_lowercase().as_str() {
            "image/avif" => Some(TargetFormat::Avif),
            "image/webp" => Some(TargetFormat::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TargetFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "avif" | "image/avif" => Ok(TargetFormat::Avif),
            "webp" | "image/webp" => Ok(TargetFormat::Webp),
            other => Err(Error::validation(format!(
                "unsupported target format: {other} (expected avif or webp)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_and_media_types() {
        assert_eq!(TargetFormat::Avif.extension(), "avif");
        assert_eq!(TargetFormat::Webp.extension(), "webp");
        assert_eq!(TargetFormat::Avif.media_type(), "image/avif");
        assert_eq!(TargetFormat::Webp.media_type(), "image/webp");
    }

    #[test]
    fn parse_accepts_extension_and_media_type() {
        assert_eq!("AVIF".parse::<TargetFormat>().unwrap(), TargetFormat::Avif);
        assert_eq!(".webp".parse::<TargetFormat>().unwrap(), TargetFormat::Webp);
        assert_eq!(
            "image/webp".parse::<TargetFormat>().unwrap(),
            TargetFormat::Webp
        );
        assert!("jpeg".parse::<TargetFormat>().is_err());
    }

    #[test]
    fn media_type_lookup() {
        assert_eq!(
            TargetFormat::from_media_type("image/avif"),
            Some(TargetFormat::Avif)
        );
        assert_eq!(TargetFormat::from_media_type("image/jpeg"), None);
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&TargetFormat::Webp).unwrap();
        assert_eq!(json, "\"webp\"");
    }
}
