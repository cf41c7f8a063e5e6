//! Encoder quality parameters.
//!
//! AVIF and WEBP use opposite quality scales: AVIF takes a constant rate
//! factor where lower means better, WEBP takes a percentage where higher
//! means better. The two are kept as distinct types. The [`slider`] helpers
//! map between them for front ends that expose a single quality control.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Constant rate factor for the AVIF encoder (0 = best, 63 = worst).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Crf(u8);

impl Crf {
    /// Highest CRF the AV1 encoder accepts.
    pub const MAX: u32 = 63;

    /// Validate and wrap a CRF value.
    pub fn new(value: u32) -> Result<Self> {
        if value > Self::MAX {
            return Err(Error::validation(format!(
                "CRF {value} is out of range (0-{})",
                Self::MAX
            )));
        }
        Ok(Self(value as u8))
    }

    /// The raw CRF value.
    pub fn value(&self) -> u32 {
        u32::from(self.0)
    }
}

impl Default for Crf {
    fn default() -> Self {
        Self(28)
    }
}

impl TryFrom<u32> for Crf {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Crf> for u32 {
    fn from(crf: Crf) -> Self {
        crf.value()
    }
}

impl fmt::Display for Crf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quality percentage for the WEBP encoder (0 = worst, 100 = best).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct WebpQuality(u8);

impl WebpQuality {
    /// Highest accepted quality percentage.
    pub const MAX: u32 = 100;

    /// Validate and wrap a quality percentage.
    pub fn new(value: u32) -> Result<Self> {
        if value > Self::MAX {
            return Err(Error::validation(format!(
                "WEBP quality {value} is out of range (0-{})",
                Self::MAX
            )));
        }
        Ok(Self(value as u8))
    }

    /// Derive the WEBP quality a single slider shows for a CRF value.
    ///
    /// The percentage is truncated, so CRF 28 maps to 56.
    pub fn from_crf(crf: Crf) -> Self {
        let percent = slider::crf_to_percent(crf.value());
        Self(percent.clamp(0.0, 100.0) as u8)
    }

    /// The raw percentage.
    pub fn value(&self) -> u32 {
        u32::from(self.0)
    }
}

impl Default for WebpQuality {
    fn default() -> Self {
        Self::from_crf(Crf::default())
    }
}

impl TryFrom<u32> for WebpQuality {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<WebpQuality> for u32 {
    fn from(q: WebpQuality) -> Self {
        q.value()
    }
}

impl fmt::Display for WebpQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversions for a unified "quality slider".
///
/// `percent = (1 - crf / 65) * 100`. The scale is a presentation
/// convenience with no codec meaning and is only applied at the CLI
/// boundary.
pub mod slider {
    /// Width of the CRF scale used by the slider.
    pub const SCALE: f64 = 65.0;

    /// Convert a CRF value to a slider percentage.
    pub fn crf_to_percent(crf: u32) -> f64 {
        (1.0 - f64::from(crf) / SCALE) * 100.0
    }

    /// Convert a slider percentage back to a CRF value, rounding to the
    /// nearest integer and clamping to `[0, 65]`.
    pub fn percent_to_crf(percent: f64) -> u32 {
        let crf = SCALE - SCALE * percent / 100.0;
        crf.round().clamp(0.0, SCALE) as u32
    }
}
