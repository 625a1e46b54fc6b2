//! Repairs mojibake in CUE sheets.
//!
//! [`EncodingDetector`] tries a fixed, ordered list of legacy encodings
//! against the raw bytes of a sheet, strictly decoding under each and
//! keeping the first result the [`classify`] rules accept. When nothing is
//! accepted the last candidate is decoded leniently and the result is
//! flagged so a human can pick an encoding by hand.
//!
//! ```
//! let (bytes, _, _) = encoding_rs::GB18030.encode("TITLE \"歌\"\nFILE \"a.wav\" WAVE\n");
//! let result = cuefix::EncodingDetector::new().detect(&bytes);
//! assert_eq!(result.encoding, "gb18030");
//! assert!(!result.possibly_garbled);
//! ```

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use log::debug;
use log::warn;
use serde::Deserialize;
use serde::Serialize;

pub mod classify;
mod data;
pub mod decode;
mod error;
pub mod export;
mod fixer;
pub mod normalize;
mod record;
#[cfg(feature = "remote")]
pub mod remote;

pub use data::Candidate;
pub use data::AUTO_LABEL;
pub use data::CANDIDATES;
pub use data::UTF_8_BOM;
pub use error::*;
pub use fixer::*;
pub use record::*;

use data::FALLBACK_INDEX;

/// The chosen decoding of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    pub text: String,
    /// Label of the candidate that produced `text`.
    pub encoding: &'static str,
    /// Set when no candidate was accepted, or an override had to fall back
    /// to lenient decoding. The text should be surfaced for manual review.
    pub possibly_garbled: bool,
}

/// A detection strategy. Implementations never fail: whatever happens
/// internally, the caller gets best-effort text back.
pub trait Detect {
    fn detect(&self, raw: &[u8]) -> DetectionResult;
}

/// Either auto-detection or a human-picked candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EncodingSelection {
    Auto,
    Manual(&'static Candidate),
}

impl EncodingSelection {
    pub fn label(&self) -> &'static str {
        match self {
            EncodingSelection::Auto => AUTO_LABEL,
            EncodingSelection::Manual(candidate) => candidate.label,
        }
    }
}

impl Default for EncodingSelection {
    fn default() -> Self {
        EncodingSelection::Auto
    }
}

impl FromStr for EncodingSelection {
    type Err = UnsupportedEncodingLabel;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        if label.trim().eq_ignore_ascii_case(AUTO_LABEL) {
            return Ok(EncodingSelection::Auto);
        }
        decode::resolve(label).map(EncodingSelection::Manual)
    }
}

impl TryFrom<String> for EncodingSelection {
    type Error = UnsupportedEncodingLabel;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        label.parse()
    }
}

impl From<EncodingSelection> for String {
    fn from(selection: EncodingSelection) -> Self {
        selection.label().to_string()
    }
}

impl fmt::Display for EncodingSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The heuristic detector: first acceptable candidate wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodingDetector {
    _private: (),
}

impl EncodingDetector {
    pub const fn new() -> Self {
        EncodingDetector { _private: () }
    }

    pub fn detect(&self, raw: &[u8]) -> DetectionResult {
        for candidate in CANDIDATES.iter() {
            let text = match decode::decode_strict(raw, candidate) {
                Ok(text) => text,
                Err(e) => {
                    debug!("skipping candidate: {}", e);
                    continue;
                }
            };
            if let Some(rule) = classify::garbled_by(&text) {
                debug!("{} decodes but looks garbled ({})", candidate.label, rule);
                continue;
            }
            debug!("accepted {}", candidate.label);
            return DetectionResult {
                text: text.into_owned(),
                encoding: candidate.label,
                possibly_garbled: false,
            };
        }
        let fallback = &CANDIDATES[FALLBACK_INDEX];
        warn!(
            "no candidate accepted for {} bytes, falling back to lenient {}",
            raw.len(),
            fallback.label
        );
        DetectionResult {
            text: decode::decode_lenient(raw, fallback).into_owned(),
            encoding: fallback.label,
            possibly_garbled: true,
        }
    }

    /// Decodes under a human-picked candidate without consulting the
    /// classifier. Strict failure falls back to lenient decoding.
    pub fn detect_as(&self, raw: &[u8], candidate: &'static Candidate) -> DetectionResult {
        match decode::decode_strict(raw, candidate) {
            Ok(text) => DetectionResult {
                text: text.into_owned(),
                encoding: candidate.label,
                possibly_garbled: false,
            },
            Err(e) => {
                warn!("{}, decoding leniently", e);
                DetectionResult {
                    text: decode::decode_lenient(raw, candidate).into_owned(),
                    encoding: candidate.label,
                    possibly_garbled: true,
                }
            }
        }
    }

    /// Like [`detect_as`](Self::detect_as) but surfaces strict failure.
    pub fn detect_as_strict(
        &self,
        raw: &[u8],
        candidate: &'static Candidate,
    ) -> Result<DetectionResult, DecodeError> {
        let text = decode::decode_strict(raw, candidate)?;
        Ok(DetectionResult {
            text: text.into_owned(),
            encoding: candidate.label,
            possibly_garbled: false,
        })
    }

    pub fn detect_with(&self, raw: &[u8], selection: EncodingSelection) -> DetectionResult {
        match selection {
            EncodingSelection::Auto => self.detect(raw),
            EncodingSelection::Manual(candidate) => self.detect_as(raw, candidate),
        }
    }

    /// Override entry point taking a raw label; `auto` runs detection.
    pub fn detect_labeled(&self, raw: &[u8], label: &str) -> Result<DetectionResult, DetectError> {
        let selection: EncodingSelection = label.parse()?;
        Ok(self.detect_with(raw, selection))
    }
}

impl Detect for EncodingDetector {
    fn detect(&self, raw: &[u8]) -> DetectionResult {
        EncodingDetector::detect(self, raw)
    }
}
