use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::classify;
use crate::decode;
use crate::DetectionResult;
use crate::CANDIDATES;

/// Extensions accepted when collecting inputs, compared case-insensitively.
pub const INDEX_EXTENSIONS: [&str; 2] = ["cue", "txt"];

/// Provisional label for a preview that does not read as UTF-8.
pub const UNKNOWN_LABEL: &str = "unknown";

pub fn is_index_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            INDEX_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Bytes of one input document as read, never mutated.
#[derive(Debug, PartialEq, Eq)]
pub struct RawDocument {
    name: String,
    relative_path: PathBuf,
    bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(name: impl Into<String>, relative_path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        RawDocument {
            name: name.into(),
            relative_path: relative_path.into(),
            bytes,
        }
    }

    /// Reads `path`, recording its location relative to `root`.
    ///
    /// A `path` outside `root` is recorded by file name alone.
    pub fn read(root: &Path, path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative_path = match path.strip_prefix(root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
            _ => PathBuf::from(&name),
        };
        Ok(RawDocument::new(name, relative_path, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FixStatus {
    Pending,
    Processing,
    Fixed,
    Error,
}

/// A document moving through the fix pipeline.
///
/// Identity (id and the raw document) is fixed at ingest; only status and
/// content change, and only through [`Fixer`](crate::Fixer).
#[derive(Debug, Serialize)]
pub struct FixedRecord {
    id: Uuid,
    #[serde(skip)]
    raw: Arc<RawDocument>,
    name: String,
    path: PathBuf,
    /// Lenient UTF-8 reading taken at ingest.
    #[serde(skip)]
    preview: String,
    provisional_encoding: &'static str,
    pub(crate) detection: Option<DetectionResult>,
    #[serde(skip)]
    pub(crate) normalized: Option<String>,
    pub(crate) status: FixStatus,
    pub(crate) error: Option<String>,
}

impl FixedRecord {
    pub fn ingest(raw: Arc<RawDocument>) -> Self {
        let utf_8 = &CANDIDATES[0];
        let preview = decode::decode_lenient(raw.bytes(), utf_8).into_owned();
        let provisional_encoding = if classify::is_garbled(&preview) {
            UNKNOWN_LABEL
        } else {
            utf_8.label
        };
        FixedRecord {
            id: Uuid::new_v4(),
            name: raw.name().to_string(),
            path: raw.relative_path().to_path_buf(),
            raw,
            preview,
            provisional_encoding,
            detection: None,
            normalized: None,
            status: FixStatus::Pending,
            error: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn raw(&self) -> &RawDocument {
        &self.raw
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn provisional_encoding(&self) -> &'static str {
        self.provisional_encoding
    }

    pub fn status(&self) -> FixStatus {
        self.status
    }

    pub fn detection(&self) -> Option<&DetectionResult> {
        self.detection.as_ref()
    }

    pub fn normalized(&self) -> Option<&str> {
        self.normalized.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Text to emit: normalized when available, detected otherwise.
    pub fn fixed_text(&self) -> Option<&str> {
        if self.status != FixStatus::Fixed {
            return None;
        }
        self.normalized
            .as_deref()
            .or_else(|| self.detection.as_ref().map(|d| d.text.as_str()))
    }

    pub fn possibly_garbled(&self) -> bool {
        self.detection.as_ref().map_or(false, |d| d.possibly_garbled)
    }
}
