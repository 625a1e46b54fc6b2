use thiserror::Error;

/// Strict decoding hit a byte sequence the encoding does not define.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("bytes are not valid {label} (malformed sequence at offset {offset})")]
pub struct DecodeError {
    pub label: &'static str,
    pub offset: usize,
}

/// A label outside the fixed candidate set (and its aliases) was requested.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported encoding label `{0}`")]
pub struct UnsupportedEncodingLabel(pub String);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedEncodingLabel),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Error)]
pub enum FixError {
    #[error("record {0} is already being fixed")]
    Busy(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("relative path `{0}` escapes the output directory")]
    UnsafePath(String),
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("failed to load conversion dictionary: {0}")]
    Dictionary(String),
}

#[cfg(feature = "remote")]
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("response carried no text")]
    EmptyResponse,
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
