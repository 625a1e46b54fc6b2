//! Detection backed by a remote language model.
//!
//! The model only names a suspected encoding; the bytes are still decoded
//! locally and checked by the classifier. Any failure on the remote side
//! falls back to [`EncodingDetector`].

use std::thread;
use std::time::Duration;

use log::debug;
use log::info;
use log::warn;
use serde::Deserialize;
use serde_json::json;

use crate::classify;
use crate::decode;
use crate::error::RemoteError;
use crate::Candidate;
use crate::Detect;
use crate::DetectionResult;
use crate::EncodingDetector;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Suggestion assumed when the model's answer cannot be parsed.
pub const DEFAULT_SUGGESTION: &str = "gb18030";

/// Labels tried after the suggestion, in order.
pub static TRIAL_ORDER: [&str; 4] = ["gb18030", "big5", "shift-jis", "utf-8"];

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub api_key: String,
    pub model: String,
    /// Base URL without a trailing slash.
    pub endpoint: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    /// Characters of the lossy preview sent to the model.
    pub snippet_chars: usize,
}

impl RemoteConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        RemoteConfig {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            snippet_chars: 500,
        }
    }
}

/// What the model answered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub encoding: String,
    #[serde(default)]
    pub cleaned_text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

fn prompt(snippet: &str) -> String {
    format!(
        "You are a character encoding expert. I have a music CUE file that appears garbled (mojibake).\n\
         Based on the garbled snippet below, identify the ORIGINAL intended encoding.\n\n\
         Common suspects:\n\
         - Simplified Chinese: 'gb18030' or 'gbk'\n\
         - Traditional Chinese: 'big5'\n\
         - Japanese: 'shift-jis'\n\
         - Korean: 'euc-kr'\n\
         - Western: 'windows-1252'\n\n\
         Garbled snippet:\n\"{}\"\n\n\
         If you can recognize song titles or artist names within the mess, provide a cleaned version.",
        snippet
    )
}

fn request_body(snippet: &str) -> serde_json::Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt(snippet) }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "encoding": {
                        "type": "STRING",
                        "description": "The identified IANA encoding name (e.g. 'gb18030', 'big5', 'shift-jis')."
                    },
                    "cleanedText": {
                        "type": "STRING",
                        "description": "A small sample of the text if you successfully reconstructed it."
                    }
                },
                "required": ["encoding", "cleanedText"]
            }
        }
    })
}

/// Parses the model's JSON answer, defaulting to [`DEFAULT_SUGGESTION`].
pub fn parse_suggestion(text: &str, snippet: &str) -> Suggestion {
    match serde_json::from_str::<Suggestion>(text) {
        Ok(mut suggestion) => {
            suggestion.encoding = suggestion.encoding.trim().to_ascii_lowercase();
            suggestion
        }
        Err(e) => {
            warn!("failed to parse model answer: {}", e);
            Suggestion {
                encoding: DEFAULT_SUGGESTION.to_string(),
                cleaned_text: snippet.to_string(),
            }
        }
    }
}

/// Suggested label first, then [`TRIAL_ORDER`]; unsupported labels and
/// repeats are dropped.
pub fn trial_order(suggested: &str) -> Vec<&'static Candidate> {
    let mut order: Vec<&'static Candidate> = Vec::with_capacity(TRIAL_ORDER.len() + 1);
    let labels = std::iter::once(suggested).chain(TRIAL_ORDER.iter().copied());
    for label in labels {
        if let Ok(candidate) = decode::resolve(label) {
            if !order.contains(&candidate) {
                order.push(candidate);
            }
        }
    }
    order
}

/// Pulls the model's answer out of a `generateContent` response body.
fn parse_response(body: &str, snippet: &str) -> Result<Suggestion, RemoteError> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    let text = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
        .ok_or(RemoteError::EmptyResponse)?;
    Ok(parse_suggestion(&text, snippet))
}

fn snippet(raw: &[u8], chars: usize) -> String {
    String::from_utf8_lossy(raw).chars().take(chars).collect()
}

pub struct GeminiDetector {
    client: reqwest::blocking::Client,
    config: RemoteConfig,
    fallback: EncodingDetector,
}

impl GeminiDetector {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(GeminiDetector {
            client,
            config,
            fallback: EncodingDetector::new(),
        })
    }

    fn request_once(&self, snippet: &str) -> Result<Suggestion, RemoteError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        );
        debug!("asking {} about {} chars", url, snippet.chars().count());
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body(snippet))
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(RemoteError::Server {
                status: status.as_u16(),
                body,
            });
        }
        parse_response(&resp.text()?, snippet)
    }

    /// Asks the model for the original encoding of `snippet`, retrying
    /// transport failures and 429/5xx answers.
    pub fn suggest(&self, snippet: &str) -> Result<Suggestion, RemoteError> {
        let mut attempt = 1;
        loop {
            match self.request_once(snippet) {
                Ok(suggestion) => return Ok(suggestion),
                Err(e) if attempt < self.config.max_attempts && retryable(&e) => {
                    warn!(
                        "remote detection failed ({}), retrying (attempt {}/{})",
                        e, attempt, self.config.max_attempts
                    );
                    thread::sleep(Duration::from_millis(500 * u64::from(attempt)));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn retryable(e: &RemoteError) -> bool {
    match e {
        RemoteError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        RemoteError::Server { status, .. } => *status == 429 || *status >= 500,
        RemoteError::EmptyResponse | RemoteError::Json(_) => false,
    }
}

impl Detect for GeminiDetector {
    fn detect(&self, raw: &[u8]) -> DetectionResult {
        let snippet = snippet(raw, self.config.snippet_chars);
        let suggestion = match self.suggest(&snippet) {
            Ok(suggestion) => suggestion,
            Err(e) => {
                warn!("remote detection unavailable ({}), using heuristics", e);
                return self.fallback.detect(raw);
            }
        };
        info!("model suggests {}", suggestion.encoding);
        for candidate in trial_order(&suggestion.encoding) {
            if let Ok(text) = decode::decode_strict(raw, candidate) {
                if !classify::is_garbled(&text) {
                    return DetectionResult {
                        text: text.into_owned(),
                        encoding: candidate.label,
                        possibly_garbled: false,
                    };
                }
            }
        }
        self.fallback.detect(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(order: Vec<&'static Candidate>) -> Vec<&'static str> {
        order.into_iter().map(|c| c.label).collect()
    }

    #[test]
    fn test_trial_order() {
        assert_eq!(
            labels(trial_order("big5")),
            ["big5", "gb18030", "shift-jis", "utf-8"]
        );
        assert_eq!(
            labels(trial_order("euc-kr")),
            ["euc-kr", "gb18030", "big5", "shift-jis", "utf-8"]
        );
        assert_eq!(
            labels(trial_order("gbk")),
            ["gb18030", "big5", "shift-jis", "utf-8"]
        );
        assert_eq!(
            labels(trial_order("euc-jp")),
            ["gb18030", "big5", "shift-jis", "utf-8"]
        );
    }

    #[test]
    fn test_parse_suggestion() {
        let suggestion = parse_suggestion(r#"{"encoding": " Big5 ", "cleanedText": "歌"}"#, "x");
        assert_eq!(suggestion.encoding, "big5");
        assert_eq!(suggestion.cleaned_text, "歌");

        let suggestion = parse_suggestion("not json", "x");
        assert_eq!(suggestion.encoding, DEFAULT_SUGGESTION);
        assert_eq!(suggestion.cleaned_text, "x");
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "{\"encoding\": \"big5\", \"cleanedText\": \"\"}"}]}}]}"#;
        assert_eq!(parse_response(body, "x").unwrap().encoding, "big5");

        let err = parse_response(r#"{"candidates": []}"#, "x").unwrap_err();
        assert!(matches!(err, RemoteError::EmptyResponse));
        assert!(!retryable(&err));
    }

    #[test]
    fn test_malformed_body_not_retried() {
        let err = parse_response("<html>bad gateway</html>", "x").unwrap_err();
        assert!(matches!(err, RemoteError::Json(_)));
        assert!(!retryable(&err));
        assert!(retryable(&RemoteError::Server {
            status: 503,
            body: String::new()
        }));
        assert!(!retryable(&RemoteError::Server {
            status: 400,
            body: String::new()
        }));
    }

    #[test]
    fn test_request_body_schema() {
        let body = request_body("ÄãºÃ");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            body["generationConfig"]["responseSchema"]["required"],
            json!(["encoding", "cleanedText"])
        );
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.contains("\"ÄãºÃ\""));
    }

    #[test]
    fn test_snippet_counts_chars() {
        let raw = "歌".repeat(600);
        assert_eq!(snippet(raw.as_bytes(), 500).chars().count(), 500);
    }

    #[test]
    fn test_unreachable_endpoint_falls_back() {
        let mut config = RemoteConfig::new("key");
        config.endpoint = "http://127.0.0.1:9".to_string();
        config.max_attempts = 1;
        config.timeout = Duration::from_secs(2);
        let detector = GeminiDetector::new(config).unwrap();
        let (bytes, _, _) = encoding_rs::GB18030.encode("TITLE \"歌\"\nFILE \"a.wav\" WAVE");
        let result = detector.detect(&bytes);
        assert_eq!(result.encoding, "gb18030");
        assert!(!result.possibly_garbled);
    }
}
