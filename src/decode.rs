//! Byte decoder: strict and lenient decoding under a candidate encoding.

use std::borrow::Cow;

use encoding_rs::DecoderResult;
use encoding_rs::UTF_8;

use crate::data::Candidate;
use crate::data::ALIASES;
use crate::data::AUTO_LABEL;
use crate::data::CANDIDATES;
use crate::data::UTF_8_BOM;
use crate::error::DecodeError;
use crate::error::DetectError;
use crate::error::UnsupportedEncodingLabel;

/// Maps an alias to the label it is decoded as. Unknown labels pass through.
pub fn canonical_label(label: &str) -> &str {
    for &(alias, canonical) in ALIASES.iter() {
        if label.eq_ignore_ascii_case(alias) {
            return canonical;
        }
    }
    label
}

/// Looks a label up in the candidate list after alias resolution.
///
/// Matching is ASCII case-insensitive and ignores surrounding whitespace.
/// The `auto` sentinel is not a candidate and resolves to an error here.
pub fn resolve(label: &str) -> Result<&'static Candidate, UnsupportedEncodingLabel> {
    let trimmed = label.trim();
    if !trimmed.eq_ignore_ascii_case(AUTO_LABEL) {
        let canonical = canonical_label(trimmed);
        if let Some(candidate) = CANDIDATES
            .iter()
            .find(|c| c.label.eq_ignore_ascii_case(canonical))
        {
            return Ok(candidate);
        }
    }
    Err(UnsupportedEncodingLabel(label.to_string()))
}

fn strip_bom<'a>(bytes: &'a [u8], candidate: &Candidate) -> &'a [u8] {
    if candidate.encoding == UTF_8 && bytes.starts_with(&UTF_8_BOM) {
        &bytes[UTF_8_BOM.len()..]
    } else {
        bytes
    }
}

/// Decodes without substitution, failing on the first malformed sequence.
pub fn decode_strict<'a>(
    bytes: &'a [u8],
    candidate: &'static Candidate,
) -> Result<Cow<'a, str>, DecodeError> {
    let bom_len = bytes.len() - strip_bom(bytes, candidate).len();
    let src = &bytes[bom_len..];
    let mut decoder = candidate.encoding.new_decoder_without_bom_handling();
    let mut text = String::with_capacity(
        decoder
            .max_utf8_buffer_length_without_replacement(src.len())
            .unwrap_or(src.len()),
    );
    let mut total_read = 0;
    loop {
        let (result, read) =
            decoder.decode_to_string_without_replacement(&src[total_read..], &mut text, true);
        total_read += read;
        match result {
            DecoderResult::InputEmpty => {
                return Ok(Cow::Owned(text));
            }
            DecoderResult::Malformed(bad, extra) => {
                let offset = total_read.saturating_sub(usize::from(bad) + usize::from(extra));
                return Err(DecodeError {
                    label: candidate.label,
                    offset: bom_len + offset,
                });
            }
            DecoderResult::OutputFull => {
                let remaining = src.len() - total_read;
                text.reserve(
                    decoder
                        .max_utf8_buffer_length_without_replacement(remaining)
                        .unwrap_or(remaining)
                        .max(4),
                );
            }
        }
    }
}

/// Decodes substituting U+FFFD for malformed sequences. Never fails.
pub fn decode_lenient<'a>(bytes: &'a [u8], candidate: &'static Candidate) -> Cow<'a, str> {
    let (text, _) = candidate
        .encoding
        .decode_without_bom_handling(strip_bom(bytes, candidate));
    text
}

/// Strictly decodes `bytes` under `label`, resolving aliases first.
pub fn decode<'a>(bytes: &'a [u8], label: &str) -> Result<Cow<'a, str>, DetectError> {
    let candidate = resolve(label)?;
    Ok(decode_strict(bytes, candidate)?)
}

/// Leniently decodes `bytes` under `label`, resolving aliases first.
pub fn decode_lossy<'a>(
    bytes: &'a [u8],
    label: &str,
) -> Result<Cow<'a, str>, UnsupportedEncodingLabel> {
    let candidate = resolve(label)?;
    Ok(decode_lenient(bytes, candidate))
}
