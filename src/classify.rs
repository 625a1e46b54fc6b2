//! Garbled-text classifier.
//!
//! A decoded CUE sheet is structurally rigid: whatever script the titles are
//! in, the grammar keywords stay ASCII. Text is judged garbled when any rule
//! of [`RULES`] fires, evaluated in order with the first hit winning.
//!
//! This is a heuristic. Garbled text that still carries two keywords and no
//! fingerprint run passes (false negative), and correctly decoded text that
//! is not a CUE sheet fails (false positive). Both are accepted.

use memchr::memmem;

use crate::data::MIN_KEYWORDS;
use crate::data::MOJIBAKE_FINGERPRINT;
use crate::data::MOJIBAKE_RUN;
use crate::data::STRUCTURAL_KEYWORDS;

/// A named predicate returning `true` when the text looks garbled.
pub struct Rule {
    pub name: &'static str,
    pub garbled: fn(&str) -> bool,
}

pub static RULES: [Rule; 4] = [
    Rule {
        name: "blank",
        garbled: is_blank,
    },
    Rule {
        name: "replacement-character",
        garbled: has_replacement_character,
    },
    Rule {
        name: "missing-keywords",
        garbled: lacks_keywords,
    },
    Rule {
        name: "mojibake-run",
        garbled: has_mojibake_run,
    },
];

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn has_replacement_character(text: &str) -> bool {
    text.contains('\u{FFFD}')
}

fn lacks_keywords(text: &str) -> bool {
    keyword_count(text) < MIN_KEYWORDS
}

fn has_mojibake_run(text: &str) -> bool {
    let mut run = 0;
    for c in text.chars() {
        if MOJIBAKE_FINGERPRINT.contains(&c) {
            run += 1;
            if run >= MOJIBAKE_RUN {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Number of distinct structural keywords present anywhere in `text`.
pub fn keyword_count(text: &str) -> usize {
    let upper = text.to_ascii_uppercase();
    STRUCTURAL_KEYWORDS
        .iter()
        .filter(|keyword| memmem::find(upper.as_bytes(), keyword.as_bytes()).is_some())
        .count()
}

/// Name of the first rule that judges `text` garbled, if any.
pub fn garbled_by(text: &str) -> Option<&'static str> {
    RULES
        .iter()
        .find(|rule| (rule.garbled)(text))
        .map(|rule| rule.name)
}

pub fn is_garbled(text: &str) -> bool {
    garbled_by(text).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "PERFORMER \"人\"\nTITLE \"歌\"\nFILE \"a.flac\" WAVE\n  TRACK 01 AUDIO\n    INDEX 01 00:00:00\n";

    #[test]
    fn test_plausible_sheet() {
        assert_eq!(garbled_by(SHEET), None);
        assert_eq!(keyword_count(SHEET), 5);
    }

    #[test]
    fn test_blank() {
        assert_eq!(garbled_by(""), Some("blank"));
        assert_eq!(garbled_by(" \r\n\t"), Some("blank"));
    }

    #[test]
    fn test_replacement_character() {
        let text = format!("{}TITLE \"\u{FFFD}\"", SHEET);
        assert_eq!(garbled_by(&text), Some("replacement-character"));
        assert!(is_garbled("\u{FFFD}"));
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert!(!is_garbled("title \"x\"\nfile \"a.wav\" WAVE"));
        assert_eq!(keyword_count("Track, Index"), 2);
    }

    #[test]
    fn test_too_few_keywords() {
        assert_eq!(garbled_by("hello world"), Some("missing-keywords"));
        assert_eq!(garbled_by("TITLE \"only one\""), Some("missing-keywords"));
        // Repeats of one keyword count once.
        assert_eq!(garbled_by("TITLE TITLE TITLE"), Some("missing-keywords"));
    }

    #[test]
    fn test_mojibake_run() {
        let text = format!("{}TITLE \"ÄãºÃÃÄÅ\"", SHEET);
        assert_eq!(garbled_by(&text), Some("mojibake-run"));
    }

    #[test]
    fn test_short_accent_runs_pass() {
        assert!(!is_garbled("TITLE \"Café Müller\"\nPERFORMER \"Björk\""));
        assert!(!is_garbled("TITLE \"ÉÉ x ÉÉ\"\nFILE \"a.wav\" WAVE"));
    }

    #[test]
    fn test_fingerprint_bounds() {
        // U+00C2 sits just below the class, U+0100 just above.
        assert!(!has_mojibake_run("ÂÂÂ"));
        assert!(!has_mojibake_run("ĀĀĀ"));
        assert!(has_mojibake_run("ÃÿÃ"));
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            ["blank", "replacement-character", "missing-keywords", "mojibake-run"]
        );
    }
}
