//! Process-wide read-only tables.

use std::ops::RangeInclusive;

use encoding_rs::Encoding;
use encoding_rs::BIG5_INIT;
use encoding_rs::EUC_KR_INIT;
use encoding_rs::GB18030_INIT;
use encoding_rs::SHIFT_JIS_INIT;
use encoding_rs::UTF_8_INIT;
use encoding_rs::WINDOWS_1252_INIT;

/// One entry of the ordered candidate list.
#[derive(Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Canonical lower-case label reported in results.
    pub label: &'static str,
    /// Name shown to a human picking an override.
    pub display_name: &'static str,
    pub encoding: &'static Encoding,
}

/// Tried in this order; the last entry doubles as the lenient fallback.
pub static CANDIDATES: [Candidate; 6] = [
    Candidate {
        label: "utf-8",
        display_name: "UTF-8",
        encoding: &UTF_8_INIT,
    },
    Candidate {
        label: "gb18030",
        display_name: "简体中文 (GB18030)",
        encoding: &GB18030_INIT,
    },
    Candidate {
        label: "big5",
        display_name: "繁体中文 (Big5)",
        encoding: &BIG5_INIT,
    },
    Candidate {
        label: "shift-jis",
        display_name: "日文 (Shift-JIS)",
        encoding: &SHIFT_JIS_INIT,
    },
    Candidate {
        label: "euc-kr",
        display_name: "韩文 (EUC-KR)",
        encoding: &EUC_KR_INIT,
    },
    Candidate {
        label: "windows-1252",
        display_name: "西欧 (Windows-1252)",
        encoding: &WINDOWS_1252_INIT,
    },
];

pub const FALLBACK_INDEX: usize = 5;

/// Narrower code pages decoded with the broader one covering the same script.
pub static ALIASES: [(&str, &str); 3] = [
    ("gbk", "gb18030"),
    ("gb2312", "gb18030"),
    ("x-gbk", "gb18030"),
];

/// Selection sentinel meaning "run the candidate loop".
pub const AUTO_LABEL: &str = "auto";

/// CUE grammar tokens, matched case-insensitively.
pub static STRUCTURAL_KEYWORDS: [&str; 5] = ["TITLE", "PERFORMER", "TRACK", "FILE", "INDEX"];

pub const MIN_KEYWORDS: usize = 2;

/// Ã through ÿ: what CJK lead/trail bytes look like through a Western code page.
pub const MOJIBAKE_FINGERPRINT: RangeInclusive<char> = '\u{C3}'..='\u{FF}';

pub const MOJIBAKE_RUN: usize = 3;

pub const UTF_8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
