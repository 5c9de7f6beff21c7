//! Script-share language detection for choosing the summary language.

use pagewise_core::Language;
use std::cmp::Ordering;

/// Share of Chinese characters above which Chinese wins as the runner-up script.
const SECONDARY_CHINESE_SHARE: f64 = 0.2;

/// Punctuation removed before counting, beyond ASCII punctuation.
const EXTRA_PUNCTUATION: &[char] = &[
    '’', '‘', '“', '”', '·', '°', '–', '，', '。', '★', '、', '…', '【', '】', '（', '）', '《',
    '》', '？', '！',
];

/// Script bucket a character is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Chinese,
    English,
    Unknown,
}

impl Script {
    fn of(c: char) -> Script {
        if ('\u{4e00}'..='\u{9fff}').contains(&c) {
            Script::Chinese
        } else if c.is_ascii_alphabetic() {
            Script::English
        } else {
            Script::Unknown
        }
    }
}

/// Counts script shares over cleaned text.
#[derive(Debug, Clone, Default)]
pub struct LanguageDetector {
    keep_unknown: bool,
}

impl LanguageDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count unmatched characters as their own bucket instead of as English.
    pub fn keep_unknown(mut self, keep: bool) -> Self {
        self.keep_unknown = keep;
        self
    }

    /// Script shares, highest first. Ties keep Chinese ahead of English.
    pub fn shares(&self, text: &str) -> Vec<(Script, f64)> {
        let mut chinese = 0usize;
        let mut english = 0usize;
        let mut unknown = 0usize;

        for c in text.chars().filter(|c| !is_stripped(*c)) {
            match Script::of(c) {
                Script::Chinese => chinese += 1,
                Script::English => english += 1,
                Script::Unknown if self.keep_unknown => unknown += 1,
                Script::Unknown => english += 1,
            }
        }

        let total = chinese + english + unknown;
        if total == 0 {
            return Vec::new();
        }

        let mut shares: Vec<(Script, f64)> = [
            (Script::Chinese, chinese),
            (Script::English, english),
            (Script::Unknown, unknown),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(script, count)| (script, count as f64 / total as f64))
        .collect();

        shares.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        shares
    }

    /// Chinese if it is the leading script, or the runner-up with more than 20%.
    pub fn detect(&self, text: &str) -> Language {
        let shares = self.shares(text);
        let leading = shares.first().map(|(script, _)| *script);
        let runner_up = shares.get(1).copied();

        match (leading, runner_up) {
            (Some(Script::Chinese), _) => Language::Chinese,
            (_, Some((Script::Chinese, share))) if share > SECONDARY_CHINESE_SHARE => {
                Language::Chinese
            }
            _ => Language::English,
        }
    }
}

fn is_stripped(c: char) -> bool {
    c.is_whitespace()
        || c.is_ascii_punctuation()
        || c.is_ascii_digit()
        || EXTRA_PUNCTUATION.contains(&c)
}

/// Detect the summary language with the default detector.
pub fn detect_language(text: &str) -> Language {
    LanguageDetector::default().detect(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_chinese() {
        assert_eq!(detect_language("广东省2023年财政预算报告"), Language::Chinese);
    }

    #[test]
    fn test_detects_english() {
        assert_eq!(detect_language("Annual budget report, 2023."), Language::English);
    }

    #[test]
    fn test_empty_and_punctuation_only_default_to_english() {
        assert_eq!(detect_language(""), Language::English);
        assert_eq!(detect_language("123, 456. ！？\n"), Language::English);
    }

    #[test]
    fn test_chinese_runner_up_above_threshold() {
        // 3 Chinese against 7 Latin letters: 30% share
        assert_eq!(detect_language("abcdefg广东省"), Language::Chinese);
        // 1 Chinese against 9 Latin letters: 10% share
        assert_eq!(detect_language("abcdefghi省"), Language::English);
    }

    #[test]
    fn test_ties_keep_chinese_first() {
        let shares = LanguageDetector::new().shares("ab广东");
        assert_eq!(shares[0].0, Script::Chinese);
        assert_eq!(shares[1].0, Script::English);
    }

    #[test]
    fn test_unknown_bucket() {
        let text = "αβγδ";
        let default = LanguageDetector::new().shares(text);
        assert_eq!(default, vec![(Script::English, 1.0)]);

        let kept = LanguageDetector::new().keep_unknown(true).shares(text);
        assert_eq!(kept, vec![(Script::Unknown, 1.0)]);
    }
}
