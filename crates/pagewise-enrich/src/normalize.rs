//! Page text cleanup applied before any text reaches a model.

use once_cell::sync::Lazy;
use regex::Regex;

/// Repetitions of one unit (the first plus 20 more) that trigger collapsing.
pub const MIN_REPEATS: usize = 21;

static TABLE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(?:table|tr|td|th|thead|tbody|tfoot)\b[^>]*>")
        .expect("table tag pattern is valid")
});

/// Replace table markup tags by a single space.
pub fn strip_table_markup(text: &str) -> String {
    TABLE_TAG.replace_all(text, " ").into_owned()
}

/// Collapse runs of 21 or more back-to-back copies of the same substring into
/// one copy. The unit never spans a newline and the shortest unit found at the
/// leftmost position wins, which is how OCR stutter ("ERRERRERR...") shows up.
pub fn collapse_repeats(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    'scan: while i < chars.len() {
        let mut unit = 1;
        while i + unit * MIN_REPEATS <= chars.len() {
            if chars[i + unit - 1] == '\n' {
                break;
            }
            let count = repeat_count(&chars, i, unit);
            if count >= MIN_REPEATS {
                out.extend(&chars[i..i + unit]);
                i += unit * count;
                continue 'scan;
            }
            unit += 1;
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

/// Number of consecutive copies of `chars[start..start + unit]` starting at `start`.
fn repeat_count(chars: &[char], start: usize, unit: usize) -> usize {
    let pattern = &chars[start..start + unit];
    let mut count = 1;
    while let Some(next) = chars.get(start + count * unit..start + (count + 1) * unit) {
        if next != pattern {
            break;
        }
        count += 1;
    }
    count
}

/// Full per-page normalization: collapse stutter, then drop table markup.
pub fn normalize_page(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    strip_table_markup(&collapse_repeats(text))
}
