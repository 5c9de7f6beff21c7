//! Best-effort repair of almost-JSON produced by language models.
//!
//! Handles markdown fences, prose around the object, single-quoted strings,
//! bare keys and values, Python literals, trailing commas, and output that
//! was cut off before its strings or brackets were closed.

use serde_json::Value;

/// Repair `raw` into JSON text. Returns `None` when no object or array is found.
pub fn repair_json(raw: &str) -> Option<String> {
    let body = strip_code_fence(raw);
    let start = body.find(|c: char| c == '{' || c == '[')?;
    let chars: Vec<char> = body[start..].chars().collect();

    let mut out = String::with_capacity(chars.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' => {
                out.push('{');
                closers.push('}');
                i += 1;
            }
            '[' => {
                out.push('[');
                closers.push(']');
                i += 1;
            }
            '}' | ']' => {
                trim_trailing_comma(&mut out);
                match closers.pop() {
                    Some(closer) => out.push(closer),
                    None => break,
                }
                i += 1;
                if closers.is_empty() {
                    break;
                }
            }
            '"' | '\'' => {
                i = read_string(&chars, i, &mut out);
            }
            ',' | ':' => {
                out.push(c);
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            _ => {
                let end = bare_token_end(&chars, i);
                let token: String = chars[i..end].iter().collect();
                out.push_str(&bare_token_to_json(token.trim()));
                i = end;
            }
        }
    }

    if !closers.is_empty() {
        trim_trailing_comma(&mut out);
        if out.ends_with(':') {
            out.push_str("\"\"");
        }
        while let Some(closer) = closers.pop() {
            out.push(closer);
        }
    }

    Some(out)
}

/// Repair and parse in one step.
pub fn parse_repaired(raw: &str) -> Result<Value, String> {
    let repaired = repair_json(raw).ok_or_else(|| "no JSON object in output".to_string())?;
    serde_json::from_str(&repaired).map_err(|e| format!("{e} in {repaired:?}"))
}

fn strip_code_fence(raw: &str) -> &str {
    let Some(open) = raw.find("```") else {
        return raw;
    };
    let before = &raw[..open];
    let after = &raw[open + 3..];
    // Skip a language tag such as ```json
    let inner = match after.find('\n') {
        Some(newline) if !has_json_start(&after[..newline]) => &after[newline + 1..],
        _ => after,
    };
    let fenced = match inner.find("```") {
        Some(close) => &inner[..close],
        None => inner,
    };
    // A stray fence after the value
    if !has_json_start(fenced) && has_json_start(before) {
        return before;
    }
    fenced
}

fn has_json_start(text: &str) -> bool {
    text.contains(|c: char| c == '{' || c == '[')
}

fn trim_trailing_comma(out: &mut String) {
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    if out.ends_with(',') {
        out.pop();
    }
}

/// Copy a quoted string starting at `start` as a double-quoted JSON string.
/// Returns the index just past the closing quote.
fn read_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    out.push('"');

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' if i + 1 < chars.len() => {
                let next = chars[i + 1];
                if next == '\'' {
                    out.push('\'');
                } else {
                    out.push('\\');
                    out.push(next);
                }
                i += 2;
                continue;
            }
            '\\' => {
                i += 1;
                continue;
            }
            c if c == quote => {
                out.push('"');
                return i + 1;
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
        i += 1;
    }

    // Unterminated string
    out.push('"');
    i
}

fn bare_token_end(chars: &[char], start: usize) -> usize {
    chars[start..]
        .iter()
        .position(|c| matches!(c, ',' | ':' | '{' | '}' | '[' | ']' | '\n'))
        .map(|offset| start + offset)
        .unwrap_or(chars.len())
}

fn bare_token_to_json(token: &str) -> String {
    match token {
        "True" | "true" => return "true".to_string(),
        "False" | "false" => return "false".to_string(),
        "None" | "null" => return "null".to_string(),
        _ => {}
    }
    if matches!(serde_json::from_str::<Value>(token), Ok(Value::Number(_))) {
        return token.to_string();
    }
    Value::String(token.to_string()).to_string()
}
