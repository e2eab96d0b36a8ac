//! JSON decoding for LLM responses.
//!
//! Models are asked for a single JSON object but routinely return it wrapped
//! in markdown fences, truncated mid-string by the output-token ceiling, or
//! cut off before the closing brackets. The decoder parses the common case
//! directly and applies one bounded repair pass before giving up.
//!
//! The decoder's only job is syntactic validity. Shape conformance is the
//! stage definition's concern.

use serde_json::Value;
use thiserror::Error;

/// Maximum characters of raw model output preserved in a decode error.
const ERROR_PREVIEW_CHARS: usize = 500;

/// Terminal decode failure: the text is not valid JSON and the bounded
/// repair sequence could not make it valid.
#[derive(Debug, Error)]
#[error("failed to parse model response as JSON: {message}")]
pub struct DecodeError {
    /// Parser error from the final parse attempt.
    pub message: String,
    /// Bounded preview of the raw response, for diagnostics only.
    /// Never shown to end users.
    pub raw_preview: String,
}

impl DecodeError {
    fn new(message: impl Into<String>, raw: &str) -> Self {
        Self {
            message: message.into(),
            raw_preview: raw.chars().take(ERROR_PREVIEW_CHARS).collect(),
        }
    }
}

/// Decode a raw model response into a JSON value.
///
/// Strips code fences, tries a direct parse (the fast path), and on failure
/// applies one bounded repair pass followed by a single re-parse. Well-formed
/// input is returned exactly as a direct parse would produce it.
pub fn decode(raw: &str) -> Result<Value, DecodeError> {
    let cleaned = strip_code_fences(raw).trim();

    match serde_json::from_str(cleaned) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            tracing::debug!(error = %first_err, "direct JSON parse failed, attempting repair");
            let repaired = repair(cleaned);
            serde_json::from_str(&repaired).map_err(|e| DecodeError::new(e.to_string(), raw))
        }
    }
}

/// Strip leading/trailing markdown code-fence markers (with optional
/// language tag) and surrounding whitespace.
fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();

    if let Some(rest) = s.strip_prefix("```") {
        // Drop the language tag line ("json", "JSON", or nothing).
        s = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest,
        };
    }

    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }

    s.trim()
}

/// Scan state after walking the text once, string-aware.
struct ScanState {
    /// Whether the scan ended inside an unterminated string.
    in_string: bool,
    /// Byte offset of the opening quote of that unterminated string.
    open_quote: Option<usize>,
    /// Open `{`/`[` delimiters outside strings, in nesting order.
    open_delims: Vec<char>,
}

fn scan(s: &str) -> ScanState {
    let mut in_string = false;
    let mut escape = false;
    let mut open_quote = None;
    let mut open_delims = Vec::new();

    for (i, c) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if c == '\\' && in_string {
            escape = true;
            continue;
        }
        if c == '"' {
            in_string = !in_string;
            open_quote = if in_string { Some(i) } else { None };
            continue;
        }
        if in_string {
            continue;
        }
        match c {
            '{' | '[' => open_delims.push(c),
            '}' => {
                if open_delims.last() == Some(&'{') {
                    open_delims.pop();
                }
            }
            ']' => {
                if open_delims.last() == Some(&'[') {
                    open_delims.pop();
                }
            }
            _ => {}
        }
    }

    ScanState {
        in_string,
        open_quote,
        open_delims,
    }
}

/// Bounded repair sequence for truncated JSON.
///
/// Applied in a fixed order, each pass at most once:
/// 1. Drop a trailing dangling `, "key` fragment and any trailing comma.
/// 2. Close an unterminated string.
/// 3. Close open brackets/braces in reverse-nesting order.
///
/// The result is not guaranteed to parse; the caller re-parses exactly once.
pub fn repair(cleaned: &str) -> String {
    let mut text = cleaned.trim_end().to_string();

    // Pass 1: a truncation that landed just after `, "` left a dangling
    // key fragment with no value. Cut back to before the comma.
    let state = scan(&text);
    if state.in_string {
        if let Some(q) = state.open_quote {
            let before = text[..q].trim_end();
            if before.ends_with(',') {
                text.truncate(before.len() - 1);
            }
        }
    }
    while text.trim_end().ends_with(',') {
        let trimmed_len = text.trim_end().len();
        text.truncate(trimmed_len - 1);
    }

    // Pass 2: close a string the truncation left open.
    let state = scan(&text);
    if state.in_string {
        text.push('"');
    }

    // Pass 3: close whatever containers remain open, innermost first.
    let state = scan(&text);
    for delim in state.open_delims.iter().rev() {
        text.push(match delim {
            '[' => ']',
            _ => '}',
        });
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_json_is_unchanged() {
        let raw = r#"{"courseName": "Physics 101", "credits": 3}"#;
        let direct: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(decode(raw).unwrap(), direct);
    }

    #[test]
    fn strips_json_code_fence() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(decode(raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn strips_bare_code_fence() {
        let raw = "```\n{\"a\": [1, 2]}\n```";
        assert_eq!(decode(raw).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn repairs_truncated_mid_string() {
        let raw = r#"{"courseName": "Intro to Chem"#;
        let value = decode(raw).unwrap();
        assert_eq!(value["courseName"], "Intro to Chem");
    }

    #[test]
    fn repairs_missing_closers() {
        // Three missing closers: ], ], }
        let raw = r#"{"weeks": [[1, 2"#;
        let value = decode(raw).unwrap();
        assert_eq!(value["weeks"], json!([[1, 2]]));
    }

    #[test]
    fn repairs_up_to_five_missing_brackets() {
        let raw = r#"{"a": {"b": {"c": [[1"#;
        let value = decode(raw).unwrap();
        assert_eq!(value["a"]["b"]["c"], json!([[1]]));
    }

    #[test]
    fn drops_dangling_key_fragment() {
        let raw = r#"{"courseName": "Bio", "instr"#;
        let value = decode(raw).unwrap();
        assert_eq!(value, json!({"courseName": "Bio"}));
    }

    #[test]
    fn drops_trailing_comma() {
        let raw = r#"{"a": 1,"#;
        assert_eq!(decode(raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn closes_in_reverse_nesting_order() {
        // Array opened inside object: must close ] before }.
        let raw = r#"{"topics": ["stoichiometry", "moles""#;
        let value = decode(raw).unwrap();
        assert_eq!(value["topics"], json!(["stoichiometry", "moles"]));
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let raw = r#"{"formula": "f(x) = {x}", "n": 1}"#;
        let direct: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(decode(raw).unwrap(), direct);
    }

    #[test]
    fn escaped_quotes_do_not_break_parity() {
        let raw = r#"{"note": "said \"hi\"", "weeks": [1"#;
        let value = decode(raw).unwrap();
        assert_eq!(value["note"], "said \"hi\"");
        assert_eq!(value["weeks"], json!([1]));
    }

    #[test]
    fn repair_is_idempotent_on_valid_output() {
        let raw = r#"{"topics": ["a", "b"#;
        let once = repair(raw);
        let _: Value = serde_json::from_str(&once).expect("first repair should be valid");
        assert_eq!(repair(&once), once);
    }

    #[test]
    fn unrepairable_input_fails_loudly() {
        let err = decode("this is not even close to JSON").unwrap_err();
        assert!(!err.raw_preview.is_empty());
    }

    #[test]
    fn error_preview_is_bounded() {
        let raw = format!("not json {}", "x".repeat(10_000));
        let err = decode(&raw).unwrap_err();
        assert!(err.raw_preview.chars().count() <= 500);
    }

    #[test]
    fn no_semantic_validation() {
        // Any syntactically valid JSON passes, shape is not the decoder's job.
        assert!(decode(r#"{"totally": "unrelated"}"#).is_ok());
        assert!(decode("[1, 2, 3]").is_ok());
    }
}
