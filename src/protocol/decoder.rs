//! Decoder for the function-call mini-language the phone models answer in:
//!
//! ```text
//! finish(message="done")
//! do(action="Tap", element=[500,500])
//! do(action="Type", text="free text, with commas")
//! ```
use crate::errors::{PhoneClawError, PhoneClawResult};
use crate::protocol::action::{Action, ActionCall};

pub const FINISH_PREFIX: &str = "finish(message=";
pub const DO_PREFIX: &str = "do(action=";

/// Free text may contain quotes and commas, so typing is split on `text=` instead
/// of going through the generic parameter scanner.
const TYPE_PREFIXES: [&str; 2] = ["do(action=\"Type\"", "do(action=\"Type_Name\""];

/// Decodes model text into a call shape without checking which parameters the
/// named action requires.
pub fn parse_call(response: &str) -> PhoneClawResult<ActionCall> {
    let response = response.trim();

    if let Some(rest) = response.strip_prefix(FINISH_PREFIX) {
        let body = match rest.rfind(')') {
            Some(end) => &rest[..end],
            None => rest,
        };
        return Ok(ActionCall::finish(strip_outer_quotes(body)));
    }

    if TYPE_PREFIXES.iter().any(|p| response.starts_with(p)) {
        if let Some((_, text)) = response.split_once("text=") {
            let text = strip_outer_quotes(text.strip_suffix(')').unwrap_or(text));
            return Ok(ActionCall::Do {
                name: "Type".to_string(),
                params: vec![("text".to_string(), text.to_string())],
            });
        }
    }

    if response.starts_with(DO_PREFIX) {
        let inner = &response["do(".len()..];
        let inner = match inner.rfind(')') {
            Some(end) => &inner[..end],
            None => inner,
        };
        let mut params = scan_params(inner);
        let name = match params.iter().position(|(k, _)| k == "action") {
            Some(idx) => params.remove(idx).1,
            None => String::new(),
        };
        return Ok(ActionCall::Do { name, params });
    }

    Err(PhoneClawError::Decode("failed to parse action".into()))
}

/// Decodes and validates in one go. Validation failures are reported as decode
/// errors here; the dispatcher reports them as step failures instead.
pub fn decode(response: &str) -> PhoneClawResult<Action> {
    parse_call(response)?
        .to_action()
        .map_err(|e| PhoneClawError::Decode(e.to_string()))
}

/// Removes one pair of matching surrounding quotes, if present.
fn strip_outer_quotes(s: &str) -> &str {
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Skipping separators or collecting a key up to `=`.
    Key,
    /// Just past `=`; the first significant char decides quoted vs bare.
    ValueStart,
    /// Inside a quoted value, waiting for the matching quote. No escapes.
    Quoted(char),
    /// Bare value; ends at a comma seen at bracket depth zero.
    Bare { depth: usize },
    /// After a closing quote, discarding up to the next separator.
    Trailing,
}

/// Splits `key=value, key="value", key=[a, b]` into ordered pairs.
///
/// An unterminated quote or unbalanced `[` runs the value to the end of input;
/// a stray `]` never drives the depth below zero; a key with no `=` is dropped.
pub(crate) fn scan_params(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut state = ScanState::Key;
    let mut key = String::new();
    let mut value = String::new();

    let mut emit = |key: &mut String, value: &mut String, trim: bool| {
        let v = if trim {
            value.trim().to_string()
        } else {
            std::mem::take(value)
        };
        pairs.push((key.trim().to_string(), v));
        key.clear();
        value.clear();
    };

    for ch in content.chars() {
        state = match state {
            ScanState::Key => match ch {
                '=' => ScanState::ValueStart,
                ' ' | '\t' | ',' if key.is_empty() => ScanState::Key,
                _ => {
                    key.push(ch);
                    ScanState::Key
                }
            },
            ScanState::ValueStart => match ch {
                ' ' | '\t' => ScanState::ValueStart,
                '"' | '\'' => ScanState::Quoted(ch),
                ',' => {
                    emit(&mut key, &mut value, true);
                    ScanState::Key
                }
                '[' => {
                    value.push(ch);
                    ScanState::Bare { depth: 1 }
                }
                _ => {
                    value.push(ch);
                    ScanState::Bare { depth: 0 }
                }
            },
            ScanState::Quoted(q) if ch == q => {
                emit(&mut key, &mut value, false);
                ScanState::Trailing
            }
            ScanState::Quoted(q) => {
                value.push(ch);
                ScanState::Quoted(q)
            }
            ScanState::Bare { depth } => match ch {
                ',' if depth == 0 => {
                    emit(&mut key, &mut value, true);
                    ScanState::Key
                }
                '[' => {
                    value.push(ch);
                    ScanState::Bare { depth: depth + 1 }
                }
                ']' => {
                    value.push(ch);
                    ScanState::Bare {
                        depth: depth.saturating_sub(1),
                    }
                }
                _ => {
                    value.push(ch);
                    ScanState::Bare { depth }
                }
            },
            ScanState::Trailing => match ch {
                ',' => ScanState::Key,
                _ => ScanState::Trailing,
            },
        };
    }

    match state {
        ScanState::Quoted(_) => emit(&mut key, &mut value, false),
        ScanState::Bare { .. } => emit(&mut key, &mut value, true),
        ScanState::Key | ScanState::ValueStart | ScanState::Trailing => {}
    }
    pairs
}
