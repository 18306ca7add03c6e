//! Planner output: `<thought>`, `<action>`, `<parameters>` and `<reason>` blocks,
//! each optional and in any order.
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{PhoneClawError, PhoneClawResult};
use crate::protocol::action::{ActionCall, ActionKind, Point};
use crate::protocol::coordinates::swipe_endpoints;

fn tag_regex(tag: &str) -> Regex {
    // An unclosed tag runs to the end of the text.
    Regex::new(&format!(r"(?s)<{tag}>(.*?)(?:</{tag}>|$)")).expect("valid plan tag regex")
}

static THOUGHT_RE: LazyLock<Regex> = LazyLock::new(|| tag_regex("thought"));
static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| tag_regex("action"));
static PARAMETERS_RE: LazyLock<Regex> = LazyLock::new(|| tag_regex("parameters"));
static REASON_RE: LazyLock<Regex> = LazyLock::new(|| tag_regex("reason"));

/// Planner intent before coordinates are known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Empty when the planner produced no `<action>` block.
    pub action_type: String,
    pub parameters: Map<String, Value>,
    pub reason: String,
    pub thought: String,
    pub finished: bool,
}

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Lenient decode: missing blocks leave their field at its zero value and
/// malformed parameter JSON leaves the map empty.
pub fn decode_plan(text: &str) -> Plan {
    let trimmed = |re: &Regex| capture(re, text).map(str::trim).unwrap_or_default().to_string();

    let action_type = trimmed(&ACTION_RE);
    let parameters = capture(&PARAMETERS_RE, text)
        .and_then(|raw| serde_json::from_str::<Map<String, Value>>(raw.trim()).ok())
        .unwrap_or_default();
    let finished = text.contains("finish") || action_type == "finish";

    Plan {
        parameters,
        reason: trimmed(&REASON_RE),
        thought: trimmed(&THOUGHT_RE),
        finished,
        action_type,
    }
}

impl Plan {
    pub fn kind(&self) -> Option<ActionKind> {
        ActionKind::from_name(&self.action_type)
    }

    pub fn is_terminal(&self) -> bool {
        self.finished || self.kind() == Some(ActionKind::Finish)
    }

    pub fn needs_coordinates(&self) -> bool {
        self.kind().is_some_and(ActionKind::needs_coordinates)
    }

    /// String view of a parameter. Numbers and booleans are rendered, other
    /// shapes are serialized as JSON.
    pub fn param_string(&self, key: &str) -> Option<String> {
        self.parameters.get(key).and_then(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    }

    /// What the locator is asked to find: the reason, prefixed with the verb
    /// for the gesture. Falls back to a `target` parameter when no reason was given.
    pub fn target_description(&self, lang: &str) -> String {
        let subject = if self.reason.is_empty() {
            self.param_string("target").unwrap_or_default()
        } else {
            self.reason.clone()
        };
        let verb = match (self.kind(), lang) {
            (Some(ActionKind::Tap), "en") => "Tap: ",
            (Some(ActionKind::Swipe), "en") => "Swipe: ",
            (Some(ActionKind::DoubleTap), "en") => "Double tap: ",
            (Some(ActionKind::LongPress), "en") => "Long press: ",
            (Some(ActionKind::Tap), _) => "需要点击：",
            (Some(ActionKind::Swipe), _) => "需要滑动：",
            (Some(ActionKind::DoubleTap), _) => "需要双击：",
            (Some(ActionKind::LongPress), _) => "需要长按：",
            _ => "",
        };
        format!("{verb}{subject}")
    }

    /// Merges the plan with located points into a call for the dispatcher.
    ///
    /// Terminal plans become `finish` carrying the reason. Unknown or empty
    /// action types pass through by name so the dispatcher reports them.
    /// Coordinate kinds need at least one point.
    pub fn to_call(&self, points: &[Point]) -> PhoneClawResult<ActionCall> {
        if self.is_terminal() {
            return Ok(ActionCall::finish(self.reason.clone()));
        }

        let Some(kind) = self.kind() else {
            return Ok(ActionCall::Do {
                name: self.action_type.clone(),
                params: Vec::new(),
            });
        };

        let mut params: Vec<(String, String)> = Vec::new();
        let mut copy = |key: &str| {
            if let Some(v) = self.param_string(key) {
                params.push((key.to_string(), v));
            }
        };
        match kind {
            ActionKind::Launch => copy("app"),
            ActionKind::Type => copy("text"),
            ActionKind::Wait => copy("duration"),
            ActionKind::TakeOver => copy("message"),
            ActionKind::Tap | ActionKind::DoubleTap | ActionKind::LongPress => {
                let point = points.first().ok_or_else(no_coordinates)?;
                params.push(("element".to_string(), point.to_string()));
            }
            ActionKind::Swipe => {
                let (start, end) =
                    swipe_endpoints(points, &self.reason).ok_or_else(no_coordinates)?;
                params.push(("start".to_string(), start.to_string()));
                params.push(("end".to_string(), end.to_string()));
            }
            ActionKind::Back | ActionKind::Home | ActionKind::Finish => {}
        }

        Ok(ActionCall::Do {
            name: kind.wire_name().to_string(),
            params,
        })
    }
}

fn no_coordinates() -> PhoneClawError {
    PhoneClawError::Resolve("no coordinates returned".into())
}
