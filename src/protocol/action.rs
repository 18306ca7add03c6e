use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::coordinates::parse_point;

/// Upper bound of the relative coordinate space shared by every model prompt.
pub const COORD_MAX: f64 = 1000.0;

/// Default hold time for a long press, in milliseconds.
pub const LONG_PRESS_MS: u64 = 3000;

/// Relative screen position on a 0–1000 scale, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Builds a point, clamping both axes into `[0, 1000]`. NaN collapses to 0.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: clamp_coord(x),
            y: clamp_coord(y),
        }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

fn clamp_coord(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, COORD_MAX)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

/// One device command, fully validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Launch { app: String },
    Tap {
        point: Point,
        /// Set when the model flags the tap as sensitive; the dispatcher asks for confirmation.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Type { text: String },
    Swipe { start: Point, end: Point },
    Back,
    Home,
    DoubleTap { point: Point },
    LongPress { point: Point },
    Wait { seconds: f64 },
    TakeOver { message: String },
    Finish { message: String },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Launch { .. } => ActionKind::Launch,
            Action::Tap { .. } => ActionKind::Tap,
            Action::Type { .. } => ActionKind::Type,
            Action::Swipe { .. } => ActionKind::Swipe,
            Action::Back => ActionKind::Back,
            Action::Home => ActionKind::Home,
            Action::DoubleTap { .. } => ActionKind::DoubleTap,
            Action::LongPress { .. } => ActionKind::LongPress,
            Action::Wait { .. } => ActionKind::Wait,
            Action::TakeOver { .. } => ActionKind::TakeOver,
            Action::Finish { .. } => ActionKind::Finish,
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Action::Finish { .. })
    }

    /// Canonical wire string, the exact form the models are prompted to emit.
    pub fn encode(&self) -> String {
        let name = self.kind().wire_name();
        match self {
            Action::Finish { message } => format!("finish(message=\"{message}\")"),
            Action::Launch { app } => format!("do(action=\"{name}\", app=\"{app}\")"),
            Action::Tap { point, message: None } => {
                format!("do(action=\"{name}\", element={point})")
            }
            Action::Tap {
                point,
                message: Some(message),
            } => format!("do(action=\"{name}\", element={point}, message=\"{message}\")"),
            Action::Type { text } => format!("do(action=\"{name}\", text=\"{text}\")"),
            Action::Swipe { start, end } => {
                format!("do(action=\"{name}\", start={start}, end={end})")
            }
            Action::Back | Action::Home => format!("do(action=\"{name}\")"),
            Action::DoubleTap { point } | Action::LongPress { point } => {
                format!("do(action=\"{name}\", element={point})")
            }
            Action::Wait { seconds } => {
                format!("do(action=\"{name}\", duration=\"{seconds} seconds\")")
            }
            Action::TakeOver { message } => {
                format!("do(action=\"{name}\", message=\"{message}\")")
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Action tag without its payload. Used before coordinates are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Launch,
    Tap,
    Type,
    Swipe,
    Back,
    Home,
    DoubleTap,
    LongPress,
    Wait,
    TakeOver,
    Finish,
}

impl ActionKind {
    /// Accepts the wire names plus the spellings planners tend to use.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.trim() {
            "Launch" => Self::Launch,
            "Tap" => Self::Tap,
            "Type" | "Type_Name" => Self::Type,
            "Swipe" => Self::Swipe,
            "Back" => Self::Back,
            "Home" => Self::Home,
            "Double Tap" | "DoubleTap" => Self::DoubleTap,
            "Long Press" | "LongPress" => Self::LongPress,
            "Wait" => Self::Wait,
            "Take_over" | "TakeOver" => Self::TakeOver,
            "finish" | "Finish" => Self::Finish,
            _ => return None,
        };
        Some(kind)
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Launch => "Launch",
            Self::Tap => "Tap",
            Self::Type => "Type",
            Self::Swipe => "Swipe",
            Self::Back => "Back",
            Self::Home => "Home",
            Self::DoubleTap => "Double Tap",
            Self::LongPress => "Long Press",
            Self::Wait => "Wait",
            Self::TakeOver => "Take_over",
            Self::Finish => "finish",
        }
    }

    /// Kinds that cannot be dispatched until a locator supplies screen coordinates.
    pub fn needs_coordinates(self) -> bool {
        matches!(
            self,
            Self::Tap | Self::DoubleTap | Self::LongPress | Self::Swipe
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("{0}")]
    MissingParameter(&'static str),
}

/// Structural result of decoding model text: the call shape is known, the
/// parameters are not yet validated against the action they belong to.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionCall {
    Finish { message: String },
    Do {
        name: String,
        params: Vec<(String, String)>,
    },
}

impl ActionCall {
    pub fn finish(message: impl Into<String>) -> Self {
        Self::Finish {
            message: message.into(),
        }
    }

    /// Label recorded in step history.
    pub fn label(&self) -> &str {
        match self {
            Self::Finish { .. } => "finish",
            Self::Do { name, .. } => name,
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish { .. })
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        match self {
            Self::Finish { message } if key == "message" => Some(message),
            Self::Finish { .. } => None,
            Self::Do { params, .. } => params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
        }
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.param(key).filter(|v| !v.trim().is_empty())
    }

    /// Validates the call against the action it names.
    pub fn to_action(&self) -> Result<Action, CallError> {
        let name = match self {
            Self::Finish { message } => {
                return Ok(Action::Finish {
                    message: message.clone(),
                })
            }
            Self::Do { name, .. } => name,
        };
        let kind =
            ActionKind::from_name(name).ok_or_else(|| CallError::UnknownAction(name.clone()))?;

        let element = || {
            self.non_empty("element")
                .map(parse_point)
                .ok_or(CallError::MissingParameter("No element coordinates"))
        };

        let action = match kind {
            ActionKind::Launch => Action::Launch {
                app: self
                    .non_empty("app")
                    .ok_or(CallError::MissingParameter("No app name specified"))?
                    .to_string(),
            },
            ActionKind::Tap => Action::Tap {
                point: element()?,
                message: self.non_empty("message").map(str::to_string),
            },
            ActionKind::Type => Action::Type {
                text: self
                    .non_empty("text")
                    .ok_or(CallError::MissingParameter("No text specified"))?
                    .to_string(),
            },
            ActionKind::Swipe => {
                match (self.non_empty("start"), self.non_empty("end")) {
                    (Some(start), Some(end)) => Action::Swipe {
                        start: parse_point(start),
                        end: parse_point(end),
                    },
                    _ => return Err(CallError::MissingParameter("Missing swipe coordinates")),
                }
            }
            ActionKind::Back => Action::Back,
            ActionKind::Home => Action::Home,
            ActionKind::DoubleTap => Action::DoubleTap { point: element()? },
            ActionKind::LongPress => Action::LongPress { point: element()? },
            ActionKind::Wait => Action::Wait {
                seconds: parse_wait_seconds(self.param("duration")),
            },
            ActionKind::TakeOver => Action::TakeOver {
                message: self
                    .non_empty("message")
                    .unwrap_or("User intervention required")
                    .to_string(),
            },
            ActionKind::Finish => Action::Finish {
                message: self.param("message").unwrap_or_default().to_string(),
            },
        };
        Ok(action)
    }
}

/// `"2 seconds"`, `"2"` and `"0.5"` are all accepted; anything else waits one second.
fn parse_wait_seconds(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else { return 1.0 };
    let trimmed = raw.trim();
    let number = trimmed
        .strip_suffix("seconds")
        .or_else(|| trimmed.strip_suffix("second"))
        .unwrap_or(trimmed)
        .trim();
    match number.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => secs,
        _ => 1.0,
    }
}

impl From<&Action> for ActionCall {
    fn from(action: &Action) -> Self {
        let name = action.kind().wire_name().to_string();
        let params: Vec<(&str, String)> = match action {
            Action::Finish { message } => return ActionCall::finish(message.clone()),
            Action::Launch { app } => vec![("app", app.clone())],
            Action::Tap { point, message } => {
                let mut p = vec![("element", point.to_string())];
                if let Some(m) = message {
                    p.push(("message", m.clone()));
                }
                p
            }
            Action::Type { text } => vec![("text", text.clone())],
            Action::Swipe { start, end } => {
                vec![("start", start.to_string()), ("end", end.to_string())]
            }
            Action::Back | Action::Home => Vec::new(),
            Action::DoubleTap { point } | Action::LongPress { point } => {
                vec![("element", point.to_string())]
            }
            Action::Wait { seconds } => vec![("duration", format!("{seconds} seconds"))],
            Action::TakeOver { message } => vec![("message", message.clone())],
        };
        ActionCall::Do {
            name,
            params: params
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}
