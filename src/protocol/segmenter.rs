//! Splits model output into the free-form "thinking" prefix and the action
//! suffix, either over a complete buffer or token by token while streaming.
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::protocol::decoder::{DO_PREFIX, FINISH_PREFIX};

/// Strings that open the action part of a response, in priority order.
pub const ACTION_MARKERS: [&str; 2] = [FINISH_PREFIX, DO_PREFIX];

const ANSWER_OPEN: &str = "<answer>";
const ANSWER_CLOSE: &str = "</answer>";

/// Splits a complete response into `(thinking, action)`.
pub fn split_response(content: &str) -> (String, String) {
    for marker in ACTION_MARKERS {
        if let Some(idx) = content.find(marker) {
            let thinking = clean_thinking(&content[..idx]);
            let action = content[idx..].trim_end();
            let action = action.strip_suffix(ANSWER_CLOSE).unwrap_or(action).trim_end();
            return (thinking, action.to_string());
        }
    }

    if let Some((before, after)) = content.split_once(ANSWER_OPEN) {
        let thinking = clean_thinking(before);
        let action = after.replace(ANSWER_CLOSE, "").trim().to_string();
        return (thinking, action);
    }

    (String::new(), content.to_string())
}

fn clean_thinking(text: &str) -> String {
    let text = text.trim();
    let text = text.strip_suffix(ANSWER_OPEN).unwrap_or(text);
    text.replace("<think>", "")
        .replace("</think>", "")
        .trim()
        .to_string()
}

/// Latency figures gathered while a response streamed in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimings {
    pub time_to_first_token: Option<Duration>,
    pub time_to_phase_switch: Option<Duration>,
    pub total: Duration,
}

/// Output of a finished stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmented {
    pub thinking: String,
    pub action: String,
    pub raw: String,
    pub timings: ResponseTimings,
}

/// Incremental splitter for streamed tokens.
///
/// Thinking text is released as soon as it cannot be the start of an action
/// marker, so emitted text never contains a marker or a fragment of one. Once
/// a marker is seen everything else is held back; the action is taken from
/// the full raw content in [`StreamSegmenter::finish`].
#[derive(Debug)]
pub struct StreamSegmenter {
    raw: String,
    buffer: String,
    in_action_phase: bool,
    started: Instant,
    first_token: Option<Duration>,
    phase_switch: Option<Duration>,
}

impl Default for StreamSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSegmenter {
    pub fn new() -> Self {
        Self {
            raw: String::new(),
            buffer: String::new(),
            in_action_phase: false,
            started: Instant::now(),
            first_token: None,
            phase_switch: None,
        }
    }

    pub fn in_action_phase(&self) -> bool {
        self.in_action_phase
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Feeds one token. Returns thinking text that is safe to show now.
    pub fn push(&mut self, token: &str) -> Option<String> {
        if token.is_empty() {
            return None;
        }
        self.raw.push_str(token);
        if self.first_token.is_none() {
            self.first_token = Some(self.started.elapsed());
        }
        if self.in_action_phase {
            return None;
        }

        self.buffer.push_str(token);

        let earliest = ACTION_MARKERS
            .iter()
            .filter_map(|m| self.buffer.find(m))
            .min();
        if let Some(idx) = earliest {
            let thinking = self.buffer[..idx].to_string();
            self.buffer.clear();
            self.in_action_phase = true;
            self.phase_switch = Some(self.started.elapsed());
            return Some(thinking).filter(|t| !t.is_empty());
        }

        if self.tail_may_start_marker() {
            return None;
        }
        Some(std::mem::take(&mut self.buffer))
    }

    fn tail_may_start_marker(&self) -> bool {
        ACTION_MARKERS.iter().any(|marker| {
            (1..marker.len()).any(|len| self.buffer.ends_with(&marker[..len]))
        })
    }

    pub fn finish(self) -> Segmented {
        let (thinking, action) = split_response(&self.raw);
        Segmented {
            thinking,
            action,
            timings: ResponseTimings {
                time_to_first_token: self.first_token,
                time_to_phase_switch: self.phase_switch,
                total: self.started.elapsed(),
            },
            raw: self.raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_buffer_priority() {
        let (t, a) = split_response("look at screen\nfinish(message=\"done\")");
        assert_eq!(t, "look at screen");
        assert_eq!(a, "finish(message=\"done\")");

        let (t, a) = split_response("tap it <answer>do(action=\"Tap\", element=[1,2])</answer>");
        assert_eq!(t, "tap it");
        assert_eq!(a, "do(action=\"Tap\", element=[1,2])");

        let (t, a) = split_response("<think>hm</think><answer>[3,4]</answer>");
        assert_eq!(t, "hm");
        assert_eq!(a, "[3,4]");

        let (t, a) = split_response("no markers at all");
        assert_eq!(t, "");
        assert_eq!(a, "no markers at all");
    }

    #[test]
    fn finish_marker_beats_do_marker() {
        let (_, a) = split_response("do(action=\"Back\") finish(message=x)");
        assert_eq!(a, "finish(message=x)");
    }

    #[test]
    fn char_by_char_never_leaks_marker() {
        let input = "thinking...do(action=\"Tap\", element=[1,2])";
        let mut seg = StreamSegmenter::new();
        let mut shown = String::new();
        for ch in input.chars() {
            if let Some(out) = seg.push(&ch.to_string()) {
                shown.push_str(&out);
            }
        }
        assert!("thinking...".starts_with(shown.as_str()), "shown: {shown}");
        assert!(!shown.contains("do(act"));
        assert!(seg.in_action_phase());
        let done = seg.finish();
        assert_eq!(done.thinking, "thinking...");
        assert_eq!(done.action, "do(action=\"Tap\", element=[1,2])");
        assert!(done.timings.time_to_phase_switch.is_some());
    }

    #[test]
    fn ambiguous_tail_is_withheld_until_resolved() {
        let mut seg = StreamSegmenter::new();
        assert_eq!(seg.push("open the fi"), None);
        assert_eq!(seg.push("le"), Some("open the file".to_string()));
        assert_eq!(seg.push(" now d"), None);
        assert_eq!(seg.push("o(action=\"Back\")"), Some(" now ".to_string()));
        assert_eq!(seg.push(" trailing"), None);
        assert_eq!(seg.raw(), "open the file now do(action=\"Back\") trailing");
    }

    #[test]
    fn marker_split_across_many_tokens() {
        let mut seg = StreamSegmenter::new();
        let mut shown = String::new();
        for tok in ["ok ", "fin", "ish(", "mess", "age=", "\"bye\")"] {
            if let Some(out) = seg.push(tok) {
                shown.push_str(&out);
            }
        }
        assert_eq!(shown, "ok ");
        assert_eq!(seg.finish().action, "finish(message=\"bye\")");
    }
}
