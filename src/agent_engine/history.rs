use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent_engine::state::StepRecord;
use crate::errors::PhoneClawResult;

const REASON_LIMIT: usize = 100;

/// Cuts reasoning down to [`REASON_LIMIT`] characters, marking the cut with `...`.
pub fn summarize_reason(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(REASON_LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Append-only list of step outcomes for the current task.
#[derive(Debug, Clone, Default)]
pub struct ActionHistory {
    records: Vec<StepRecord>,
}

impl ActionHistory {
    pub fn push(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// The most recent `limit` records; all of them when `limit` is `None`.
    pub fn recent(&self, limit: Option<usize>) -> &[StepRecord] {
        match limit {
            Some(n) if n < self.records.len() => &self.records[self.records.len() - n..],
            _ => &self.records,
        }
    }

    /// `Launch→Tap→` style trail used in planner prompts.
    pub fn trail(&self, limit: Option<usize>) -> String {
        self.recent(limit)
            .iter()
            .map(|r| format!("{}→", r.action_label))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub ts: i64,
    pub session_id: String,
    pub step: u32,
    pub task: String,
    #[serde(flatten)]
    pub record: StepRecord,
}

/// JSONL log of every step, one file per session.
pub struct SessionHistory {
    pub session_id: String,
    dir: PathBuf,
    file_path: PathBuf,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::in_dir(data_dir_or_cwd())
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        Self {
            session_id,
            dir,
            file_path,
        }
    }

    /// Same directory, fresh session id and file.
    pub fn restart(&mut self) {
        *self = Self::in_dir(std::mem::take(&mut self.dir));
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Appends one line to the session file.
    pub fn append(&self, step: u32, task: &str, record: &StepRecord) -> PhoneClawResult<()> {
        let entry = SessionEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            session_id: self.session_id.clone(),
            step,
            task: task.to_string(),
            record: record.clone(),
        };
        let line = serde_json::to_string(&entry)?;
        std::fs::create_dir_all(&self.dir)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{line}")?;
        tracing::debug!(path = %self.file_path.display(), step, "session entry flushed");
        Ok(())
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// `<data_local_dir>/phoneclaw/sessions`, or the working directory when the
/// platform has no data dir.
fn data_dir_or_cwd() -> PathBuf {
    match dirs::data_local_dir() {
        Some(base) => base.join("phoneclaw").join("sessions"),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: &str) -> StepRecord {
        StepRecord {
            action_label: label.into(),
            reason_summary: String::new(),
            success: true,
        }
    }

    #[test]
    fn reason_is_cut_on_char_boundary() {
        let long = "滑".repeat(120);
        let summary = summarize_reason(&long);
        assert_eq!(summary.chars().count(), 103);
        assert!(summary.ends_with("..."));
        assert_eq!(summarize_reason("short"), "short");
        assert_eq!(summarize_reason(&"a".repeat(100)), "a".repeat(100));
    }

    #[test]
    fn trail_keeps_most_recent() {
        let mut history = ActionHistory::default();
        for label in ["Launch", "Tap", "Type", "Tap", "Swipe", "Back"] {
            history.push(record(label));
        }
        assert_eq!(history.trail(Some(5)), "Tap→Type→Tap→Swipe→Back→");
        assert_eq!(history.recent(None).len(), 6);
        assert_eq!(history.recent(Some(10)).len(), 6);
    }

    #[test]
    fn session_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionHistory::in_dir(dir.path().join("sessions"));
        session.append(1, "open app", &record("Launch")).unwrap();
        session.append(2, "open app", &record("finish")).unwrap();

        let text = std::fs::read_to_string(session.file_path()).unwrap();
        let lines: Vec<SessionEntry> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].step, 2);
        assert_eq!(lines[1].record.action_label, "finish");
        assert_eq!(lines[0].session_id, session.session_id);
    }

    #[test]
    fn restart_changes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SessionHistory::in_dir(dir.path());
        let before = session.file_path().to_path_buf();
        session.restart();
        assert_ne!(before, session.file_path());
        assert_eq!(session.file_path().parent(), Some(dir.path()));
    }
}
