use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RecorderStatus {
    Idle,
    Recording,
}

impl Default for RecorderStatus {
    fn default() -> Self {
        RecorderStatus::Idle
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionTag {
    StartRecord,
    Increase,
    Decrease,
    Reset,
    EndRecord,
}

impl ActionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTag::StartRecord => "START_RECORD",
            ActionTag::Increase => "INCREASE",
            ActionTag::Decrease => "DECREASE",
            ActionTag::Reset => "RESET",
            ActionTag::EndRecord => "END_RECORD",
        }
    }
}

/// One logged occurrence: a score change or a session boundary, at a
/// monotonic offset from session start. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub offset_ms: u64,
    pub score: i64,
    pub action: ActionTag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderState {
    pub status: RecorderStatus,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// Monotonic anchor for event offsets; wall clock only names the session.
    #[serde(skip)]
    pub running_anchor: Option<Instant>,
    #[serde(skip)]
    pub events: Vec<Event>,
}

impl Default for RecorderState {
    fn default() -> Self {
        Self {
            status: RecorderStatus::Idle,
            session_id: None,
            started_at: None,
            running_anchor: None,
            events: Vec::new(),
        }
    }
}

impl RecorderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.status == RecorderStatus::Recording
    }

    pub fn elapsed_ms(&self) -> u64 {
        match self.running_anchor {
            Some(anchor) if self.is_recording() => anchor.elapsed().as_millis() as u64,
            _ => 0,
        }
    }

    pub fn begin_session(
        &mut self,
        session_id: String,
        started_at: DateTime<Utc>,
        now: Instant,
        score: i64,
    ) {
        *self = Self {
            status: RecorderStatus::Recording,
            session_id: Some(session_id),
            started_at: Some(started_at),
            running_anchor: Some(now),
            events: vec![Event {
                offset_ms: 0,
                score,
                action: ActionTag::StartRecord,
            }],
        };
    }

    /// Appends an event at the current offset. No-op while idle.
    pub fn append(&mut self, action: ActionTag, score: i64) -> Option<u64> {
        if !self.is_recording() {
            return None;
        }
        let offset_ms = self.elapsed_ms();
        self.events.push(Event {
            offset_ms,
            score,
            action,
        });
        Some(offset_ms)
    }
}
