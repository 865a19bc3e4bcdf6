use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use log::debug;

use crate::settings::SettingsStore;

/// Requests landing within this window of the previous accepted mutation are
/// dropped, absorbing duplicate hardware key events.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Applied { score: i64 },
    Ignored,
}

/// The integer counter plus its persisted value. The in-memory score is only
/// advanced after the new value has been written to settings, so the
/// displayed score always equals the last-persisted one.
pub struct ScoreStore {
    score: i64,
    settings: Arc<SettingsStore>,
    last_accepted: Option<Instant>,
}

impl ScoreStore {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        let score = settings.score();
        Self {
            score,
            settings,
            last_accepted: None,
        }
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn increase(&mut self) -> Result<Mutation> {
        self.apply(self.score + 1)
    }

    /// No-op while the score is already 0; the counter never goes negative.
    /// A rejected decrease does not arm the debounce window.
    pub fn decrease(&mut self) -> Result<Mutation> {
        if self.score <= 0 {
            debug!("decrease ignored: score already at 0");
            return Ok(Mutation::Ignored);
        }
        self.apply(self.score - 1)
    }

    pub fn reset(&mut self) -> Result<Mutation> {
        self.apply(0)
    }

    fn apply(&mut self, next: i64) -> Result<Mutation> {
        if let Some(last) = self.last_accepted {
            if last.elapsed() < DEBOUNCE_WINDOW {
                debug!("mutation ignored: within debounce window");
                return Ok(Mutation::Ignored);
            }
        }

        self.settings.update_score(next)?;
        self.score = next;
        self.last_accepted = Some(Instant::now());
        Ok(Mutation::Applied { score: next })
    }
}
