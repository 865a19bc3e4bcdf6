use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio::{sync::Mutex, task::JoinHandle, time};
use uuid::Uuid;

use crate::ui::SharedUi;

use super::state::{ActionTag, Event, RecorderState};

/// Everything the exporter needs from a finished session.
#[derive(Debug, Clone)]
pub struct SessionDump {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub events: Vec<Event>,
}

#[derive(Clone)]
pub struct RecorderController {
    state: Arc<Mutex<RecorderState>>,
    ui: SharedUi,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
}

impl RecorderController {
    pub fn new(ui: SharedUi) -> Self {
        Self {
            state: Arc::new(Mutex::new(RecorderState::new())),
            ui,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_secs(1),
        }
    }

    pub async fn is_recording(&self) -> bool {
        self.state.lock().await.is_recording()
    }

    pub async fn elapsed_ms(&self) -> u64 {
        self.state.lock().await.elapsed_ms()
    }

    /// Starts a session and logs the start marker with the current score.
    /// A no-op (returns `false`) when a session is already active.
    pub async fn start(&self, current_score: i64) -> bool {
        {
            let mut state = self.state.lock().await;
            if state.is_recording() {
                debug!("start ignored: session already active");
                return false;
            }

            let session_id = Uuid::new_v4().to_string();
            info!("starting recording session {session_id}");
            state.begin_session(session_id, Utc::now(), Instant::now(), current_score);
        }

        self.spawn_ticker().await;
        self.ui.recording_changed(true);
        true
    }

    /// Logs one score mutation while a session is active; silently ignored
    /// otherwise.
    pub async fn record_mutation(&self, action: ActionTag, score: i64) {
        let mut state = self.state.lock().await;
        if let Some(offset_ms) = state.append(action, score) {
            debug!(
                "logged {} score={score} offset={offset_ms}ms",
                action.as_str()
            );
        }
    }

    /// Ends the active session: appends the end marker, stops the ticker and
    /// returns the full event sequence for export. The in-memory sequence is
    /// cleared here, before the export outcome is known. `None` when idle.
    pub async fn end(&self) -> Option<SessionDump> {
        let dump = {
            let mut state = self.state.lock().await;
            if !state.is_recording() {
                debug!("end ignored: no active session");
                return None;
            }

            if !state.events.is_empty() {
                let score = state.events.last().map(|e| e.score).unwrap_or(0);
                state.append(ActionTag::EndRecord, score);
            }

            let finished = std::mem::take(&mut *state);
            SessionDump {
                session_id: finished.session_id.unwrap_or_default(),
                started_at: finished.started_at.unwrap_or_else(Utc::now),
                events: finished.events,
            }
        };

        self.cancel_ticker().await;
        self.ui.recording_changed(false);
        info!(
            "ended recording session {} with {} events",
            dump.session_id,
            dump.events.len()
        );
        Some(dump)
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let ui = self.ui.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            loop {
                interval.tick().await;

                let elapsed_ms = {
                    let guard = state.lock().await;
                    if !guard.is_recording() {
                        break;
                    }
                    guard.elapsed_ms()
                };

                ui.timer_tick(elapsed_ms / 1000);
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }
}
