//! Shared sensor state.
//!
//! [`SensorStore`] is the single source of truth for the current reading,
//! its classification, the history window, the active session and the
//! notification preference. Every field lives behind one
//! [`tokio::sync::RwLock`]; the reader task, foreground commands and
//! shutdown all go through it, so none of their mutations interleave.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

use airbox_types::{AqiLevel, Classification, Sample, classify};

use crate::history::HistoryWindow;
use crate::traits::PortHandle;

/// Message reported before anything else has been said.
pub const INITIAL_MESSAGE: &str = "正在初始化空氣盒子...";

/// The live session record.
///
/// Owned by [`SensorState`]; the reader task only keeps a clone of
/// `cancel`, which can signal stop but never keeps the handle alive.
pub(crate) struct ActiveSession {
    pub(crate) id: u64,
    pub(crate) port: String,
    pub(crate) handle: Box<dyn PortHandle>,
    pub(crate) cancel: CancellationToken,
}

impl ActiveSession {
    /// Signal the reader and close the handle.
    pub(crate) fn teardown(self) -> (String, std::io::Result<()>) {
        self.cancel.cancel();
        let result = self.handle.close();
        (self.port, result)
    }
}

/// The shared aggregate. Only reachable through [`SensorStore`].
pub struct SensorState {
    current: f64,
    classification: Classification,
    history: HistoryWindow,
    session: Option<ActiveSession>,
    sound_enabled: bool,
    last_level: Option<AqiLevel>,
    last_message: Option<String>,
    shutting_down: bool,
}

impl SensorState {
    fn new(retention: Duration, sound_enabled: bool) -> Self {
        Self {
            current: 0.0,
            classification: classify(0.0),
            history: HistoryWindow::new(retention),
            session: None,
            sound_enabled,
            last_level: None,
            last_message: None,
            shutting_down: false,
        }
    }

    fn apply(&mut self, sample: Sample) -> SampleRecord {
        self.current = sample.value;
        self.history.append(sample);

        let classification = classify(sample.value);
        let level_changed = self.last_level != Some(classification.level);
        if level_changed {
            self.last_level = Some(classification.level);
            self.last_message = Some(classification.advisory.clone());
        }
        self.classification = classification.clone();

        SampleRecord {
            value: sample.value,
            classification,
            level_changed,
            sound_enabled: self.sound_enabled,
        }
    }

    pub(crate) fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.id)
    }

    pub(crate) fn take_session(&mut self) -> Option<ActiveSession> {
        self.session.take()
    }

    pub(crate) fn install_session(&mut self, session: ActiveSession) {
        debug_assert!(self.session.is_none());
        self.session = Some(session);
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub(crate) fn begin_shutdown(&mut self) {
        self.shutting_down = true;
    }
}

/// Outcome of recording one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    /// The recorded value.
    pub value: f64,
    /// Classification of the value.
    pub classification: Classification,
    /// Whether the level differs from the previously notified level.
    pub level_changed: bool,
    /// The sound preference at the moment of recording.
    pub sound_enabled: bool,
}

/// Independent copy of the shared state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    /// Latest PM2.5 value (0 before the first sample).
    pub value: f64,
    /// Classification of `value`.
    pub classification: Classification,
    /// Retained samples, oldest first.
    pub history: Vec<Sample>,
    /// Name of the connected port, if any.
    pub port: Option<String>,
    /// Whether sound cues are enabled.
    pub sound_enabled: bool,
    /// Latest status text.
    pub message: String,
}

/// Handle to the shared sensor state.
///
/// Cloning is cheap; all clones refer to the same state.
#[derive(Clone)]
pub struct SensorStore {
    inner: Arc<RwLock<SensorState>>,
}

impl std::fmt::Debug for SensorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorStore").finish_non_exhaustive()
    }
}

impl SensorStore {
    /// Create a store with an empty history window.
    pub fn new(retention: Duration, sound_enabled: bool) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SensorState::new(retention, sound_enabled))),
        }
    }

    /// Record a sample and report whether its level differs from the last
    /// notified level.
    ///
    /// The first sample always counts as a change.
    pub async fn record_sample(&self, value: f64) -> bool {
        self.record(value).await.level_changed
    }

    /// Record a sample and return everything a notification needs.
    ///
    /// This is the only path that mutates history and classification.
    pub async fn record(&self, value: f64) -> SampleRecord {
        let mut state = self.inner.write().await;
        state.apply(Sample::now(value))
    }

    /// Record a sample on behalf of a session reader.
    ///
    /// Returns `None` without touching the state if `cancel` was signalled.
    /// Cancellation only happens under the write lock, so the check and the
    /// mutation are atomic with respect to teardown.
    pub(crate) async fn record_for(
        &self,
        cancel: &CancellationToken,
        value: f64,
    ) -> Option<SampleRecord> {
        let mut state = self.inner.write().await;
        if cancel.is_cancelled() {
            return None;
        }
        Some(state.apply(Sample::now(value)))
    }

    /// Copy of the full state.
    pub async fn snapshot(&self) -> StateSnapshot {
        let state = self.inner.read().await;
        StateSnapshot {
            value: state.current,
            classification: state.classification.clone(),
            history: state.history.snapshot(),
            port: state.session.as_ref().map(|s| s.port.clone()),
            sound_enabled: state.sound_enabled,
            message: state
                .last_message
                .clone()
                .unwrap_or_else(|| INITIAL_MESSAGE.to_string()),
        }
    }

    /// Copy of the history window.
    pub async fn history(&self) -> Vec<Sample> {
        self.inner.read().await.history.snapshot()
    }

    /// Enable or disable sound cues.
    pub async fn set_sound_enabled(&self, enabled: bool) {
        self.inner.write().await.sound_enabled = enabled;
    }

    /// Current sound preference.
    pub async fn sound_enabled(&self) -> bool {
        self.inner.read().await.sound_enabled
    }

    /// Replace the status text.
    pub async fn set_message(&self, message: impl Into<String>) {
        self.inner.write().await.last_message = Some(message.into());
    }

    /// Name of the connected port, if any.
    pub async fn active_port(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.port.clone())
    }

    /// Exclusive access for session install and teardown.
    pub(crate) async fn lock(&self) -> RwLockWriteGuard<'_, SensorState> {
        self.inner.write().await
    }
}
