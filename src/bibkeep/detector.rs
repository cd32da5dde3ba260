//! # Change Detector
//!
//! Polls a [`TextSource`] (normally the system clipboard) at a fixed interval
//! and pushes a [`Detection`] whenever the value differs from the last one this
//! detector saw. The first value after a (re)start is always reported.
//!
//! ```text
//!   tick ──► read_text (blocking pool) ──► ChangeDetector::observe ──► classify ──► mpsc
//!               ▲                                   │
//!               └────────── unchanged: wait ◄───────┘
//! ```
//!
//! [`DetectorHandle`] controls the task through a `watch` channel. Pausing keeps
//! the baseline, so resuming with an unchanged source emits nothing. Restarting
//! after [`DetectorHandle::stop`] begins with no baseline. The closure style
//! arrives on its own `watch` channel and is read at every detection.

use crate::error::Result;
use crate::extract::{find_first_record, render_record};
use crate::model::ClosureStyle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

const EVENT_BUFFER: usize = 32;

/// Something whose current text can be sampled. Reads may block.
pub trait TextSource: Send + Sync + 'static {
    /// `Ok(None)` when the source currently holds no text.
    fn read_text(&self) -> Result<Option<String>>;
}

/// Dedupe core: remembers the last value and only lets changes through.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_seen: Option<String>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, value: String) -> Option<String> {
        if self.last_seen.as_deref() == Some(value.as_str()) {
            return None;
        }
        self.last_seen = Some(value.clone());
        Some(value)
    }

    pub fn last_seen(&self) -> Option<&str> {
        self.last_seen.as_deref()
    }

    pub fn reset(&mut self) {
        self.last_seen = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// A valid entry, already normalized.
    Record { keyword: String, text: String },
    Invalid,
    Empty,
}

pub fn classify(value: &str, style: ClosureStyle) -> Detection {
    if value.trim().is_empty() {
        return Detection::Empty;
    }
    match find_first_record(value) {
        Some(record) => Detection::Record {
            keyword: record.keyword.clone(),
            text: render_record(&record, style),
        },
        None => Detection::Invalid,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Running,
    Paused,
    Stopped,
}

pub struct DetectorHandle {
    source: Arc<dyn TextSource>,
    poll: Duration,
    style: watch::Receiver<ClosureStyle>,
    events: mpsc::Sender<Detection>,
    state: watch::Sender<DetectorState>,
    task: Option<JoinHandle<()>>,
}

impl DetectorHandle {
    /// Starts polling `source` every `poll`. Detections arrive on the returned
    /// receiver, normalized in whatever style `style` holds at the time.
    pub fn spawn(
        source: Arc<dyn TextSource>,
        poll: Duration,
        style: watch::Receiver<ClosureStyle>,
    ) -> (Self, mpsc::Receiver<Detection>) {
        let (events, rx) = mpsc::channel(EVENT_BUFFER);
        let (state, _) = watch::channel(DetectorState::Stopped);
        let mut handle = Self {
            source,
            poll,
            style,
            events,
            state,
            task: None,
        };
        handle.start();
        (handle, rx)
    }

    pub fn state(&self) -> DetectorState {
        *self.state.borrow()
    }

    pub fn pause(&self) {
        self.set_state(DetectorState::Paused);
    }

    pub fn resume(&self) {
        self.set_state(DetectorState::Running);
    }

    /// Stops the polling task and waits for it to finish.
    pub async fn stop(&mut self) {
        self.set_state(DetectorState::Stopped);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "change detector task ended abnormally");
            }
        }
    }

    /// Starts a stopped detector again with a fresh baseline. No-op while the
    /// task is alive.
    pub fn restart(&mut self) {
        if self.task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        self.start();
    }

    fn start(&mut self) {
        self.state.send_replace(DetectorState::Running);
        let state_rx = self.state.subscribe();
        self.task = Some(tokio::spawn(poll_loop(
            Arc::clone(&self.source),
            self.poll,
            self.style.clone(),
            state_rx,
            self.events.clone(),
        )));
    }

    fn set_state(&self, next: DetectorState) {
        self.state.send_if_modified(|current| {
            if *current == DetectorState::Stopped || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

async fn poll_loop(
    source: Arc<dyn TextSource>,
    poll: Duration,
    style: watch::Receiver<ClosureStyle>,
    mut state: watch::Receiver<DetectorState>,
    events: mpsc::Sender<Detection>,
) {
    let mut detector = ChangeDetector::new();
    let mut ticker = interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(?poll, "change detector started");

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {}
        }

        match *state.borrow_and_update() {
            DetectorState::Stopped => break,
            DetectorState::Paused => continue,
            DetectorState::Running => {}
        }

        let reader = Arc::clone(&source);
        let value = match tokio::task::spawn_blocking(move || reader.read_text()).await {
            Ok(Ok(value)) => value.unwrap_or_default(),
            Ok(Err(e)) => {
                warn!(error = %e, "failed to read change detector source");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "change detector read task failed");
                continue;
            }
        };

        // A pause or stop that arrived during the read wins over its result.
        if *state.borrow() != DetectorState::Running {
            continue;
        }

        if let Some(changed) = detector.observe(value) {
            let current = *style.borrow();
            let detection = classify(&changed, current);
            debug!(?detection, "source changed");
            if events.send(detection).await.is_err() {
                break;
            }
        }
    }
    debug!("change detector stopped");
}
