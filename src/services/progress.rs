//! Request lifecycle and stage observers
//!
//! A request walks through a fixed sequence of [`PipelineStage`]s. The
//! [`RequestLifecycle`] enforces that order; a [`StageObserver`] is told
//! about every stage so a frontend can render its own progress.

use crate::error::{BgRemovalError, Result};
use instant::Instant;
use std::sync::Mutex;
use std::time::Duration;

/// Stages of a single background-removal request, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Upload or default image bytes are in hand
    Received,
    /// Size limit passed
    Validated,
    /// Bytes decoded into a raster
    Decoded,
    /// Raster bounded to the maximum dimension
    Resized,
    /// External remover returned an image with alpha
    BackgroundRemoved,
    /// Result encoded as PNG for download
    Encoded,
}

impl PipelineStage {
    /// All stages in transition order
    pub const ALL: [PipelineStage; 6] = [
        Self::Received,
        Self::Validated,
        Self::Decoded,
        Self::Resized,
        Self::BackgroundRemoved,
        Self::Encoded,
    ];

    /// Status text shown while this stage runs
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Received => "Loading image...",
            Self::Validated => "Checking file size...",
            Self::Decoded => "Decoding image...",
            Self::Resized => "Resizing image...",
            Self::BackgroundRemoved => "Processing image...",
            Self::Encoded => "Preparing download...",
        }
    }

    /// Progress percentage reported when this stage starts
    #[must_use]
    pub fn progress_percentage(self) -> u8 {
        match self {
            Self::Received => 10,
            Self::Validated => 20,
            Self::Decoded => 30,
            Self::Resized => 40,
            Self::BackgroundRemoved => 80,
            Self::Encoded => 95,
        }
    }

    /// The only legal successor, `None` for the final stage
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Validated),
            Self::Validated => Some(Self::Decoded),
            Self::Decoded => Some(Self::Resized),
            Self::Resized => Some(Self::BackgroundRemoved),
            Self::BackgroundRemoved => Some(Self::Encoded),
            Self::Encoded => None,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Decoded => "decoded",
            Self::Resized => "resized",
            Self::BackgroundRemoved => "background_removed",
            Self::Encoded => "encoded",
        };
        f.write_str(name)
    }
}

/// Where a request currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Stage(PipelineStage),
    /// Terminal; `from` is the last stage reached before the failure
    Failed { from: PipelineStage, reason: String },
}

/// State machine for one request
#[derive(Debug)]
pub struct RequestLifecycle {
    state: PipelineState,
    started: Instant,
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLifecycle {
    /// Start a lifecycle in [`PipelineStage::Received`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PipelineState::Stage(PipelineStage::Received),
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Move to `stage`, which must be the direct successor of the current stage
    ///
    /// # Errors
    /// Returns [`BgRemovalError::Internal`] for skipped, repeated or post-failure transitions
    pub fn advance(&mut self, stage: PipelineStage) -> Result<()> {
        match self.state {
            PipelineState::Stage(current) if current.next() == Some(stage) => {
                self.state = PipelineState::Stage(stage);
                Ok(())
            },
            PipelineState::Stage(current) => Err(BgRemovalError::internal(format!(
                "Illegal pipeline transition {current} -> {stage}"
            ))),
            PipelineState::Failed { from, .. } => Err(BgRemovalError::internal(format!(
                "Pipeline already failed at {from}, cannot move to {stage}"
            ))),
        }
    }

    /// Enter the terminal failed state; a second failure keeps the first reason
    pub fn fail(&mut self, reason: impl Into<String>) {
        if let PipelineState::Stage(from) = self.state {
            self.state = PipelineState::Failed {
                from,
                reason: reason.into(),
            };
        }
    }

    /// Failed, or finished encoding
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            PipelineState::Failed { .. } | PipelineState::Stage(PipelineStage::Encoded)
        )
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Receives stage notifications for one pipeline run
pub trait StageObserver: Send + Sync {
    /// Called when `stage` begins
    fn on_stage_started(&self, stage: PipelineStage);

    /// Called once if the run fails
    fn on_failed(&self, stage: PipelineStage, error: &BgRemovalError) {
        let _ = (stage, error);
    }

    /// Called once after the result is encoded
    fn on_completed(&self, elapsed: Duration) {
        let _ = elapsed;
    }
}

/// Observer that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl StageObserver for NoOpObserver {
    fn on_stage_started(&self, _stage: PipelineStage) {}
}

/// Observer that emits stage progress as tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn on_stage_started(&self, stage: PipelineStage) {
        tracing::debug!(
            stage = %stage,
            progress = stage.progress_percentage(),
            "{}",
            stage.description()
        );
    }

    fn on_failed(&self, stage: PipelineStage, error: &BgRemovalError) {
        tracing::debug!(stage = %stage, kind = error.kind(), "Pipeline stopped");
    }

    fn on_completed(&self, elapsed: Duration) {
        tracing::info!("Completed in {:.2} seconds", elapsed.as_secs_f64());
    }
}

/// One notification captured by [`RecordingObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    Started(PipelineStage),
    Failed { stage: PipelineStage, kind: &'static str },
    Completed,
}

/// Observer that keeps every notification, for assertions
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<StageEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events
    #[must_use]
    pub fn events(&self) -> Vec<StageEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Only the started stages, in order
    #[must_use]
    pub fn started_stages(&self) -> Vec<PipelineStage> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                StageEvent::Started(stage) => Some(stage),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: StageEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl StageObserver for RecordingObserver {
    fn on_stage_started(&self, stage: PipelineStage) {
        self.push(StageEvent::Started(stage));
    }

    fn on_failed(&self, stage: PipelineStage, error: &BgRemovalError) {
        self.push(StageEvent::Failed {
            stage,
            kind: error.kind(),
        });
    }

    fn on_completed(&self, _elapsed: Duration) {
        self.push(StageEvent::Completed);
    }
}
