//! Request stages and the progress-callback trait.
//!
//! Every analysis request walks the same linear state machine:
//!
//! ```text
//! Idle → FileSelected → Loaded → Generated → Parsed → Done
//!   └──────────┴───────────┴──────────┴─────────┴──→ Failed(reason)
//! ```
//!
//! No state is resumable: a failed request is retried by submitting it
//! again from `Idle`. Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to observe the
//! transitions, e.g. to drive a spinner.
//!
//! # Example
//!
//! ```rust
//! use nutrivisual::{AnalysisConfig, AnalysisProgressCallback, AnalysisStage};
//! use std::sync::Arc;
//!
//! struct PrintStages;
//!
//! impl AnalysisProgressCallback for PrintStages {
//!     fn on_stage(&self, stage: &AnalysisStage) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(PrintStages) as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Where a single analysis request currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AnalysisStage {
    Idle,
    /// The file name was accepted and its kind recognised.
    FileSelected,
    /// The document was decoded into page images.
    Loaded,
    /// The text generator returned a description.
    Generated,
    /// The description was parsed into a composition map.
    Parsed,
    Done,
    /// Terminal failure with a human-readable reason.
    Failed(String),
}

impl AnalysisStage {
    /// `true` for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStage::Done | AnalysisStage::Failed(_))
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(&self, next: &AnalysisStage) -> bool {
        use AnalysisStage::*;
        match (self, next) {
            (Done, _) | (Failed(_), _) => false,
            (_, Failed(_)) => true,
            (Idle, FileSelected)
            | (FileSelected, Loaded)
            | (Loaded, Generated)
            | (Generated, Parsed)
            | (Parsed, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisStage::Idle => f.write_str("idle"),
            AnalysisStage::FileSelected => f.write_str("file selected"),
            AnalysisStage::Loaded => f.write_str("document loaded"),
            AnalysisStage::Generated => f.write_str("analysis received"),
            AnalysisStage::Parsed => f.write_str("composition parsed"),
            AnalysisStage::Done => f.write_str("done"),
            AnalysisStage::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Called by the orchestrator on every stage transition.
///
/// Implementations must be `Send + Sync` because the callback lives in the
/// shared [`crate::config::AnalysisConfig`]. All methods default to no-ops.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called after each transition, including the initial `FileSelected`
    /// and the terminal `Done` / `Failed`.
    fn on_stage(&self, stage: &AnalysisStage) {
        let _ = stage;
    }

    /// Called before each VLM attempt.
    ///
    /// # Arguments
    /// * `attempt`      — 1-based attempt number
    /// * `max_attempts` — `max_retries + 1`
    fn on_generation_attempt(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;

/// Tracks the current stage of one request and forwards transitions.
pub(crate) struct StageTracker<'a> {
    stage: AnalysisStage,
    callback: Option<&'a ProgressCallback>,
}

impl<'a> StageTracker<'a> {
    pub(crate) fn new(callback: Option<&'a ProgressCallback>) -> Self {
        Self {
            stage: AnalysisStage::Idle,
            callback,
        }
    }

    pub(crate) fn stage(&self) -> &AnalysisStage {
        &self.stage
    }

    pub(crate) fn advance(&mut self, next: AnalysisStage) {
        debug_assert!(
            self.stage.can_advance_to(&next),
            "illegal stage transition {:?} → {:?}",
            self.stage,
            next
        );
        tracing::debug!("Stage: {} → {}", self.stage, next);
        self.stage = next;
        if let Some(cb) = self.callback {
            cb.on_stage(&self.stage);
        }
    }
}
