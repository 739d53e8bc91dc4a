//! Coarse progress staging for a research session.
//!
//! The agent call is one opaque blocking operation. Unless the agent reports
//! stages itself through a [`StageReporter`], every intermediate stage is
//! produced by a timer and carries [`ProgressSource::Synthetic`]: it keeps the
//! UI moving and says nothing about what the agent is actually doing.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Idle,
    Planning,
    Researching,
    Analyzing,
    Synthesizing,
    Completed,
    Failed,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Idle => "idle",
            ProgressStage::Planning => "planning",
            ProgressStage::Researching => "researching",
            ProgressStage::Analyzing => "analyzing",
            ProgressStage::Synthesizing => "synthesizing",
            ProgressStage::Completed => "completed",
            ProgressStage::Failed => "failed",
        }
    }

    /// Nominal overall completion shown for this stage.
    pub fn fraction(&self) -> f32 {
        match self {
            ProgressStage::Idle => 0.0,
            ProgressStage::Planning => 0.1,
            ProgressStage::Researching => 0.3,
            ProgressStage::Analyzing => 0.7,
            ProgressStage::Synthesizing => 0.9,
            ProgressStage::Completed => 1.0,
            ProgressStage::Failed => 0.0,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ProgressStage::Idle => "Waiting for a research question",
            ProgressStage::Planning => "Creating research plan...",
            ProgressStage::Researching => "Executing research steps...",
            ProgressStage::Analyzing => "Running intelligence analysis...",
            ProgressStage::Synthesizing => "Synthesizing final answer...",
            ProgressStage::Completed => "Research completed successfully",
            ProgressStage::Failed => "Research failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressStage::Completed | ProgressStage::Failed)
    }

    /// Stages the agent may report while it is running.
    pub fn is_working(&self) -> bool {
        matches!(
            self,
            ProgressStage::Planning
                | ProgressStage::Researching
                | ProgressStage::Analyzing
                | ProgressStage::Synthesizing
        )
    }

    fn rank(&self) -> u8 {
        match self {
            ProgressStage::Idle => 0,
            ProgressStage::Planning => 1,
            ProgressStage::Researching => 2,
            ProgressStage::Analyzing => 3,
            ProgressStage::Synthesizing => 4,
            ProgressStage::Completed | ProgressStage::Failed => 5,
        }
    }

    /// Next stage of the timer-driven fallback sequence.
    fn next_synthetic(&self) -> Option<ProgressStage> {
        match self {
            ProgressStage::Idle => Some(ProgressStage::Planning),
            ProgressStage::Planning => Some(ProgressStage::Researching),
            ProgressStage::Researching => Some(ProgressStage::Analyzing),
            ProgressStage::Analyzing => Some(ProgressStage::Synthesizing),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a stage change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressSource {
    /// Timer heuristic; an approximation only.
    Synthetic,
    /// Reported by the agent through its stage callback.
    Reported,
    /// Set by the orchestrator from the actual outcome of the agent call.
    Confirmed,
}

impl ProgressSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressSource::Synthetic => "synthetic",
            ProgressSource::Reported => "reported",
            ProgressSource::Confirmed => "confirmed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub stage: ProgressStage,
    pub fraction: f32,
    pub message: String,
    pub source: ProgressSource,
    pub updated_at: DateTime<Utc>,
}

impl ProgressSnapshot {
    fn idle() -> Self {
        Self::at(ProgressStage::Idle, ProgressSource::Confirmed, None)
    }

    fn at(stage: ProgressStage, source: ProgressSource, message: Option<String>) -> Self {
        Self {
            stage,
            fraction: stage.fraction(),
            message: message.unwrap_or_else(|| stage.default_message().to_string()),
            source,
            updated_at: Utc::now(),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == ProgressSource::Synthetic
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: ProgressStage,
    pub to: ProgressStage,
    pub source: ProgressSource,
    pub message: String,
    pub at: DateTime<Utc>,
}

struct TrackerInner {
    sender: watch::Sender<ProgressSnapshot>,
    log: Mutex<Vec<StageTransition>>,
}

/// Forward-only stage machine shared between the orchestrator, the agent's
/// reporter and any number of observers.
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<TrackerInner>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(ProgressSnapshot::idle());
        Self {
            inner: Arc::new(TrackerInner {
                sender,
                log: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.inner.sender.subscribe()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.sender.borrow().clone()
    }

    pub fn stage(&self) -> ProgressStage {
        self.inner.sender.borrow().stage
    }

    /// Move forward to `stage`. Backward, repeated and post-terminal moves are
    /// ignored and return `false`. Use [`ProgressTracker::fail`] for failures.
    pub fn advance(&self, stage: ProgressStage, source: ProgressSource) -> bool {
        if stage == ProgressStage::Failed {
            return false;
        }
        self.apply(source, None, |current| {
            (!current.is_terminal() && stage.rank() > current.rank()).then_some(stage)
        })
    }

    /// Step the timer fallback to the next working stage, stopping at
    /// `Synthesizing`.
    pub fn advance_synthetic(&self) -> bool {
        self.apply(ProgressSource::Synthetic, None, |current| {
            current.next_synthetic()
        })
    }

    pub fn complete(&self) -> bool {
        self.advance(ProgressStage::Completed, ProgressSource::Confirmed)
    }

    /// Force `Failed` from any non-terminal stage.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        self.apply(ProgressSource::Confirmed, Some(message), |current| {
            (!current.is_terminal()).then_some(ProgressStage::Failed)
        })
    }

    /// Handle the agent may use to report genuine stage changes.
    pub fn reporter(&self) -> StageReporter {
        StageReporter {
            tracker: Some(self.clone()),
        }
    }

    pub fn transitions(&self) -> Vec<StageTransition> {
        self.inner
            .log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn render_markdown(&self) -> String {
        let transitions = self.transitions();
        if transitions.is_empty() {
            return "No progress recorded.".to_string();
        }
        let mut output = String::from("### Progress Log\n");
        for (idx, transition) in transitions.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. {} → {} ({}) {}",
                idx + 1,
                transition.from,
                transition.to,
                transition.source.as_str(),
                transition.message
            );
        }
        output
    }

    fn apply<F>(&self, source: ProgressSource, message: Option<String>, next: F) -> bool
    where
        F: FnOnce(ProgressStage) -> Option<ProgressStage>,
    {
        let log = &self.inner.log;
        let changed = self.inner.sender.send_if_modified(|snapshot| {
            let Some(stage) = next(snapshot.stage) else {
                return false;
            };
            let from = snapshot.stage;
            *snapshot = ProgressSnapshot::at(stage, source, message);
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(StageTransition {
                    from,
                    to: stage,
                    source,
                    message: snapshot.message.clone(),
                    at: snapshot.updated_at,
                });
            true
        });
        if changed {
            debug!(
                stage = %self.stage(),
                source = source.as_str(),
                "progress stage changed"
            );
        }
        changed
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback handle passed to the agent (`on_stage_change`).
///
/// Only working stages are accepted; terminal stages belong to the
/// orchestrator.
#[derive(Clone, Default)]
pub struct StageReporter {
    tracker: Option<ProgressTracker>,
}

impl StageReporter {
    /// A reporter that discards every update.
    pub fn detached() -> Self {
        Self { tracker: None }
    }

    pub fn on_stage_change(&self, stage: ProgressStage) -> bool {
        match &self.tracker {
            Some(tracker) if stage.is_working() => {
                tracker.advance(stage, ProgressSource::Reported)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let tracker = ProgressTracker::new();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.stage, ProgressStage::Idle);
        assert_eq!(snapshot.fraction, 0.0);
        assert!(tracker.transitions().is_empty());
    }

    #[test]
    fn synthetic_sequence_stops_at_synthesizing() {
        let tracker = ProgressTracker::new();
        let mut stages = Vec::new();
        while tracker.advance_synthetic() {
            stages.push(tracker.stage());
        }
        assert_eq!(
            stages,
            vec![
                ProgressStage::Planning,
                ProgressStage::Researching,
                ProgressStage::Analyzing,
                ProgressStage::Synthesizing,
            ]
        );
        assert!(tracker.snapshot().is_synthetic());
        assert!(tracker.complete());
        assert_eq!(tracker.snapshot().fraction, 1.0);
        assert_eq!(tracker.snapshot().source, ProgressSource::Confirmed);
    }

    #[test]
    fn stages_only_move_forward() {
        let tracker = ProgressTracker::new();
        assert!(tracker.advance(ProgressStage::Analyzing, ProgressSource::Reported));
        assert!(!tracker.advance(ProgressStage::Researching, ProgressSource::Reported));
        assert!(!tracker.advance(ProgressStage::Analyzing, ProgressSource::Reported));
        assert_eq!(tracker.stage(), ProgressStage::Analyzing);
    }

    #[test]
    fn failure_is_forced_from_any_working_stage() {
        let tracker = ProgressTracker::new();
        tracker.advance(ProgressStage::Researching, ProgressSource::Synthetic);
        assert!(tracker.fail("connection reset"));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.stage, ProgressStage::Failed);
        assert_eq!(snapshot.message, "connection reset");

        assert!(!tracker.complete());
        assert!(!tracker.fail("again"));
        assert!(!tracker.advance_synthetic());
    }

    #[test]
    fn reporter_ignores_terminal_stages() {
        let tracker = ProgressTracker::new();
        let reporter = tracker.reporter();
        assert!(!reporter.on_stage_change(ProgressStage::Completed));
        assert!(reporter.on_stage_change(ProgressStage::Planning));
        assert_eq!(tracker.snapshot().source, ProgressSource::Reported);
        assert!(!StageReporter::detached().on_stage_change(ProgressStage::Planning));
    }

    #[test]
    fn transitions_are_logged_in_order() {
        let tracker = ProgressTracker::new();
        tracker.advance_synthetic();
        tracker.advance_synthetic();
        tracker.complete();

        let log = tracker.transitions();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].from, ProgressStage::Idle);
        assert_eq!(log[2].to, ProgressStage::Completed);

        let markdown = tracker.render_markdown();
        assert!(markdown.contains("1. idle → planning (synthetic)"));
        assert!(markdown.contains("3. researching → completed (confirmed)"));
    }

    #[tokio::test]
    async fn subscribers_observe_latest_stage() {
        let tracker = ProgressTracker::new();
        let mut receiver = tracker.subscribe();
        tracker.advance(ProgressStage::Planning, ProgressSource::Synthetic);
        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow().stage, ProgressStage::Planning);
    }
}
