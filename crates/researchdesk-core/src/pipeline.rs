//! Session orchestration: one blocking agent call per question, with progress
//! staging, result validation, history and metrics around it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::agent::{
    AgentRequest, DynMemoryStatsProvider, DynResearchAgent, MemoryStatistics, ResearchAgent,
};
use crate::aggregate::ResultViews;
use crate::config::{Config, PipelineConfig};
use crate::error::{AgentInvocationError, ResearchDeskError};
use crate::history::{HistoryRecord, HistoryStore};
use crate::metrics;
use crate::progress::{ProgressSnapshot, ProgressSource, ProgressStage, ProgressTracker, StageTransition};
use crate::result::ResearchResult;
use crate::session::{ResearchSession, SessionConfig, SessionStatus};

const DEFAULT_STAGE_INTERVAL: Duration = Duration::from_millis(1_500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Time between synthetic progress stages while the agent runs.
    pub stage_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stage_interval: DEFAULT_STAGE_INTERVAL,
        }
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            stage_interval: config.stage_interval(),
        }
    }
}

pub struct ResearchPipelineBuilder {
    agent: DynResearchAgent,
    history: Option<Arc<HistoryStore>>,
    memory: Option<DynMemoryStatsProvider>,
    settings: PipelineSettings,
}

impl ResearchPipelineBuilder {
    pub fn with_history(mut self, history: Arc<HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_memory_stats(mut self, provider: DynMemoryStatsProvider) -> Self {
        self.memory = Some(provider);
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_config(self, config: &Config) -> Self {
        self.with_settings(PipelineSettings::from(&config.pipeline))
    }

    pub fn with_stage_interval(mut self, interval: Duration) -> Self {
        self.settings.stage_interval = interval;
        self
    }

    /// A zero stage interval falls back to the default pacing.
    pub fn build(mut self) -> ResearchPipeline {
        if self.settings.stage_interval.is_zero() {
            warn!(
                fallback_ms = DEFAULT_STAGE_INTERVAL.as_millis() as u64,
                "stage interval must be non-zero; using default"
            );
            self.settings.stage_interval = DEFAULT_STAGE_INTERVAL;
        }

        ResearchPipeline {
            agent: self.agent,
            history: self.history.unwrap_or_default(),
            memory: self.memory,
            settings: self.settings,
        }
    }
}

/// Explicit context object owning the agent, the shared history and the
/// memory statistics provider.
pub struct ResearchPipeline {
    agent: DynResearchAgent,
    history: Arc<HistoryStore>,
    memory: Option<DynMemoryStatsProvider>,
    settings: PipelineSettings,
}

impl ResearchPipeline {
    pub fn builder(agent: impl ResearchAgent + 'static) -> ResearchPipelineBuilder {
        Self::builder_with(Arc::new(agent))
    }

    pub fn builder_with(agent: DynResearchAgent) -> ResearchPipelineBuilder {
        ResearchPipelineBuilder {
            agent,
            history: None,
            memory: None,
            settings: PipelineSettings::default(),
        }
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one research session with a private progress tracker.
    pub async fn run(
        &self,
        question: &str,
        config: SessionConfig,
    ) -> Result<SessionOutcome, ResearchDeskError> {
        let tracker = ProgressTracker::new();
        self.run_with_tracker(question, config, &tracker).await
    }

    /// Run one research session, publishing progress to `tracker`.
    ///
    /// Blank questions are rejected before the agent is called. Agent failures
    /// and malformed results end the session as `Failed` inside an `Ok`
    /// outcome.
    #[instrument(
        skip_all,
        fields(agent = %self.agent.name(), session_id = tracing::field::Empty)
    )]
    pub async fn run_with_tracker(
        &self,
        question: &str,
        config: SessionConfig,
        tracker: &ProgressTracker,
    ) -> Result<SessionOutcome, ResearchDeskError> {
        let mut session = ResearchSession::create(question, config)?;
        tracing::Span::current().record("session_id", session.id());

        session.transition(SessionStatus::Running)?;
        info!(
            session_id = %session.id(),
            depth = config.depth.as_str(),
            enable_hypothesis = config.enable_hypothesis,
            enable_multi_agent = config.enable_multi_agent,
            "research session started"
        );

        let started = Instant::now();
        let outcome = self
            .invoke_agent(&session, tracker)
            .await
            .and_then(|result| result.validate_steps().map(|_| result));
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(result) => {
                session.transition(SessionStatus::Completed)?;
                tracker.complete();

                let result = Arc::new(result);
                self.history
                    .append(HistoryRecord::from_session(&session, result.clone()));
                metrics::record_session(SessionStatus::Completed, elapsed_ms, result.findings.len());
                info!(
                    session_id = %session.id(),
                    findings = result.findings.len(),
                    hypotheses = result.hypotheses.len(),
                    quality_score = ?result.quality_score(),
                    elapsed_ms,
                    "research session completed"
                );

                Ok(SessionOutcome::new(session, Some(result), tracker))
            }
            Err(err) => {
                let message = err.to_string();
                warn!(
                    session_id = %session.id(),
                    error = %message,
                    malformed_result = err.malformed_result,
                    elapsed_ms,
                    "research session failed"
                );
                session.fail(message.clone())?;
                tracker.fail(message);
                metrics::record_session(SessionStatus::Failed, elapsed_ms, 0);

                Ok(SessionOutcome::new(session, None, tracker))
            }
        }
    }

    async fn invoke_agent(
        &self,
        session: &ResearchSession,
        tracker: &ProgressTracker,
    ) -> Result<ResearchResult, AgentInvocationError> {
        let agent = self.agent.clone();
        let request = AgentRequest::for_session(session);
        let reporter = tracker.reporter();

        let mut synthetic = !agent.reports_progress();
        if synthetic {
            tracker.advance(ProgressStage::Planning, ProgressSource::Synthetic);
        }

        let mut call = tokio::task::spawn_blocking(move || agent.invoke(&request, &reporter));
        if !synthetic {
            return joined_result(call.await);
        }

        let mut ticker = tokio::time::interval(self.settings.stage_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; Planning already covers it.
        ticker.tick().await;

        loop {
            tokio::select! {
                joined = &mut call => return joined_result(joined),
                _ = ticker.tick(), if synthetic => {
                    synthetic = tracker.advance_synthetic();
                    debug!(stage = %tracker.stage(), "synthetic progress stage");
                }
            }
        }
    }

    /// Provider output, or all zeros when no provider is configured or it fails.
    pub async fn memory_statistics(&self) -> MemoryStatistics {
        let Some(provider) = &self.memory else {
            debug!("no memory statistics provider configured; reporting zeros");
            return MemoryStatistics::default();
        };

        match provider.memory_statistics().await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(error = %err, "memory statistics unavailable; reporting zeros");
                MemoryStatistics::default()
            }
        }
    }
}

fn joined_result(
    joined: Result<Result<ResearchResult, AgentInvocationError>, tokio::task::JoinError>,
) -> Result<ResearchResult, AgentInvocationError> {
    match joined {
        Ok(result) => result,
        Err(err) => Err(AgentInvocationError::new(format!(
            "agent task did not finish: {err}"
        ))),
    }
}

/// Terminal state of one `run` call.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub session: ResearchSession,
    /// Present only for completed sessions.
    pub result: Option<Arc<ResearchResult>>,
    pub progress: ProgressSnapshot,
    pub transitions: Vec<StageTransition>,
}

impl SessionOutcome {
    fn new(
        session: ResearchSession,
        result: Option<Arc<ResearchResult>>,
        tracker: &ProgressTracker,
    ) -> Self {
        Self {
            session,
            result,
            progress: tracker.snapshot(),
            transitions: tracker.transitions(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.session.status() == SessionStatus::Completed
    }

    /// Derived projections; `None` for failed sessions.
    pub fn views(&self) -> Option<ResultViews> {
        self.result.as_deref().map(ResultViews::derive)
    }

    /// User-facing failure line, e.g. `Research failed: ...`.
    pub fn failure_message(&self) -> Option<String> {
        self.session
            .error()
            .map(|error| format!("Research failed: {error}"))
    }
}
