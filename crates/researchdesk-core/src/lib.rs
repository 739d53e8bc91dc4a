//! ResearchDesk core: the research session pipeline that sits between an
//! opaque research agent and presentation surfaces.
//!
//! A [`ResearchPipeline`] runs one blocking agent call per question, stages
//! progress for observers, validates the returned [`ResearchResult`] and keeps
//! an append-only [`HistoryStore`]. The result is turned into independent
//! projections ([`ResultViews`]) and deterministic exports ([`report`]).

mod agent;
mod aggregate;
mod config;
mod error;
mod history;
mod metrics;
mod pipeline;
mod progress;
pub mod report;
mod result;
mod session;
mod telemetry;
mod text;
mod visualize;

pub use agent::{
    AgentRequest, DynMemoryStatsProvider, DynResearchAgent, FailingAgent, MemoryStatistics,
    MemoryStatsProvider, ReplayAgent, ResearchAgent, StaticMemoryStats,
};
pub use aggregate::{
    CollaborationView, HypothesisView, IndicatorView, IntelligenceSummary, ProcessSummary,
    QualitySummary, ResultViews, StepView, extract_key_findings, final_answer_text,
    intelligence_summary, process_summary, quality_summary,
};
pub use config::{
    Config, ConfigLoader, ExportConfig, HistoryConfig, LoggingConfig, PipelineConfig,
};
pub use error::{AgentInvocationError, ExportError, ResearchDeskError};
pub use history::{HistoryRecord, HistoryStore, render_history};
pub use metrics::{init_metrics_from_env, record_session};
pub use pipeline::{PipelineSettings, ResearchPipeline, ResearchPipelineBuilder, SessionOutcome};
pub use progress::{
    ProgressSnapshot, ProgressSource, ProgressStage, ProgressTracker, StageReporter,
    StageTransition,
};
pub use report::{ExportFormat, ReportMetadata, ResearchExport};
pub use result::{
    CollaborationSummary, Finding, Hypothesis, MultiAgentAnalysis, QualityAssessment,
    ResearchResult, SourcesUsed,
};
pub use session::{
    ResearchDepth, ResearchQuestion, ResearchSession, SUGGESTED_QUESTIONS, SessionConfig,
    SessionStatus,
};
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use text::UNAVAILABLE;
pub use visualize::{
    QualityRadar, RadarAxis, RadarDimension, SourceDistribution, TimelinePoint, quality_radar,
    source_distribution, timeline,
};
