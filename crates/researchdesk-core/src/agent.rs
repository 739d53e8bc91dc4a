//! Boundaries to the external research agent and memory subsystem, plus
//! offline implementations of both.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentInvocationError, ResearchDeskError};
use crate::progress::{ProgressStage, StageReporter};
use crate::result::{Finding, Hypothesis, ResearchResult};
use crate::session::{ResearchSession, SessionConfig};

/// Initial state handed to the agent: the question, the flags and empty
/// accumulators for everything the agent fills in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub question: String,
    pub config: SessionConfig,
    pub research_plan: Vec<String>,
    pub findings: Vec<Finding>,
    pub hypotheses: Vec<Hypothesis>,
    pub multi_agent_analysis: Map<String, Value>,
    pub quality_assessment: Map<String, Value>,
}

impl AgentRequest {
    pub fn new(question: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            question: question.into(),
            config,
            research_plan: Vec::new(),
            findings: Vec::new(),
            hypotheses: Vec::new(),
            multi_agent_analysis: Map::new(),
            quality_assessment: Map::new(),
        }
    }

    pub fn for_session(session: &ResearchSession) -> Self {
        Self::new(session.question().text(), *session.config())
    }
}

/// A synchronous, blocking research engine. One call per session.
pub trait ResearchAgent: Send + Sync {
    fn name(&self) -> &str;

    fn invoke(
        &self,
        request: &AgentRequest,
        reporter: &StageReporter,
    ) -> Result<ResearchResult, AgentInvocationError>;

    /// Agents that call `StageReporter::on_stage_change` themselves disable
    /// the timer-driven progress fallback.
    fn reports_progress(&self) -> bool {
        false
    }
}

pub type DynResearchAgent = Arc<dyn ResearchAgent>;

/// Returns a fixed result for every request. Used for tests, demos and
/// re-rendering saved runs.
#[derive(Debug, Clone)]
pub struct ReplayAgent {
    result: ResearchResult,
    report_stages: bool,
    stage_delay: Option<Duration>,
}

impl ReplayAgent {
    pub fn new(result: ResearchResult) -> Self {
        Self {
            result,
            report_stages: false,
            stage_delay: None,
        }
    }

    /// Load a bare result or a full JSON export (`{metadata, result}`).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ResearchDeskError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|err| ResearchDeskError::config_io(path.to_path_buf(), err))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse research result {}", path.display()))?;

        let payload = match value {
            Value::Object(mut map) if map.contains_key("metadata") && map.contains_key("result") => {
                map.remove("result").unwrap_or(Value::Null)
            }
            other => other,
        };
        let result: ResearchResult = serde_json::from_value(payload)
            .with_context(|| format!("invalid research result in {}", path.display()))?;
        Ok(Self::new(result))
    }

    /// Report Planning → Researching → Analyzing → Synthesizing through the
    /// stage reporter while replaying.
    pub fn reporting_stages(mut self) -> Self {
        self.report_stages = true;
        self
    }

    /// Block for `delay` before each stage, simulating a slow agent.
    pub fn with_stage_delay(mut self, delay: Duration) -> Self {
        self.stage_delay = Some(delay);
        self
    }

    pub fn result(&self) -> &ResearchResult {
        &self.result
    }
}

impl ResearchAgent for ReplayAgent {
    fn name(&self) -> &str {
        "replay"
    }

    fn invoke(
        &self,
        request: &AgentRequest,
        reporter: &StageReporter,
    ) -> Result<ResearchResult, AgentInvocationError> {
        tracing::debug!(question = %request.question, "replaying stored research result");
        for stage in [
            ProgressStage::Planning,
            ProgressStage::Researching,
            ProgressStage::Analyzing,
            ProgressStage::Synthesizing,
        ] {
            if let Some(delay) = self.stage_delay {
                std::thread::sleep(delay);
            }
            if self.report_stages {
                reporter.on_stage_change(stage);
            }
        }
        Ok(self.result.clone())
    }

    fn reports_progress(&self) -> bool {
        self.report_stages
    }
}

/// Always fails with the configured reason.
#[derive(Debug, Clone)]
pub struct FailingAgent {
    reason: String,
}

impl FailingAgent {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ResearchAgent for FailingAgent {
    fn name(&self) -> &str {
        "failing"
    }

    fn invoke(
        &self,
        _request: &AgentRequest,
        _reporter: &StageReporter,
    ) -> Result<ResearchResult, AgentInvocationError> {
        Err(AgentInvocationError::new(self.reason.clone()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStatistics {
    pub short_term_count: u64,
    pub long_term_count: u64,
    pub episodic_count: u64,
    pub knowledge_graph_nodes: u64,
    pub knowledge_graph_edges: u64,
    pub concepts_tracked: u64,
    pub citations_tracked: u64,
}

impl MemoryStatistics {
    pub fn render_markdown(&self) -> String {
        let mut output = String::from("## Memory System Statistics\n\n");
        let _ = writeln!(output, "- **Short-term Memory:** {} items", self.short_term_count);
        let _ = writeln!(output, "- **Long-term Memory:** {} items", self.long_term_count);
        let _ = writeln!(output, "- **Episodic Memory:** {} episodes", self.episodic_count);
        let _ = writeln!(output, "- **Knowledge Graph Nodes:** {}", self.knowledge_graph_nodes);
        let _ = writeln!(output, "- **Knowledge Graph Edges:** {}", self.knowledge_graph_edges);
        let _ = writeln!(output, "- **Concepts Tracked:** {}", self.concepts_tracked);
        let _ = writeln!(output, "- **Citations Tracked:** {}", self.citations_tracked);
        output
    }
}

#[async_trait]
pub trait MemoryStatsProvider: Send + Sync {
    async fn memory_statistics(&self) -> anyhow::Result<MemoryStatistics>;
}

pub type DynMemoryStatsProvider = Arc<dyn MemoryStatsProvider>;

/// Fixed statistics for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticMemoryStats {
    stats: MemoryStatistics,
}

impl StaticMemoryStats {
    pub fn new(stats: MemoryStatistics) -> Self {
        Self { stats }
    }
}

#[async_trait]
impl MemoryStatsProvider for StaticMemoryStats {
    async fn memory_statistics(&self) -> anyhow::Result<MemoryStatistics> {
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ProgressSource, ProgressTracker};
    use std::io::Write;

    fn sample() -> ResearchResult {
        ResearchResult {
            final_answer: "answer".into(),
            findings: vec![Finding::new(0, "Define terms")],
            ..ResearchResult::default()
        }
    }

    #[test]
    fn request_starts_with_empty_accumulators() {
        let request = AgentRequest::new("What is entanglement?", SessionConfig::default());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["question"], "What is entanglement?");
        assert_eq!(value["research_plan"], serde_json::json!([]));
        assert_eq!(value["findings"], serde_json::json!([]));
        assert_eq!(value["multi_agent_analysis"], serde_json::json!({}));
        assert_eq!(value["quality_assessment"], serde_json::json!({}));
    }

    #[test]
    fn replay_agent_reports_stages_when_enabled() {
        let tracker = ProgressTracker::new();
        let agent = ReplayAgent::new(sample()).reporting_stages();
        assert!(agent.reports_progress());

        let request = AgentRequest::new("q", SessionConfig::default());
        let result = agent.invoke(&request, &tracker.reporter()).unwrap();
        assert_eq!(result, sample());
        assert_eq!(tracker.stage(), ProgressStage::Synthesizing);
        assert_eq!(tracker.snapshot().source, ProgressSource::Reported);
    }

    #[test]
    fn silent_replay_leaves_tracker_alone() {
        let tracker = ProgressTracker::new();
        let agent = ReplayAgent::new(sample());
        assert!(!agent.reports_progress());
        agent
            .invoke(&AgentRequest::new("q", SessionConfig::default()), &tracker.reporter())
            .unwrap();
        assert_eq!(tracker.stage(), ProgressStage::Idle);
    }

    #[test]
    fn replay_agent_loads_exports_and_bare_results() {
        let dir = tempfile::tempdir().unwrap();

        let bare = dir.path().join("bare.json");
        std::fs::write(&bare, serde_json::to_string(&sample()).unwrap()).unwrap();
        assert_eq!(ReplayAgent::from_json_file(&bare).unwrap().result(), &sample());

        let export = dir.path().join("export.json");
        let mut file = std::fs::File::create(&export).unwrap();
        write!(
            file,
            r#"{{"metadata": {{"question": "q", "timestamp": "2024-01-01T00:00:00Z"}}, "result": {}}}"#,
            serde_json::to_string(&sample()).unwrap()
        )
        .unwrap();
        assert_eq!(ReplayAgent::from_json_file(&export).unwrap().result(), &sample());

        let missing = ReplayAgent::from_json_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ResearchDeskError::ConfigIo { .. })));
    }

    #[test]
    fn failing_agent_surfaces_reason() {
        let err = FailingAgent::new("model unavailable")
            .invoke(
                &AgentRequest::new("q", SessionConfig::default()),
                &StageReporter::detached(),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "research agent failed: model unavailable");
    }

    #[tokio::test]
    async fn static_memory_stats_render() {
        let provider = StaticMemoryStats::new(MemoryStatistics {
            short_term_count: 3,
            episodic_count: 1,
            ..MemoryStatistics::default()
        });
        let stats = provider.memory_statistics().await.unwrap();
        let markdown = stats.render_markdown();
        assert!(markdown.contains("- **Short-term Memory:** 3 items"));
        assert!(markdown.contains("- **Episodic Memory:** 1 episodes"));
        assert!(markdown.contains("- **Citations Tracked:** 0"));
    }
}
