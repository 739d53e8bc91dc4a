//! Typed research result payload returned by the agent.
//!
//! Every optional part of the payload is an explicit `Option` or defaults to
//! an empty collection, so consumers never fail on missing data. Wire names
//! follow the agent's JSON (`step`, `analysis`, `type`).

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AgentInvocationError;

/// Full agent output for one research session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    #[serde(default)]
    pub final_answer: String,
    #[serde(default)]
    pub research_plan: Vec<String>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub hypotheses: Vec<Hypothesis>,
    #[serde(default)]
    pub multi_agent_analysis: Option<MultiAgentAnalysis>,
    #[serde(default)]
    pub quality_assessment: Option<QualityAssessment>,
}

impl ResearchResult {
    /// Overall quality score, if the agent produced one.
    pub fn quality_score(&self) -> Option<f64> {
        self.quality_assessment
            .as_ref()
            .and_then(QualityAssessment::overall)
    }

    /// Check that finding steps start at 0 and increase without gaps.
    pub fn validate_steps(&self) -> Result<(), AgentInvocationError> {
        for (expected, finding) in self.findings.iter().enumerate() {
            if finding.step_index != expected {
                return Err(AgentInvocationError::malformed(format!(
                    "finding {} has step index {} (expected {})",
                    expected + 1,
                    finding.step_index,
                    expected
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of a single research-plan step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "step", default)]
    pub step_index: usize,
    #[serde(default)]
    pub step_description: String,
    #[serde(rename = "analysis", default)]
    pub analysis_text: String,
    #[serde(default)]
    pub sources_used: SourcesUsed,
    #[serde(default)]
    pub external_research: Vec<String>,
}

impl Finding {
    pub fn new(step_index: usize, step_description: impl Into<String>) -> Self {
        Self {
            step_index,
            step_description: step_description.into(),
            ..Self::default()
        }
    }

    pub fn with_analysis(mut self, analysis: impl Into<String>) -> Self {
        self.analysis_text = analysis.into();
        self
    }

    pub fn with_sources(mut self, memory_basic: u32, memory_advanced: u32, external: u32) -> Self {
        self.sources_used = SourcesUsed {
            memory_basic,
            memory_advanced,
            external_sources: external,
        };
        self
    }

    pub fn with_external_research(mut self, snippet: impl Into<String>) -> Self {
        self.external_research.push(snippet.into());
        self
    }

    pub fn consulted_external_sources(&self) -> bool {
        self.sources_used.external_sources > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesUsed {
    #[serde(default)]
    pub memory_basic: u32,
    #[serde(default)]
    pub memory_advanced: u32,
    #[serde(default)]
    pub external_sources: u32,
}

/// A generated, testable claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    #[serde(default)]
    pub statement: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Raw confidence as reported; read through [`Hypothesis::confidence`].
    #[serde(rename = "confidence", default)]
    pub raw_confidence: f64,
    #[serde(default)]
    pub supporting_evidence: Vec<String>,
    #[serde(default)]
    pub predictions: Vec<String>,
}

impl Hypothesis {
    pub fn new(statement: impl Into<String>, kind: impl Into<String>, confidence: f64) -> Self {
        Self {
            statement: statement.into(),
            kind: kind.into(),
            raw_confidence: confidence,
            ..Self::default()
        }
    }

    /// Confidence clamped to `[0, 1]`. Non-finite values read as 0.
    pub fn confidence(&self) -> f64 {
        clamp_unit(self.raw_confidence)
    }
}

/// Cross-agent confidence and collaboration metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiAgentAnalysis {
    #[serde(default)]
    pub confidence_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub collaboration_summary: Option<CollaborationSummary>,
}

impl MultiAgentAnalysis {
    pub const RESEARCHER: &'static str = "researcher_avg";
    pub const CRITIC: &'static str = "critic_avg";
    pub const SYNTHESIS: &'static str = "synthesis_confidence";

    /// Score for a role, clamped to `[0, 1]`, or 0.0 when absent.
    pub fn score(&self, role: &str) -> f64 {
        self.confidence_scores
            .get(role)
            .copied()
            .map(clamp_unit)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollaborationSummary {
    #[serde(default)]
    pub total_agent_responses: u32,
    #[serde(default)]
    pub average_confidence: f64,
    #[serde(default)]
    pub quality_indicators: BTreeMap<String, bool>,
}

/// Aggregate quality scoring of a completed result.
///
/// `None` scores mean "unavailable" and render as `N/A`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    #[serde(default, deserialize_with = "deserialize_score")]
    pub overall_quality_score: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_score")]
    pub confidence_assessment: Option<f64>,
    #[serde(default)]
    pub total_findings: u32,
    #[serde(default)]
    pub external_sources_used: u32,
    #[serde(default)]
    pub source_diversity: u32,
    #[serde(default)]
    pub quality_indicators: BTreeMap<String, bool>,
}

impl QualityAssessment {
    /// Overall score clamped to `[0, 10]`.
    pub fn overall(&self) -> Option<f64> {
        self.overall_quality_score
            .filter(|score| score.is_finite())
            .map(|score| score.clamp(0.0, 10.0))
    }

    /// Confidence clamped to `[0, 1]`.
    pub fn confidence(&self) -> Option<f64> {
        self.confidence_assessment
            .filter(|value| value.is_finite())
            .map(clamp_unit)
    }
}

/// Accepts a number, `null`, or a sentinel string such as `"unknown"`.
/// Text that parses to NaN or infinity reads as unavailable.
fn deserialize_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawScore {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<RawScore>::deserialize(deserializer)? {
        Some(RawScore::Number(value)) => Some(value),
        Some(RawScore::Text(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite()),
        None => None,
    })
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
