//! Read-only projections derived from a [`ResearchResult`].
//!
//! Every function here is total: missing nested data falls back to zero, an
//! empty list or the `N/A` sentinel, never an error.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::result::{MultiAgentAnalysis, ResearchResult, SourcesUsed, clamp_unit};
use crate::text::{indicator_marker, score_out_of_ten, title_case, truncate_chars, two_decimals};
use crate::visualize::{QualityRadar, SourceDistribution, TimelinePoint};

const NO_FINAL_ANSWER: &str = "No final answer generated";
const EVIDENCE_PREVIEW: usize = 3;
const EXTERNAL_PREVIEW: usize = 2;
const EXTERNAL_PREVIEW_CHARS: usize = 100;

static KEY_FINDINGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)KEY_FINDINGS:(.*?)(?:NEW_CONCEPTS:|\z)").expect("invalid key findings regex")
});

/// Text between `KEY_FINDINGS:` and `NEW_CONCEPTS:` (or the end of the
/// analysis when the closing marker is missing), trimmed.
pub fn extract_key_findings(analysis: &str) -> Option<&str> {
    KEY_FINDINGS
        .captures(analysis)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|text| !text.is_empty())
}

pub fn final_answer_text(result: &ResearchResult) -> &str {
    if result.final_answer.trim().is_empty() {
        NO_FINAL_ANSWER
    } else {
        &result.final_answer
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorView {
    pub name: String,
    pub label: String,
    pub satisfied: bool,
}

impl IndicatorView {
    fn from_map(indicators: &BTreeMap<String, bool>) -> Vec<Self> {
        indicators
            .iter()
            .map(|(name, satisfied)| Self {
                name: name.clone(),
                label: title_case(name),
                satisfied: *satisfied,
            })
            .collect()
    }

    pub fn render(&self) -> String {
        format!("{} {}", indicator_marker(self.satisfied), self.label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub step: usize,
    pub description: String,
    pub key_findings: Option<String>,
    pub sources: SourcesUsed,
    pub external_preview: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSummary {
    pub plan: Vec<String>,
    pub findings_count: usize,
    pub external_findings: usize,
    pub steps: Vec<StepView>,
}

pub fn process_summary(result: &ResearchResult) -> ProcessSummary {
    let steps = result
        .findings
        .iter()
        .map(|finding| StepView {
            step: finding.step_index + 1,
            description: finding.step_description.clone(),
            key_findings: extract_key_findings(&finding.analysis_text).map(str::to_string),
            sources: finding.sources_used,
            external_preview: finding
                .external_research
                .iter()
                .take(EXTERNAL_PREVIEW)
                .map(|snippet| truncate_chars(snippet, EXTERNAL_PREVIEW_CHARS))
                .collect(),
        })
        .collect();

    ProcessSummary {
        plan: result.research_plan.clone(),
        findings_count: result.findings.len(),
        external_findings: result
            .findings
            .iter()
            .filter(|finding| finding.consulted_external_sources())
            .count(),
        steps,
    }
}

impl ProcessSummary {
    pub fn render_markdown(&self) -> String {
        let mut output = String::from("## Research Process\n\n### Research Plan:\n");
        for (idx, step) in self.plan.iter().enumerate() {
            let _ = writeln!(output, "{}. {}", idx + 1, step);
        }
        output.push_str("\n### Findings Summary:\n");
        let _ = writeln!(
            output,
            "- Total research steps completed: {}",
            self.findings_count
        );
        let _ = writeln!(
            output,
            "- External sources consulted: {}",
            self.external_findings
        );

        for step in &self.steps {
            let _ = write!(output, "\n#### Step {}: {}\n", step.step, step.description);
            if let Some(key_findings) = &step.key_findings {
                let _ = writeln!(output, "**Key Findings:** {key_findings}");
            }
            let _ = writeln!(
                output,
                "- Sources: memory {}, advanced memory {}, external {}",
                step.sources.memory_basic,
                step.sources.memory_advanced,
                step.sources.external_sources
            );
            for snippet in &step.external_preview {
                let _ = writeln!(output, "- External: {snippet}");
            }
        }
        output
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollaborationView {
    pub total_agent_responses: u32,
    pub average_confidence: f64,
    pub indicators: Vec<IndicatorView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypothesisView {
    pub statement: String,
    pub kind: String,
    pub confidence: f64,
    pub supporting_evidence: Vec<String>,
    pub predictions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntelligenceSummary {
    pub researcher_avg: f64,
    pub critic_avg: f64,
    pub synthesis_confidence: f64,
    pub collaboration: Option<CollaborationView>,
    pub hypotheses: Vec<HypothesisView>,
}

pub fn intelligence_summary(result: &ResearchResult) -> IntelligenceSummary {
    let empty = MultiAgentAnalysis::default();
    let analysis = result.multi_agent_analysis.as_ref().unwrap_or(&empty);

    let collaboration = analysis
        .collaboration_summary
        .as_ref()
        .map(|summary| CollaborationView {
            total_agent_responses: summary.total_agent_responses,
            average_confidence: clamp_unit(summary.average_confidence),
            indicators: IndicatorView::from_map(&summary.quality_indicators),
        });

    let hypotheses = result
        .hypotheses
        .iter()
        .map(|hypothesis| HypothesisView {
            statement: hypothesis.statement.clone(),
            kind: hypothesis.kind.clone(),
            confidence: hypothesis.confidence(),
            supporting_evidence: hypothesis
                .supporting_evidence
                .iter()
                .take(EVIDENCE_PREVIEW)
                .cloned()
                .collect(),
            predictions: hypothesis
                .predictions
                .iter()
                .take(EVIDENCE_PREVIEW)
                .cloned()
                .collect(),
        })
        .collect();

    IntelligenceSummary {
        researcher_avg: analysis.score(MultiAgentAnalysis::RESEARCHER),
        critic_avg: analysis.score(MultiAgentAnalysis::CRITIC),
        synthesis_confidence: analysis.score(MultiAgentAnalysis::SYNTHESIS),
        collaboration,
        hypotheses,
    }
}

impl IntelligenceSummary {
    pub fn render_markdown(&self) -> String {
        let mut output = String::from("## Intelligence Analysis\n\n### Multi-Agent Collaboration:\n");
        let _ = writeln!(
            output,
            "- Researcher Confidence: {:.2}",
            self.researcher_avg
        );
        let _ = writeln!(output, "- Critic Confidence: {:.2}", self.critic_avg);
        let _ = writeln!(
            output,
            "- Synthesizer Confidence: {:.2}",
            self.synthesis_confidence
        );

        if let Some(collaboration) = &self.collaboration {
            output.push_str("\n### Collaboration Summary:\n");
            let _ = writeln!(
                output,
                "- Total Agent Responses: {}",
                collaboration.total_agent_responses
            );
            let _ = writeln!(
                output,
                "- Average Confidence: {:.2}",
                collaboration.average_confidence
            );
            for indicator in &collaboration.indicators {
                let _ = writeln!(output, "{}", indicator.render());
            }
        }

        if !self.hypotheses.is_empty() {
            output.push_str("\n### Generated Hypotheses:\n");
            for (idx, hypothesis) in self.hypotheses.iter().enumerate() {
                let _ = writeln!(output, "{}. **{}**", idx + 1, hypothesis.statement);
                let _ = writeln!(output, "   - Type: {}", hypothesis.kind);
                let _ = writeln!(output, "   - Confidence: {:.2}", hypothesis.confidence);
                for evidence in &hypothesis.supporting_evidence {
                    let _ = writeln!(output, "   - Evidence: {evidence}");
                }
                for prediction in &hypothesis.predictions {
                    let _ = writeln!(output, "   - Prediction: {prediction}");
                }
            }
        }
        output
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySummary {
    pub assessed: bool,
    pub overall_quality_score: Option<f64>,
    pub confidence_assessment: Option<f64>,
    pub total_findings: u32,
    pub external_sources_used: u32,
    pub source_diversity: u32,
    pub indicators: Vec<IndicatorView>,
}

pub fn quality_summary(result: &ResearchResult) -> QualitySummary {
    match &result.quality_assessment {
        Some(qa) => QualitySummary {
            assessed: true,
            overall_quality_score: qa.overall(),
            confidence_assessment: qa.confidence(),
            total_findings: qa.total_findings,
            external_sources_used: qa.external_sources_used,
            source_diversity: qa.source_diversity,
            indicators: IndicatorView::from_map(&qa.quality_indicators),
        },
        None => QualitySummary {
            assessed: false,
            overall_quality_score: None,
            confidence_assessment: None,
            total_findings: 0,
            external_sources_used: 0,
            source_diversity: 0,
            indicators: Vec::new(),
        },
    }
}

impl QualitySummary {
    pub fn overall_label(&self) -> String {
        score_out_of_ten(self.overall_quality_score)
    }

    pub fn render_markdown(&self) -> String {
        let mut output = String::from("## Quality Assessment\n\n");
        let _ = writeln!(output, "- Overall Quality Score: {}", self.overall_label());
        let _ = writeln!(
            output,
            "- Confidence Level: {}",
            two_decimals(self.confidence_assessment)
        );
        let _ = writeln!(output, "- Total Findings: {}", self.total_findings);
        let _ = writeln!(
            output,
            "- External Sources Used: {}",
            self.external_sources_used
        );
        let _ = writeln!(output, "- Source Diversity: {}", self.source_diversity);

        if !self.indicators.is_empty() {
            output.push_str("\n### Quality Indicators:\n");
            for indicator in &self.indicators {
                let _ = writeln!(output, "{}", indicator.render());
            }
        }
        output
    }
}

/// All projections for one result, derived independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultViews {
    pub final_answer: String,
    pub process: ProcessSummary,
    pub intelligence: IntelligenceSummary,
    pub quality: QualitySummary,
    pub timeline: Vec<TimelinePoint>,
    pub radar: QualityRadar,
    pub sources: SourceDistribution,
}

impl ResultViews {
    pub fn derive(result: &ResearchResult) -> Self {
        Self {
            final_answer: final_answer_text(result).to_string(),
            process: process_summary(result),
            intelligence: intelligence_summary(result),
            quality: quality_summary(result),
            timeline: crate::visualize::timeline(result),
            radar: crate::visualize::quality_radar(result),
            sources: crate::visualize::source_distribution(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{
        CollaborationSummary, Finding, Hypothesis, QualityAssessment, ResearchResult,
    };

    fn entanglement_result() -> ResearchResult {
        ResearchResult {
            final_answer: "Entanglement links quantum states.".into(),
            research_plan: vec!["Define terms".into(), "Survey literature".into()],
            findings: vec![
                Finding::new(0, "Define terms")
                    .with_sources(1, 0, 2)
                    .with_analysis("KEY_FINDINGS: entanglement is... NEW_CONCEPTS: none"),
            ],
            hypotheses: vec![],
            multi_agent_analysis: None,
            quality_assessment: Some(QualityAssessment {
                overall_quality_score: Some(7.0),
                confidence_assessment: Some(0.8),
                total_findings: 1,
                external_sources_used: 2,
                source_diversity: 1,
                quality_indicators: [("has_external_validation".to_string(), true)].into(),
            }),
        }
    }

    #[test]
    fn key_findings_are_extracted_between_markers() {
        assert_eq!(
            extract_key_findings("intro KEY_FINDINGS:  a and b \nNEW_CONCEPTS: c"),
            Some("a and b")
        );
        assert_eq!(
            extract_key_findings("KEY_FINDINGS: trailing text"),
            Some("trailing text")
        );
        assert_eq!(extract_key_findings("no markers here"), None);
        assert_eq!(extract_key_findings("KEY_FINDINGS: NEW_CONCEPTS: x"), None);
    }

    #[test]
    fn process_summary_counts_external_findings() {
        let mut result = entanglement_result();
        result.findings.push(Finding::new(1, "Survey literature").with_sources(3, 1, 0));
        let summary = process_summary(&result);

        assert_eq!(summary.findings_count, 2);
        assert_eq!(summary.external_findings, 1);

        let markdown = summary.render_markdown();
        assert!(markdown.contains("1. Define terms\n2. Survey literature"));
        assert!(markdown.contains("External sources consulted: 1"));
        assert!(markdown.contains("**Key Findings:** entanglement is..."));
    }

    #[test]
    fn intelligence_defaults_when_analysis_missing() {
        let summary = intelligence_summary(&ResearchResult::default());
        assert_eq!(summary.researcher_avg, 0.0);
        assert!(summary.collaboration.is_none());

        let markdown = summary.render_markdown();
        assert!(markdown.contains("- Researcher Confidence: 0.00"));
        assert!(markdown.contains("- Critic Confidence: 0.00"));
        assert!(markdown.contains("- Synthesizer Confidence: 0.00"));
        assert!(!markdown.contains("Generated Hypotheses"));
    }

    #[test]
    fn intelligence_lists_hypotheses_with_clamped_confidence() {
        let mut hypothesis = Hypothesis::new("Decoherence scales with mass", "causal", 1.4);
        hypothesis.supporting_evidence = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        let result = ResearchResult {
            hypotheses: vec![hypothesis],
            multi_agent_analysis: Some(MultiAgentAnalysis {
                confidence_scores: [
                    ("researcher_avg".to_string(), 0.456),
                    ("critic_avg".to_string(), 0.7),
                ]
                .into(),
                collaboration_summary: Some(CollaborationSummary {
                    total_agent_responses: 6,
                    average_confidence: 0.61,
                    quality_indicators: [("consensus_reached".to_string(), false)].into(),
                }),
            }),
            ..ResearchResult::default()
        };

        let summary = intelligence_summary(&result);
        assert_eq!(summary.hypotheses[0].confidence, 1.0);
        assert_eq!(summary.hypotheses[0].supporting_evidence.len(), 3);

        let markdown = summary.render_markdown();
        assert!(markdown.contains("- Researcher Confidence: 0.46"));
        assert!(markdown.contains("- Critic Confidence: 0.70"));
        assert!(markdown.contains("- Synthesizer Confidence: 0.00"));
        assert!(markdown.contains("1. **Decoherence scales with mass**"));
        assert!(markdown.contains("   - Type: causal"));
        assert!(markdown.contains("   - Confidence: 1.00"));
        assert!(markdown.contains("- Total Agent Responses: 6"));
        assert!(markdown.contains("❌ Consensus Reached"));
    }

    #[test]
    fn quality_summary_renders_scores_and_indicators() {
        let markdown = quality_summary(&entanglement_result()).render_markdown();
        assert!(markdown.contains("Overall Quality Score: 7/10"));
        assert!(markdown.contains("- Confidence Level: 0.80"));
        assert!(markdown.contains("- External Sources Used: 2"));
        assert!(markdown.contains("✅ Has External Validation"));
    }

    #[test]
    fn quality_summary_is_total_without_assessment() {
        let summary = quality_summary(&ResearchResult::default());
        assert!(!summary.assessed);

        let markdown = summary.render_markdown();
        assert!(markdown.contains("- Overall Quality Score: N/A"));
        assert!(markdown.contains("- Confidence Level: N/A"));
        assert!(markdown.contains("- Total Findings: 0"));
        assert!(markdown.contains("- Source Diversity: 0"));
    }

    #[test]
    fn views_use_placeholder_for_missing_answer() {
        let views = ResultViews::derive(&ResearchResult::default());
        assert_eq!(views.final_answer, "No final answer generated");
        assert!(views.timeline.is_empty());
    }
}
