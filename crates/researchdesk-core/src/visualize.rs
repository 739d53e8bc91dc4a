//! Chart-ready datasets derived from a [`ResearchResult`].

use serde::{Deserialize, Serialize};

use crate::result::ResearchResult;
use crate::text::truncate_chars;

const TIMELINE_LABEL_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// One-based step number.
    pub step: usize,
    pub label: String,
    pub external_sources: u32,
}

/// One point per finding, in finding order.
pub fn timeline(result: &ResearchResult) -> Vec<TimelinePoint> {
    result
        .findings
        .iter()
        .map(|finding| TimelinePoint {
            step: finding.step_index + 1,
            label: truncate_chars(&finding.step_description, TIMELINE_LABEL_CHARS),
            external_sources: finding.sources_used.external_sources,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadarDimension {
    Completeness,
    SourceDiversity,
    ExternalValidation,
    Confidence,
    Overall,
}

impl RadarDimension {
    pub const ALL: [RadarDimension; 5] = [
        RadarDimension::Completeness,
        RadarDimension::SourceDiversity,
        RadarDimension::ExternalValidation,
        RadarDimension::Confidence,
        RadarDimension::Overall,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RadarDimension::Completeness => "Completeness",
            RadarDimension::SourceDiversity => "Source Diversity",
            RadarDimension::ExternalValidation => "External Validation",
            RadarDimension::Confidence => "Confidence",
            RadarDimension::Overall => "Overall Quality",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarAxis {
    pub dimension: RadarDimension,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRadar {
    /// `false` when the result carried no quality assessment; all axes are 0.
    pub assessed: bool,
    pub axes: Vec<RadarAxis>,
}

impl QualityRadar {
    pub fn value(&self, dimension: RadarDimension) -> f64 {
        self.axes
            .iter()
            .find(|axis| axis.dimension == dimension)
            .map(|axis| axis.value)
            .unwrap_or(0.0)
    }
}

/// Five quality dimensions on a 0–10 scale.
///
/// External validation is a sources-per-finding ratio and is not clamped;
/// with zero findings the divisor is 1.
pub fn quality_radar(result: &ResearchResult) -> QualityRadar {
    let Some(qa) = &result.quality_assessment else {
        return QualityRadar {
            assessed: false,
            axes: RadarDimension::ALL
                .iter()
                .map(|dimension| RadarAxis {
                    dimension: *dimension,
                    value: 0.0,
                })
                .collect(),
        };
    };

    let total_findings = f64::from(qa.total_findings);
    let value = |dimension: RadarDimension| match dimension {
        RadarDimension::Completeness => (total_findings / 5.0 * 10.0).min(10.0),
        RadarDimension::SourceDiversity => (f64::from(qa.source_diversity) / 4.0 * 10.0).min(10.0),
        RadarDimension::ExternalValidation => {
            f64::from(qa.external_sources_used) / total_findings.max(1.0) * 10.0
        }
        RadarDimension::Confidence => qa.confidence().unwrap_or(0.0) * 10.0,
        RadarDimension::Overall => qa.overall().unwrap_or(0.0),
    };

    QualityRadar {
        assessed: true,
        axes: RadarDimension::ALL
            .iter()
            .map(|dimension| RadarAxis {
                dimension: *dimension,
                value: value(*dimension),
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDistribution {
    pub memory_basic: u64,
    pub memory_advanced: u64,
    pub external_sources: u64,
}

impl SourceDistribution {
    pub fn total(&self) -> u64 {
        self.memory_basic + self.memory_advanced + self.external_sources
    }

    /// Labelled slices in display order.
    pub fn slices(&self) -> [(&'static str, u64); 3] {
        [
            ("Memory (Basic)", self.memory_basic),
            ("Memory (Advanced)", self.memory_advanced),
            ("External Sources", self.external_sources),
        ]
    }
}

pub fn source_distribution(result: &ResearchResult) -> SourceDistribution {
    result
        .findings
        .iter()
        .fold(SourceDistribution::default(), |mut totals, finding| {
            totals.memory_basic += u64::from(finding.sources_used.memory_basic);
            totals.memory_advanced += u64::from(finding.sources_used.memory_advanced);
            totals.external_sources += u64::from(finding.sources_used.external_sources);
            totals
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{Finding, QualityAssessment};

    fn with_assessment(qa: QualityAssessment) -> ResearchResult {
        ResearchResult {
            quality_assessment: Some(qa),
            ..ResearchResult::default()
        }
    }

    #[test]
    fn timeline_has_one_point_per_finding() {
        let long = "x".repeat(80);
        let result = ResearchResult {
            findings: vec![
                Finding::new(0, "Define terms").with_sources(1, 0, 2),
                Finding::new(1, long.as_str()),
            ],
            ..ResearchResult::default()
        };
        let points = timeline(&result);

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].step, 1);
        assert_eq!(points[0].label, "Define terms");
        assert_eq!(points[0].external_sources, 2);
        assert_eq!(points[1].label, format!("{}...", "x".repeat(50)));
        assert!(timeline(&ResearchResult::default()).is_empty());
    }

    #[test]
    fn radar_clamps_completeness_and_diversity() {
        let radar = quality_radar(&with_assessment(QualityAssessment {
            total_findings: 50,
            source_diversity: 100,
            ..QualityAssessment::default()
        }));
        assert_eq!(radar.value(RadarDimension::Completeness), 10.0);
        assert_eq!(radar.value(RadarDimension::SourceDiversity), 10.0);
    }

    #[test]
    fn radar_guards_division_by_zero_findings() {
        let radar = quality_radar(&with_assessment(QualityAssessment {
            total_findings: 0,
            external_sources_used: 5,
            ..QualityAssessment::default()
        }));
        assert_eq!(radar.value(RadarDimension::ExternalValidation), 50.0);
        assert_eq!(radar.value(RadarDimension::Completeness), 0.0);
    }

    #[test]
    fn radar_scales_confidence_and_passes_overall_through() {
        let radar = quality_radar(&with_assessment(QualityAssessment {
            overall_quality_score: Some(7.5),
            confidence_assessment: Some(0.8),
            total_findings: 2,
            source_diversity: 2,
            external_sources_used: 1,
            ..QualityAssessment::default()
        }));
        assert!(radar.assessed);
        assert_eq!(radar.axes.len(), 5);
        assert!((radar.value(RadarDimension::Confidence) - 8.0).abs() < 1e-9);
        assert_eq!(radar.value(RadarDimension::Overall), 7.5);
        assert!((radar.value(RadarDimension::Completeness) - 4.0).abs() < 1e-9);
        assert_eq!(radar.value(RadarDimension::SourceDiversity), 5.0);
        assert_eq!(radar.value(RadarDimension::ExternalValidation), 5.0);
    }

    #[test]
    fn radar_without_assessment_is_flagged() {
        let radar = quality_radar(&ResearchResult::default());
        assert!(!radar.assessed);
        assert!(radar.axes.iter().all(|axis| axis.value == 0.0));
    }

    #[test]
    fn source_distribution_sums_findings() {
        let result = ResearchResult {
            findings: vec![
                Finding::new(0, "a").with_sources(1, 0, 2),
                Finding::new(1, "b").with_sources(3, 4, 0),
            ],
            ..ResearchResult::default()
        };
        let totals = source_distribution(&result);
        assert_eq!(totals.memory_basic, 4);
        assert_eq!(totals.memory_advanced, 4);
        assert_eq!(totals.external_sources, 2);
        assert_eq!(totals.total(), 10);

        let empty = source_distribution(&ResearchResult::default());
        assert_eq!(empty.total(), 0);
        assert_eq!(empty.slices()[2], ("External Sources", 0));
    }
}
