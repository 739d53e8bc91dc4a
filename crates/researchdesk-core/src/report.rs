//! Deterministic exports: Markdown report, JSON document and one-paragraph
//! summary. Identical inputs always produce byte-identical output.

use std::fmt::Write as _;
use std::fs::{OpenOptions, create_dir_all};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{extract_key_findings, final_answer_text, quality_summary};
use crate::error::ExportError;
use crate::result::ResearchResult;
use crate::text::{score_out_of_ten, truncate_chars, two_decimals};

const SUMMARY_PREVIEW_CHARS: usize = 300;
const FILENAME_TIMESTAMP: &str = "%Y%m%d_%H%M%S";
const MAX_NAME_SUFFIX: usize = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Json,
    Summary,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "markdown",
            ExportFormat::Json => "json",
            ExportFormat::Summary => "summary",
        }
    }

    /// `research_report_<YYYYMMDD_HHMMSS>.md`, `research_results_<...>.json`,
    /// `research_summary_<...>.md`.
    pub fn filename(&self, timestamp: DateTime<Utc>) -> String {
        self.numbered_filename(timestamp, 0)
    }

    /// Same as [`filename`](Self::filename) with `_<n>` after the timestamp
    /// when `n > 0`.
    fn numbered_filename(&self, timestamp: DateTime<Utc>, n: usize) -> String {
        let (prefix, extension) = match self {
            ExportFormat::Markdown => ("research_report", "md"),
            ExportFormat::Json => ("research_results", "json"),
            ExportFormat::Summary => ("research_summary", "md"),
        };
        let stamp = timestamp.format(FILENAME_TIMESTAMP);
        if n == 0 {
            format!("{prefix}_{stamp}.{extension}")
        } else {
            format!("{prefix}_{stamp}_{n}.{extension}")
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "summary" => Ok(Self::Summary),
            other => Err(format!("unknown export format `{other}`")),
        }
    }
}

pub fn markdown_filename(timestamp: DateTime<Utc>) -> String {
    ExportFormat::Markdown.filename(timestamp)
}

pub fn json_filename(timestamp: DateTime<Utc>) -> String {
    ExportFormat::Json.filename(timestamp)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub question: String,
    pub timestamp: DateTime<Utc>,
}

impl ReportMetadata {
    pub fn new(question: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            question: question.into(),
            timestamp,
        }
    }
}

/// Parsed form of a JSON export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchExport {
    pub metadata: ReportMetadata,
    pub result: ResearchResult,
}

#[derive(Serialize)]
struct ExportRef<'a> {
    metadata: &'a ReportMetadata,
    result: &'a ResearchResult,
}

pub fn to_markdown(result: &ResearchResult, question: &str, timestamp: DateTime<Utc>) -> String {
    let mut report = String::from("# Research Report\n\n");
    let _ = write!(report, "## Research Question\n{question}\n\n");
    let _ = write!(report, "## Final Answer\n{}\n\n", final_answer_text(result));
    report.push_str("## Research Process\n");

    if !result.research_plan.is_empty() {
        report.push_str("\n### Research Plan\n");
        for (idx, step) in result.research_plan.iter().enumerate() {
            let _ = writeln!(report, "{}. {}", idx + 1, step);
        }
    }

    if !result.findings.is_empty() {
        report.push_str("\n### Key Findings\n");
        for finding in &result.findings {
            let _ = write!(
                report,
                "\n#### Step {}: {}\n",
                finding.step_index + 1,
                finding.step_description
            );
            if let Some(key_findings) = extract_key_findings(&finding.analysis_text) {
                let _ = writeln!(report, "{key_findings}");
            }
        }
    }

    let quality = quality_summary(result);
    report.push_str("\n## Quality Assessment\n");
    let _ = writeln!(report, "- Overall Quality Score: {}", quality.overall_label());
    let _ = writeln!(
        report,
        "- Confidence Level: {}",
        two_decimals(quality.confidence_assessment)
    );
    let _ = writeln!(report, "- Total Findings: {}", quality.total_findings);
    let _ = writeln!(
        report,
        "- External Sources Used: {}",
        quality.external_sources_used
    );

    let _ = write!(
        report,
        "\n---\n*Generated by ResearchDesk on {}*\n",
        timestamp.format("%Y-%m-%d %H:%M:%S")
    );
    report
}

/// Pretty JSON holding the complete result plus metadata. Every field is
/// emitted, defaults included.
pub fn to_json(result: &ResearchResult, metadata: &ReportMetadata) -> Result<String, ExportError> {
    ensure_finite(result)?;
    let payload = ExportRef { metadata, result };
    Ok(serde_json::to_string_pretty(&payload)?)
}

pub fn parse_json(raw: &str) -> Result<ResearchExport, ExportError> {
    Ok(serde_json::from_str(raw)?)
}

/// One-paragraph digest with a 300-character answer preview.
pub fn to_summary(result: &ResearchResult, question: &str) -> String {
    let answer = collapse_whitespace(final_answer_text(result));
    format!(
        "**Research Summary** Question: {}. Research steps completed: {}. Quality score: {}. \
         Hypotheses generated: {}. Final answer preview: {}",
        collapse_whitespace(question),
        result.findings.len(),
        score_out_of_ten(result.quality_score()),
        result.hypotheses.len(),
        truncate_chars(&answer, SUMMARY_PREVIEW_CHARS)
    )
}

pub fn render(
    format: ExportFormat,
    result: &ResearchResult,
    question: &str,
    timestamp: DateTime<Utc>,
) -> Result<String, ExportError> {
    match format {
        ExportFormat::Markdown => Ok(to_markdown(result, question, timestamp)),
        ExportFormat::Json => to_json(result, &ReportMetadata::new(question, timestamp)),
        ExportFormat::Summary => Ok(to_summary(result, question)),
    }
}

/// Render `format` and write it to `dir` under the standard filename.
///
/// Existing files are never replaced; a taken name gets a numeric suffix
/// (`research_report_20240309_140507_1.md`).
pub fn write_export<P: AsRef<Path>>(
    dir: P,
    format: ExportFormat,
    result: &ResearchResult,
    question: &str,
    timestamp: DateTime<Utc>,
) -> Result<PathBuf, ExportError> {
    let contents = render(format, result, question, timestamp)?;
    let dir = dir.as_ref();
    create_dir_all(dir).map_err(|err| ExportError::io(dir.to_path_buf(), err))?;

    let mut n = 0;
    let (path, mut file) = loop {
        let path = dir.join(format.numbered_filename(timestamp, n));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => break (path, file),
            Err(err) if err.kind() == ErrorKind::AlreadyExists && n < MAX_NAME_SUFFIX => n += 1,
            Err(err) => return Err(ExportError::io(path, err)),
        }
    };
    file.write_all(contents.as_bytes())
        .map_err(|err| ExportError::io(path.clone(), err))?;
    Ok(path)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn ensure_finite(result: &ResearchResult) -> Result<(), ExportError> {
    let mut values: Vec<(String, f64)> = Vec::new();

    for (idx, hypothesis) in result.hypotheses.iter().enumerate() {
        values.push((
            format!("hypotheses[{idx}].confidence"),
            hypothesis.raw_confidence,
        ));
    }
    if let Some(analysis) = &result.multi_agent_analysis {
        for (role, score) in &analysis.confidence_scores {
            values.push((
                format!("multi_agent_analysis.confidence_scores.{role}"),
                *score,
            ));
        }
        if let Some(summary) = &analysis.collaboration_summary {
            values.push((
                "multi_agent_analysis.collaboration_summary.average_confidence".into(),
                summary.average_confidence,
            ));
        }
    }
    if let Some(qa) = &result.quality_assessment {
        if let Some(score) = qa.overall_quality_score {
            values.push(("quality_assessment.overall_quality_score".into(), score));
        }
        if let Some(confidence) = qa.confidence_assessment {
            values.push(("quality_assessment.confidence_assessment".into(), confidence));
        }
    }

    match values.into_iter().find(|(_, value)| !value.is_finite()) {
        Some((field, value)) => Err(ExportError::NonFiniteValue { field, value }),
        None => Ok(()),
    }
}
