use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use researchdesk_core::report::{self, ExportFormat, ReportMetadata};
use researchdesk_core::{
    FailingAgent, HistoryStore, ProgressStage, ProgressTracker, RadarDimension, ReplayAgent,
    ResearchDeskError, ResearchPipeline, ResearchResult, SessionConfig, SessionStatus,
    render_history,
};

fn entanglement_result() -> ResearchResult {
    serde_json::from_value(serde_json::json!({
        "final_answer": "Entanglement is a correlation between quantum systems.",
        "research_plan": ["Define terms", "Survey literature"],
        "findings": [{
            "step": 0,
            "step_description": "Define terms",
            "sources_used": {"memory_basic": 1, "memory_advanced": 0, "external_sources": 2},
            "analysis": "KEY_FINDINGS: entanglement is... NEW_CONCEPTS: none"
        }],
        "hypotheses": [],
        "quality_assessment": {
            "overall_quality_score": 7,
            "confidence_assessment": 0.8,
            "total_findings": 1,
            "external_sources_used": 2,
            "source_diversity": 1,
            "quality_indicators": {"has_external_validation": true}
        }
    }))
    .expect("scenario payload should deserialize")
}

fn pipeline_with(agent: ReplayAgent, history: Arc<HistoryStore>) -> ResearchPipeline {
    ResearchPipeline::builder(agent)
        .with_history(history)
        .with_stage_interval(Duration::from_millis(5))
        .build()
}

#[tokio::test]
async fn quantum_entanglement_end_to_end() {
    let history = Arc::new(HistoryStore::new());
    let pipeline = pipeline_with(ReplayAgent::new(entanglement_result()), history.clone());
    let tracker = ProgressTracker::new();

    let outcome = pipeline
        .run_with_tracker(
            "What is quantum entanglement?",
            SessionConfig::default(),
            &tracker,
        )
        .await
        .expect("session should run");

    assert_eq!(outcome.session.status(), SessionStatus::Completed);
    assert_eq!(tracker.stage(), ProgressStage::Completed);
    assert!(outcome.session.started_at() <= outcome.session.ended_at());

    let views = outcome.views().expect("completed sessions have views");
    let process = views.process.render_markdown();
    assert!(process.contains("1. Define terms\n2. Survey literature"));
    assert!(process.contains("External sources consulted: 1"));
    assert!(
        views
            .quality
            .render_markdown()
            .contains("Overall Quality Score: 7/10")
    );
    assert_eq!(views.timeline.len(), 1);
    assert_eq!(views.radar.value(RadarDimension::Overall), 7.0);
    assert_eq!(views.sources.external_sources, 2);

    let result = outcome.result.as_deref().expect("result is kept");
    let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
    let markdown = report::to_markdown(result, "What is quantum entanglement?", timestamp);
    assert!(markdown.contains("entanglement is..."));
    assert!(!markdown.contains("NEW_CONCEPTS"));

    let latest = history.latest().expect("history records the session");
    assert_eq!(history.count(), 1);
    assert_eq!(latest.question, "What is quantum entanglement?");
    assert_eq!(latest.quality_score, Some(7.0));
    assert_eq!(latest.session_id, outcome.session.id());
    assert!(render_history(&history.recent(5)).contains("**Quality Score:** 7/10"));
}

#[tokio::test]
async fn json_export_round_trips_through_disk() {
    let history = Arc::new(HistoryStore::new());
    let pipeline = pipeline_with(ReplayAgent::new(entanglement_result()), history);
    let outcome = pipeline
        .run("What is quantum entanglement?", SessionConfig::default())
        .await
        .unwrap();
    let result = outcome.result.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
    let path = report::write_export(
        dir.path(),
        ExportFormat::Json,
        &result,
        "What is quantum entanglement?",
        timestamp,
    )
    .unwrap();
    assert_eq!(
        path.file_name().and_then(|name| name.to_str()),
        Some("research_results_20240501_083000.json")
    );

    let parsed = report::parse_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        parsed.metadata,
        ReportMetadata::new("What is quantum entanglement?", timestamp)
    );
    assert_eq!(parsed.result.final_answer, result.final_answer);
    assert_eq!(parsed.result.research_plan, result.research_plan);
    assert_eq!(parsed.result.findings.len(), result.findings.len());
    assert_eq!(parsed.result.quality_score(), result.quality_score());

    let replayed = ReplayAgent::from_json_file(&path).unwrap();
    assert_eq!(replayed.result(), result.as_ref());
}

#[tokio::test]
async fn failures_leave_history_untouched() {
    let history = Arc::new(HistoryStore::new());
    let pipeline = ResearchPipeline::builder(FailingAgent::new("rate limited"))
        .with_history(history.clone())
        .build();

    let outcome = pipeline
        .run("What is quantum entanglement?", SessionConfig::default())
        .await
        .unwrap();
    assert_eq!(outcome.session.status(), SessionStatus::Failed);
    assert_eq!(outcome.session.error(), Some("research agent failed: rate limited"));
    assert_eq!(outcome.progress.stage, ProgressStage::Failed);
    assert!(history.is_empty());
}

#[tokio::test]
async fn sessions_accumulate_in_order() {
    let history = Arc::new(HistoryStore::new());
    let pipeline = pipeline_with(ReplayAgent::new(entanglement_result()), history.clone());

    for question in ["first question", "second question", "third question"] {
        pipeline
            .run(question, SessionConfig::default())
            .await
            .unwrap();
    }

    let recent: Vec<_> = history
        .recent(2)
        .iter()
        .map(|record| record.question.clone())
        .collect();
    assert_eq!(recent, vec!["third question", "second question"]);
    assert_eq!(history.recent(10).len(), 3);
}

#[tokio::test]
async fn blank_question_never_reaches_the_agent() {
    let history = Arc::new(HistoryStore::new());
    let pipeline = pipeline_with(ReplayAgent::new(entanglement_result()), history.clone());

    let err = pipeline
        .run(" \t ", SessionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ResearchDeskError::InvalidInput(_)));
    assert!(history.is_empty());
}
