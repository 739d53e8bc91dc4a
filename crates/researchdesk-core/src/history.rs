//! Append-only record of completed research sessions.

use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::result::ResearchResult;
use crate::session::ResearchSession;
use crate::text::score_out_of_ten;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub session_id: String,
    pub question: String,
    pub result: Arc<ResearchResult>,
    /// Snapshot of the overall quality score when the record was taken.
    pub quality_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(
        session_id: impl Into<String>,
        question: impl Into<String>,
        result: Arc<ResearchResult>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let quality_score = result.quality_score();
        Self {
            session_id: session_id.into(),
            question: question.into(),
            result,
            quality_score,
            timestamp,
        }
    }

    /// Record for a completed session, stamped with its end time.
    pub fn from_session(session: &ResearchSession, result: Arc<ResearchResult>) -> Self {
        Self::new(
            session.id(),
            session.question().text(),
            result,
            session.ended_at().unwrap_or_else(Utc::now),
        )
    }
}

/// Unbounded in-memory history. Writers are serialised; readers share the lock.
#[derive(Debug, Default)]
pub struct HistoryStore {
    records: RwLock<Vec<Arc<HistoryRecord>>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: HistoryRecord) -> Arc<HistoryRecord> {
        let record = Arc::new(record);
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        record
    }

    /// Last `limit` records, most recent first.
    pub fn recent(&self, limit: usize) -> Vec<Arc<HistoryRecord>> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn latest(&self) -> Option<Arc<HistoryRecord>> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Markdown listing of the given records in the order supplied.
pub fn render_history(records: &[Arc<HistoryRecord>]) -> String {
    if records.is_empty() {
        return "No research history available.\n".to_string();
    }

    let mut output = String::from("## Recent Research History\n\n");
    for (idx, record) in records.iter().enumerate() {
        let _ = writeln!(output, "### Research {}", idx + 1);
        let _ = writeln!(output, "- **Question:** {}", record.question);
        let _ = writeln!(
            output,
            "- **Quality Score:** {}",
            score_out_of_ten(record.quality_score)
        );
        let _ = write!(
            output,
            "- **Timestamp:** {}\n\n",
            record.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }
    output
}
