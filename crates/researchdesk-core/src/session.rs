use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ResearchDeskError;

/// The user's research query, trimmed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchQuestion {
    text: String,
    created_at: DateTime<Utc>,
}

impl ResearchQuestion {
    pub fn new(text: &str) -> Result<Self, ResearchDeskError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ResearchDeskError::InvalidInput(
                "research question must not be empty".into(),
            ));
        }
        Ok(Self {
            text: trimmed.to_string(),
            created_at: Utc::now(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Display for ResearchQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Starter questions offered to users with an empty prompt.
pub const SUGGESTED_QUESTIONS: [&str; 10] = [
    "What are the ethical implications of AI in healthcare?",
    "How do different renewable energy technologies compare in efficiency?",
    "What are the latest breakthroughs in quantum computing?",
    "How does climate change affect global food security?",
    "What are the emerging trends in cybersecurity?",
    "How do different economic models predict inflation?",
    "What are the competing theories about consciousness?",
    "How does social media impact mental health?",
    "What are the potential applications of CRISPR gene editing?",
    "How do neural networks learn and make decisions?",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchDepth {
    Quick,
    #[default]
    Standard,
    Comprehensive,
}

impl ResearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchDepth::Quick => "quick",
            ResearchDepth::Standard => "standard",
            ResearchDepth::Comprehensive => "comprehensive",
        }
    }
}

impl std::str::FromStr for ResearchDepth {
    type Err = ResearchDeskError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "standard" => Ok(Self::Standard),
            "comprehensive" => Ok(Self::Comprehensive),
            other => Err(ResearchDeskError::InvalidInput(format!(
                "unknown research depth `{other}`"
            ))),
        }
    }
}

/// Run options; copied into the session and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub enable_hypothesis: bool,
    pub enable_multi_agent: bool,
    pub depth: ResearchDepth,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enable_hypothesis: true,
            enable_multi_agent: true,
            depth: ResearchDepth::Standard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Pending, SessionStatus::Running)
                | (SessionStatus::Running, SessionStatus::Completed)
                | (SessionStatus::Running, SessionStatus::Failed)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One research run and its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSession {
    id: String,
    question: ResearchQuestion,
    config: SessionConfig,
    status: SessionStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl ResearchSession {
    /// Create a `Pending` session. Rejects empty or whitespace-only questions.
    pub fn create(question: &str, config: SessionConfig) -> Result<Self, ResearchDeskError> {
        let question = ResearchQuestion::new(question)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            question,
            config,
            status: SessionStatus::Pending,
            started_at: None,
            ended_at: None,
            error: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn question(&self) -> &ResearchQuestion {
        &self.question
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock time between the Running and terminal transitions.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Move to `next`, enforcing Pending → Running → {Completed | Failed}.
    pub fn transition(&mut self, next: SessionStatus) -> Result<(), ResearchDeskError> {
        if !self.status.can_transition_to(next) {
            return Err(ResearchDeskError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        match next {
            SessionStatus::Running => self.started_at = Some(now),
            SessionStatus::Completed | SessionStatus::Failed => {
                // Clock adjustments must not produce ended_at < started_at.
                let ended = self.started_at.map_or(now, |start| now.max(start));
                self.ended_at = Some(ended);
            }
            SessionStatus::Pending => {}
        }
        self.status = next;
        Ok(())
    }

    /// Transition a running session to `Failed`, keeping the error message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), ResearchDeskError> {
        self.transition(SessionStatus::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }
}
