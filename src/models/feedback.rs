use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Highest ordinal label a feedback outcome can map to
pub const MAX_LABEL: f64 = 5.0;

/// Outcome of a suggested match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Sent,
    ContactMade,
    MeetingArranged,
    Matched,
    Rejected,
    NoResponse,
}

impl FeedbackStatus {
    /// Ordinal relevance label used for listwise training
    pub fn label(self) -> f64 {
        match self {
            FeedbackStatus::Matched => 5.0,
            FeedbackStatus::MeetingArranged => 4.0,
            FeedbackStatus::ContactMade => 3.0,
            FeedbackStatus::Sent => 2.0,
            FeedbackStatus::NoResponse => 1.0,
            FeedbackStatus::Rejected => 0.0,
        }
    }
}

/// Historical outcome for a requester -> candidate suggestion
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeedbackExample {
    #[serde(rename = "requesterId")]
    #[validate(length(min = 1))]
    pub requester_id: String,
    #[serde(rename = "candidateId")]
    #[validate(length(min = 1))]
    pub candidate_id: String,
    pub status: FeedbackStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<u8>,
    #[serde(rename = "recordedAt", default = "Utc::now")]
    pub recorded_at: DateTime<Utc>,
}

impl FeedbackExample {
    pub fn new(
        requester_id: impl Into<String>,
        candidate_id: impl Into<String>,
        status: FeedbackStatus,
    ) -> Self {
        Self {
            requester_id: requester_id.into(),
            candidate_id: candidate_id.into(),
            status,
            reason: None,
            rating: None,
            recorded_at: Utc::now(),
        }
    }
}
