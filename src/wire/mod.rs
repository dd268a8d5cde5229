use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// ========================================
/// Completion request / transcript records
/// ========================================

/// One remote completion: a system role plus one user prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Generated,
    Failed,
}

/// What got written next to a request when transcripts are enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub session: Uuid,
    pub stage: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    pub text: String,
}
