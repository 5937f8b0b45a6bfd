use serde::{Deserialize, Serialize};

pub const MAX_FEEDBACK_CHARS: usize = 280;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeedback {
    pub user: String,
    pub text: String,
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: i64,
    pub user: String,
    pub text: String,
    pub key: String,
    pub parent: String,
    pub child: String,
    pub resolved: bool,
    pub approved: bool,
    pub created: String, // "YYYY-MM-DD HH:MM:SS", UTC
}
