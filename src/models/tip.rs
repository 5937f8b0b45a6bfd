use crate::error::EngagementError;
use serde::{Deserialize, Serialize};

/// A group of messages handed to the tips renderer. Messages are inserted as
/// raw HTML, so anything user-supplied must be escaped before it lands here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    #[serde(rename = "type")]
    pub kind: String, // "success" | "error"
    pub messages: Vec<String>,
}

impl Tip {
    pub fn new(kind: &str, messages: Vec<String>) -> Self {
        Self {
            kind: kind.to_string(),
            messages,
        }
    }

    pub fn success(message: &str) -> Self {
        Self::new("success", vec![escape_html(message)])
    }

    /// User-facing wording for a rejected submission.
    pub fn from_error(err: &EngagementError) -> Self {
        let message = match err {
            EngagementError::DailyLimitExceeded => {
                "Daily feedback limit reached, please try again tomorrow.".to_string()
            }
            EngagementError::DuplicateSubmission => {
                "You have already sent this feedback.".to_string()
            }
            EngagementError::Validation(reason) => escape_html(reason),
            _ => "Something went wrong, please try again later.".to_string(),
        };
        Self::new("error", vec![message])
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
