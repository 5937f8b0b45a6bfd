use serde::{Deserialize, Serialize};

/// What a widget shows for one user and one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Votes {
    pub likes: String,
    pub dislikes: String,
    pub liked: bool,
    pub disliked: bool,
    pub user: String,
}

/// Table key for a `(parent, child)` pair.
pub fn pair_key(parent: &str, child: &str) -> String {
    format!("{parent}:{child}")
}
