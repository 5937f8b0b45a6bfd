use crate::analysis::number_format::format_number;
use crate::commands::db::{initialize_schema, open_database};
use crate::error::{EngagementError, Result};
use crate::models::feedback::{FeedbackEntry, NewFeedback, MAX_FEEDBACK_CHARS};
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const DEFAULT_DAILY_LIMIT: u32 = 5;
pub const DEFAULT_RECENT_LIMIT: u32 = 10;

/// Short moderated feedback backed by SQLite. Every call hops onto the
/// blocking pool, so callers only ever await.
#[derive(Clone)]
pub struct FeedbackStore {
    conn: Arc<Mutex<Connection>>,
}

impl FeedbackStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = open_database(db_path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub async fn setup(&self) -> Result<()> {
        self.with_conn(|conn| Ok(initialize_schema(conn)?)).await
    }

    /// Resolves only while fewer than `daily_limit` rows were created today,
    /// counted across all users.
    pub async fn can_submit(&self, daily_limit: u32) -> Result<()> {
        if daily_limit == 0 {
            return Err(EngagementError::DailyLimitExceeded);
        }

        self.with_conn(move |conn| check_daily_limit(conn, daily_limit)).await
    }

    /// Insert a new unresolved, unapproved entry; returns rows affected.
    pub async fn add(&self, feedback: NewFeedback) -> Result<usize> {
        self.with_conn(move |conn| insert_feedback(conn, &feedback)).await
    }

    /// Limit check and insert under one connection lock, so concurrent
    /// submissions can never overshoot the daily cap.
    pub async fn submit(&self, feedback: NewFeedback, daily_limit: u32) -> Result<usize> {
        if daily_limit == 0 {
            return Err(EngagementError::DailyLimitExceeded);
        }

        self.with_conn(move |conn| {
            check_daily_limit(conn, daily_limit)?;
            insert_feedback(conn, &feedback)
        })
        .await
    }

    pub async fn count_by_pair(&self, parent: &str, child: &str) -> Result<String> {
        let parent = parent.to_string();
        let child = child.to_string();
        let count: i64 = self
            .with_conn(move |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(id) FROM feedbacks WHERE parent = ?1 AND child = ?2",
                    params![parent, child],
                    |row| row.get(0),
                )?)
            })
            .await?;
        Ok(format_number(count.max(0) as u64))
    }

    pub async fn count_all(&self) -> Result<String> {
        let count: i64 = self
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(id) FROM feedbacks", [], |row| row.get(0))?)
            })
            .await?;
        Ok(format_number(count.max(0) as u64))
    }

    /// Newest first, at most `limit` rows for the exact `(user, parent, child)`.
    pub async fn recent_for(
        &self,
        user: &str,
        parent: &str,
        child: &str,
        limit: u32,
    ) -> Result<Vec<FeedbackEntry>> {
        let user = user.to_string();
        let parent = parent.to_string();
        let child = child.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user, text, key, parent, child, resolved, approved, created
                 FROM feedbacks
                 WHERE user = ?1 AND parent = ?2 AND child = ?3
                 ORDER BY created DESC, id DESC
                 LIMIT ?4",
            )?;

            let rows = stmt.query_map(params![user, parent, child, i64::from(limit)], |row| {
                Ok(FeedbackEntry {
                    id: row.get(0)?,
                    user: row.get(1)?,
                    text: row.get(2)?,
                    key: row.get(3)?,
                    parent: row.get(4)?,
                    child: row.get(5)?,
                    resolved: row.get::<_, i64>(6)? != 0,
                    approved: row.get::<_, i64>(7)? != 0,
                    created: row.get(8)?,
                })
            })?;

            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| EngagementError::Task(format!("feedback connection poisoned: {e}")))?;
            f(&guard)
        })
        .await?
    }
}

/// Content hash guarding against identical resubmissions. Each field is
/// length-prefixed so separators inside values cannot collide.
pub fn dedup_key(feedback: &NewFeedback) -> String {
    let mut hasher = Sha256::new();
    for field in [&feedback.user, &feedback.text, &feedback.parent, &feedback.child] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn check_daily_limit(conn: &Connection, daily_limit: u32) -> Result<()> {
    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let count: i64 = conn.query_row(
        "SELECT COUNT(id) FROM feedbacks WHERE date(created) = ?1",
        params![today],
        |row| row.get(0),
    )?;

    if count < i64::from(daily_limit) {
        Ok(())
    } else {
        log::debug!("daily feedback limit {daily_limit} reached ({count} today)");
        Err(EngagementError::DailyLimitExceeded)
    }
}

fn insert_feedback(conn: &Connection, feedback: &NewFeedback) -> Result<usize> {
    let key = dedup_key(feedback);
    conn.execute(
        "INSERT INTO feedbacks (user, key, parent, child, text) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![feedback.user, key, feedback.parent, feedback.child, feedback.text],
    )
    .map_err(classify_insert_error)
}

fn classify_insert_error(err: rusqlite::Error) -> EngagementError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        match failure.extended_code {
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => return EngagementError::DuplicateSubmission,
            rusqlite::ffi::SQLITE_CONSTRAINT_CHECK => {
                return EngagementError::Validation(format!(
                    "text must be between 1 and {MAX_FEEDBACK_CHARS} characters"
                ))
            }
            _ => {}
        }
    }
    EngagementError::Sqlite(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(user: &str, text: &str) -> NewFeedback {
        NewFeedback {
            user: user.to_string(),
            text: text.to_string(),
            parent: "blog".to_string(),
            child: "post-1".to_string(),
        }
    }

    async fn store() -> FeedbackStore {
        let store = FeedbackStore::in_memory().expect("in-memory store");
        store.setup().await.expect("setup");
        store
    }

    #[tokio::test]
    async fn daily_limit_is_shared_by_all_users() {
        let store = store().await;
        for i in 0..DEFAULT_DAILY_LIMIT {
            let added = store
                .submit(feedback(&format!("user-{i}"), "nice"), DEFAULT_DAILY_LIMIT)
                .await
                .expect("submission under the limit");
            assert_eq!(added, 1);
        }

        let err = store
            .submit(feedback("late-user", "nice"), DEFAULT_DAILY_LIMIT)
            .await
            .expect_err("limit reached");
        assert!(matches!(err, EngagementError::DailyLimitExceeded));
        assert_eq!(store.count_all().await.expect("count"), "5");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_never_exceed_the_daily_limit() {
        let store = store().await;
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.submit(feedback(&format!("user-{i}"), "same time"), 3).await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(_) => accepted += 1,
                Err(err) => assert!(matches!(err, EngagementError::DailyLimitExceeded)),
            }
        }
        assert_eq!(accepted, 3);
        assert_eq!(store.count_all().await.expect("count"), "3");
    }

    #[tokio::test]
    async fn zero_limit_rejects_without_querying() {
        let store = FeedbackStore::in_memory().expect("in-memory store");
        // No schema: a query would fail with a SQLite error instead.
        let err = store.can_submit(0).await.expect_err("zero limit");
        assert!(matches!(err, EngagementError::DailyLimitExceeded));
    }

    #[tokio::test]
    async fn query_failures_surface_as_persistence_errors() {
        let store = FeedbackStore::in_memory().expect("in-memory store");
        let err = store.can_submit(5).await.expect_err("missing table");
        assert!(err.is_persistence());
    }

    #[tokio::test]
    async fn identical_resubmission_is_a_duplicate() {
        let store = store().await;
        store.add(feedback("alice", "typo in title")).await.expect("first add");

        let err = store
            .add(feedback("alice", "typo in title"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, EngagementError::DuplicateSubmission));

        // Same text from another user is distinct content.
        store.add(feedback("bob", "typo in title")).await.expect("other user");
    }

    #[tokio::test]
    async fn text_length_is_validated_by_the_table() {
        let store = store().await;

        let empty = store.add(feedback("alice", "")).await.expect_err("empty text");
        assert!(matches!(empty, EngagementError::Validation(_)));

        let long = "x".repeat(MAX_FEEDBACK_CHARS + 1);
        let too_long = store.add(feedback("alice", &long)).await.expect_err("281 chars");
        assert!(matches!(too_long, EngagementError::Validation(_)));

        let exact = "y".repeat(MAX_FEEDBACK_CHARS);
        assert_eq!(store.add(feedback("alice", &exact)).await.expect("280 chars"), 1);
    }

    #[tokio::test]
    async fn recent_for_is_newest_first_and_limited() {
        let store = store().await;
        for i in 0..4 {
            store
                .add(feedback("alice", &format!("note {i}")))
                .await
                .expect("add");
        }
        store.add(feedback("bob", "not mine")).await.expect("add other");

        let recent = store
            .recent_for("alice", "blog", "post-1", 3)
            .await
            .expect("recent");
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].text, "note 3");
        assert_eq!(recent[2].text, "note 1");
        assert!(recent.iter().all(|entry| entry.user == "alice"));
        assert!(recent.iter().all(|entry| !entry.resolved && !entry.approved));
    }

    #[tokio::test]
    async fn counts_are_scoped_by_pair() {
        let store = store().await;
        store.add(feedback("alice", "one")).await.expect("add");
        store.add(feedback("bob", "two")).await.expect("add");
        store
            .add(NewFeedback {
                user: "alice".to_string(),
                text: "elsewhere".to_string(),
                parent: "docs".to_string(),
                child: "intro".to_string(),
            })
            .await
            .expect("add other pair");

        assert_eq!(store.count_by_pair("blog", "post-1").await.expect("count"), "2");
        assert_eq!(store.count_by_pair("docs", "intro").await.expect("count"), "1");
        assert_eq!(store.count_by_pair("docs", "none").await.expect("count"), "0");
        assert_eq!(store.count_all().await.expect("count"), "3");
    }

    #[test]
    fn dedup_key_depends_on_every_field() {
        let base = feedback("alice", "hello");
        let mut other_child = base.clone();
        other_child.child = "post-2".to_string();
        assert_eq!(dedup_key(&base), dedup_key(&base.clone()));
        assert_ne!(dedup_key(&base), dedup_key(&other_child));
        assert_eq!(dedup_key(&base).len(), 64);
    }

    #[tokio::test]
    async fn separators_inside_fields_do_not_collide() {
        let store = store().await;
        let first = feedback("a:b", "c");
        let second = feedback("a", "b:c");
        assert_ne!(dedup_key(&first), dedup_key(&second));

        store.add(first).await.expect("first add");
        store.add(second).await.expect("distinct content");
        assert_eq!(store.count_all().await.expect("count"), "2");
    }
}
