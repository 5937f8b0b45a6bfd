use engagement_lib::commands::counter::HitCounter;
use engagement_lib::commands::feedback::FeedbackStore;
use engagement_lib::commands::settings::save_settings_to_disk;
use engagement_lib::commands::votes::VoteLedger;
use engagement_lib::error::EngagementError;
use engagement_lib::models::feedback::NewFeedback;
use engagement_lib::models::tip::Tip;
use engagement_lib::Engagement;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

fn create_data_dir() -> TempDir {
    tempfile::tempdir().expect("create temp dir")
}

fn feedback(user: &str, text: &str) -> NewFeedback {
    NewFeedback {
        user: user.to_string(),
        text: text.to_string(),
        parent: "gallery".to_string(),
        child: "photo-7".to_string(),
    }
}

#[tokio::test]
async fn start_creates_settings_database_and_empty_state() {
    let tmp = create_data_dir();
    let engagement = Engagement::start(tmp.path()).await.expect("start");

    assert!(engagement.is_ticking());
    assert!(tmp.path().join("settings.json").exists());
    assert!(tmp.path().join(".data").join("sqlite.db").exists());
    assert_eq!(engagement.counter.lock().await.count(), 0);
    assert_eq!(engagement.feedback.count_all().await.expect("count"), "0");
}

#[tokio::test]
async fn state_survives_a_restart() {
    let tmp = create_data_dir();
    {
        let engagement = Engagement::start(tmp.path()).await.expect("start");
        engagement.register_hit("10.0.0.1").await.expect("hit");
        engagement.register_hit("10.0.0.1").await.expect("hit");
        engagement.register_hit("10.0.0.2").await.expect("hit");
        engagement.like("alice", "gallery", "photo-7").await;
        engagement.dislike("bob", "gallery", "photo-7").await;
        engagement
            .submit_feedback(feedback("alice", "Lovely colours"))
            .await
            .expect("feedback");
        engagement.shutdown().await.expect("shutdown");
    }

    let engagement = Engagement::start(tmp.path()).await.expect("restart");
    {
        let counter = engagement.counter.lock().await;
        assert_eq!(counter.count(), 3);
        assert_eq!(counter.unique_count(), 2);
    }

    let alice = engagement.votes("alice", "gallery", "photo-7").await;
    assert!(alice.liked);
    assert_eq!(alice.likes, "1");
    assert_eq!(alice.dislikes, "1");

    let recent = engagement
        .recent_feedback("alice", "gallery", "photo-7")
        .await
        .expect("recent");
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].text, "Lovely colours");
}

#[tokio::test]
async fn configured_daily_limit_gates_submissions() {
    let tmp = create_data_dir();
    save_settings_to_disk(tmp.path(), json!({ "dailyFeedbackLimit": 2 })).expect("save settings");
    let engagement = Engagement::start(tmp.path()).await.expect("start");

    engagement
        .submit_feedback(feedback("alice", "one"))
        .await
        .expect("first");
    let duplicate = engagement
        .submit_feedback(feedback("alice", "one"))
        .await
        .expect_err("duplicate");
    assert!(matches!(duplicate, EngagementError::DuplicateSubmission));

    engagement
        .submit_feedback(feedback("bob", "two"))
        .await
        .expect("second");
    let limited = engagement
        .submit_feedback(feedback("carol", "three"))
        .await
        .expect_err("over the limit");
    assert!(matches!(limited, EngagementError::DailyLimitExceeded));

    let tip = Tip::from_error(&limited);
    assert_eq!(
        serde_json::to_value(&tip).expect("tip json")["type"],
        json!("error")
    );
}

#[tokio::test]
async fn recent_feedback_returns_the_newest_ten_by_default() {
    let tmp = create_data_dir();
    let engagement = Engagement::start(tmp.path()).await.expect("start");
    assert_eq!(engagement.settings.recent_feedback_limit, 10);

    for i in 0..12 {
        engagement
            .feedback
            .add(feedback("alice", &format!("note {i}")))
            .await
            .expect("add");
    }

    let recent = engagement
        .recent_feedback("alice", "gallery", "photo-7")
        .await
        .expect("recent");
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[0].text, "note 11");
    assert_eq!(recent[9].text, "note 2");
}

#[tokio::test]
async fn scheduler_tick_persists_snapshots() {
    let tmp = create_data_dir();
    save_settings_to_disk(tmp.path(), json!({ "tickIntervalMs": 1_000 })).expect("save settings");
    let engagement = Engagement::start(tmp.path()).await.expect("start");

    engagement.register_hit("visitor").await.expect("hit");
    engagement.like("alice", "gallery", "photo-7").await;
    let snapshot = engagement.counter.lock().await.snapshot_path();

    let mut persisted = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if snapshot.exists() && engagement.settings.votes_dir.join("likes.json").exists() {
            persisted = true;
            break;
        }
    }
    assert!(persisted, "tick should write both snapshots");

    let mut reloaded = HitCounter::new(&engagement.settings.counters_dir);
    reloaded.load().await.expect("load ticked snapshot");
    assert_eq!(reloaded.count(), 1);

    let mut ledger = VoteLedger::new(&engagement.settings.votes_dir);
    ledger.load().await;
    assert_eq!(ledger.likes("gallery", "photo-7"), 1);
}

#[tokio::test]
async fn feedback_store_can_be_shared_between_handlers() {
    let store = FeedbackStore::in_memory().expect("store");
    store.setup().await.expect("setup");

    let mut handles = Vec::new();
    for i in 0..4 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .add(feedback(&format!("user-{i}"), "same words"))
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.expect("join").expect("add"), 1);
    }

    assert_eq!(
        store.count_by_pair("gallery", "photo-7").await.expect("count"),
        "4"
    );
}
