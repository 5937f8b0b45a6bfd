pub mod analysis;
pub mod commands;
pub mod error;
pub mod models;

use commands::{
    counter::HitCounter,
    feedback::FeedbackStore,
    scheduler::Scheduler,
    settings::{load_effective_settings, EngagementSettings},
    votes::VoteLedger,
};
use error::Result;
use models::feedback::{FeedbackEntry, NewFeedback};
use models::vote::Votes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One of each manager, wired the way a host process runs them: snapshots
/// loaded at startup, persisted on every scheduler tick and on shutdown.
pub struct Engagement {
    pub settings: EngagementSettings,
    pub counter: Arc<Mutex<HitCounter>>,
    pub votes: Arc<Mutex<VoteLedger>>,
    pub feedback: FeedbackStore,
    scheduler: Scheduler,
}

impl Engagement {
    pub async fn start(data_dir: &Path) -> Result<Self> {
        let settings = load_effective_settings(data_dir)?;

        let mut counter = HitCounter::new(&settings.counters_dir);
        counter.load_or_reset().await;

        let mut votes = VoteLedger::new(&settings.votes_dir);
        votes.load().await;

        let feedback = FeedbackStore::open(&settings.database_file)?;
        feedback.setup().await?;

        let counter = Arc::new(Mutex::new(counter));
        let votes = Arc::new(Mutex::new(votes));

        let mut scheduler = Scheduler::new(settings.tick_interval);
        let tick_counter = Arc::clone(&counter);
        scheduler.schedule(move || {
            let counter = Arc::clone(&tick_counter);
            tokio::spawn(async move {
                let today = chrono::Utc::now().date_naive();
                if let Err(e) = counter.lock().await.tick(today).await {
                    log::error!("failed to persist hit counter: {e}");
                }
            });
        });
        let tick_votes = Arc::clone(&votes);
        scheduler.schedule(move || {
            let votes = Arc::clone(&tick_votes);
            tokio::spawn(async move {
                if let Err(e) = votes.lock().await.store().await {
                    log::error!("failed to persist votes: {e}");
                }
            });
        });
        scheduler.start();

        log::info!("engagement tracking started in {}", data_dir.display());

        Ok(Self {
            settings,
            counter,
            votes,
            feedback,
            scheduler,
        })
    }

    pub fn is_ticking(&self) -> bool {
        self.scheduler.is_running()
    }

    pub async fn register_hit(&self, visitor_id: &str) -> Result<()> {
        self.counter.lock().await.register(visitor_id).await
    }

    pub async fn like(&self, user: &str, parent: &str, child: &str) -> Votes {
        let mut votes = self.votes.lock().await;
        votes.like(user, parent, child);
        votes.votes(user, parent, child)
    }

    pub async fn dislike(&self, user: &str, parent: &str, child: &str) -> Votes {
        let mut votes = self.votes.lock().await;
        votes.dislike(user, parent, child);
        votes.votes(user, parent, child)
    }

    pub async fn votes(&self, user: &str, parent: &str, child: &str) -> Votes {
        self.votes.lock().await.votes(user, parent, child)
    }

    pub async fn submit_feedback(&self, feedback: NewFeedback) -> Result<usize> {
        self.feedback
            .submit(feedback, self.settings.daily_feedback_limit)
            .await
    }

    pub async fn recent_feedback(
        &self,
        user: &str,
        parent: &str,
        child: &str,
    ) -> Result<Vec<FeedbackEntry>> {
        self.feedback
            .recent_for(user, parent, child, self.settings.recent_feedback_limit)
            .await
    }

    /// Flush both snapshot stores.
    pub async fn shutdown(&self) -> Result<()> {
        self.counter.lock().await.store().await?;
        self.votes.lock().await.store().await?;
        log::info!("engagement snapshots flushed");
        Ok(())
    }
}

/// Binary entry point: data lives in `$ENGAGEMENT_DATA_DIR` (default `.`),
/// snapshots are flushed on Ctrl+C.
pub fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let data_dir = std::env::var("ENGAGEMENT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let engagement = Engagement::start(&data_dir).await?;
        tokio::signal::ctrl_c().await?;
        log::info!("received Ctrl+C, shutting down");
        engagement.shutdown().await
    })
}
