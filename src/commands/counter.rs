use crate::error::{EngagementError, Result};
use crate::models::hit::{hit_key, parse_hit_key, snapshot_file_name, HitRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Per-visitor daily hit counts. The live table only ever holds the current
/// day; crossing midnight flushes it to that day's snapshot and starts over.
#[derive(Debug)]
pub struct HitCounter {
    dir: PathBuf,
    data: BTreeMap<String, u64>,
    total_count: u64,
    uniq_count: u64,
    current_date: NaiveDate,
}

impl HitCounter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::starting_on(dir, today())
    }

    pub fn starting_on(dir: impl Into<PathBuf>, date: NaiveDate) -> Self {
        Self {
            dir: dir.into(),
            data: BTreeMap::new(),
            total_count: 0,
            uniq_count: 0,
            current_date: date,
        }
    }

    pub fn count(&self) -> u64 {
        self.total_count
    }

    pub fn unique_count(&self) -> u64 {
        self.uniq_count
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(snapshot_file_name(self.current_date))
    }

    pub fn records(&self) -> Vec<HitRecord> {
        self.data
            .iter()
            .filter_map(|(key, count)| {
                parse_hit_key(key).map(|(visitor_id, date)| HitRecord {
                    visitor_id,
                    date,
                    count: *count,
                })
            })
            .collect()
    }

    pub async fn register(&mut self, visitor_id: &str) -> Result<()> {
        self.register_on(visitor_id, today()).await
    }

    /// Count one hit for `visitor_id` on `date`, rotating first when `date`
    /// is not the live day. A failed rotation leaves the table untouched.
    pub async fn register_on(&mut self, visitor_id: &str, date: NaiveDate) -> Result<()> {
        self.rotate_if_needed(date).await?;

        let entry = self.data.entry(hit_key(visitor_id, date)).or_insert(0);
        if *entry == 0 {
            self.uniq_count += 1;
        }
        *entry = entry.saturating_add(1);
        self.total_count = self.total_count.saturating_add(1);
        Ok(())
    }

    /// Flush and clear the live table when `date` differs from the live day.
    /// Returns whether a rotation happened.
    pub async fn rotate_if_needed(&mut self, date: NaiveDate) -> Result<bool> {
        if date == self.current_date {
            return Ok(false);
        }

        self.store().await?;
        log::info!(
            "rotated hit counter from {} to {date} ({} hits, {} unique)",
            self.current_date,
            self.total_count,
            self.uniq_count
        );
        self.reset();
        self.current_date = date;
        Ok(true)
    }

    /// Periodic persistence step: rotate when the day moved on, otherwise
    /// overwrite today's snapshot.
    pub async fn tick(&mut self, date: NaiveDate) -> Result<()> {
        if !self.rotate_if_needed(date).await? {
            self.store().await?;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.data.clear();
        self.total_count = 0;
        self.uniq_count = 0;
    }

    /// Overwrite the live day's snapshot with the whole table.
    pub async fn store(&self) -> Result<()> {
        let raw = serde_json::to_string(&self.data)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.snapshot_path(), raw).await?;
        Ok(())
    }

    /// Replace the table with the live day's snapshot, recomputing totals.
    pub async fn load(&mut self) -> Result<()> {
        let path = self.snapshot_path();
        let raw = tokio::fs::read_to_string(&path).await?;
        let data: BTreeMap<String, u64> =
            serde_json::from_str(&raw).map_err(|e| EngagementError::corrupt_snapshot(&path, e))?;

        let total_count = data
            .values()
            .try_fold(0u64, |sum, count| sum.checked_add(*count))
            .ok_or_else(|| EngagementError::corrupt_snapshot(&path, "hit total overflows u64"))?;

        self.total_count = total_count;
        self.uniq_count = data.len() as u64;
        self.data = data;
        Ok(())
    }

    /// Startup variant of [`load`](Self::load): a missing or broken snapshot
    /// means zero counts.
    pub async fn load_or_reset(&mut self) {
        if let Err(e) = self.load().await {
            log::warn!(
                "starting hit counter empty, could not load {}: {e}",
                self.snapshot_path().display()
            );
            self.reset();
        }
    }
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
