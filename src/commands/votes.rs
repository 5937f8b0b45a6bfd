use crate::analysis::number_format::format_number;
use crate::error::{EngagementError, Result};
use crate::models::vote::{pair_key, Votes};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

const COUNTER_FIELD: &str = "counter";

/// Users marked on one side (likes or dislikes) of a pair, plus the running
/// counter kept alongside them.
///
/// On disk this is a single JSON object: one `"<user>": 1` entry per user and
/// the reserved `"counter"` integer. A user literally named `counter` cannot
/// be represented and is dropped by the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteSet {
    users: BTreeSet<String>,
    counter: u64,
}

impl VoteSet {
    pub fn contains(&self, user: &str) -> bool {
        self.users.contains(user)
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    fn insert(&mut self, user: &str) -> bool {
        if self.users.insert(user.to_string()) {
            self.counter = self.counter.saturating_add(1);
            true
        } else {
            false
        }
    }

    fn remove(&mut self, user: &str) -> bool {
        if self.users.remove(user) {
            self.counter = self.counter.saturating_sub(1);
            true
        } else {
            false
        }
    }
}

impl Serialize for VoteSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.users.len() + 1))?;
        for user in self.users.iter().filter(|u| u.as_str() != COUNTER_FIELD) {
            map.serialize_entry(user, &1)?;
        }
        map.serialize_entry(COUNTER_FIELD, &self.counter)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for VoteSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(VoteSetVisitor)
    }
}

struct VoteSetVisitor;

impl<'de> Visitor<'de> for VoteSetVisitor {
    type Value = VoteSet;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object of user marks with a counter field")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<VoteSet, A::Error> {
        let mut set = VoteSet::default();
        let mut counter = None;

        while let Some(key) = access.next_key::<String>()? {
            if key == COUNTER_FIELD {
                let value: i64 = access.next_value()?;
                counter = Some(u64::try_from(value).map_err(|_| {
                    de::Error::custom(format!("negative vote counter {value}"))
                })?);
            } else {
                // Retracted marks may linger as falsy values.
                let mark: serde_json::Value = access.next_value()?;
                if is_truthy(&mark) {
                    set.users.insert(key);
                }
            }
        }

        set.counter = counter.unwrap_or(set.users.len() as u64);
        Ok(set)
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map_or(false, |v| v != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

type VoteTable = BTreeMap<String, VoteSet>;

/// Like/dislike marks per `(parent, child)` pair. A user sits on at most one
/// side of a pair at a time.
#[derive(Debug)]
pub struct VoteLedger {
    dir: PathBuf,
    likes: VoteTable,
    dislikes: VoteTable,
}

impl VoteLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            likes: VoteTable::new(),
            dislikes: VoteTable::new(),
        }
    }

    pub fn likes_path(&self) -> PathBuf {
        self.dir.join("likes.json")
    }

    pub fn dislikes_path(&self) -> PathBuf {
        self.dir.join("dislikes.json")
    }

    pub fn votes(&self, user: &str, parent: &str, child: &str) -> Votes {
        let key = pair_key(parent, child);
        Votes {
            likes: format_number(self.likes(parent, child)),
            dislikes: format_number(self.dislikes(parent, child)),
            liked: side_contains(&self.likes, &key, user),
            disliked: side_contains(&self.dislikes, &key, user),
            user: user.to_string(),
        }
    }

    pub fn likes(&self, parent: &str, child: &str) -> u64 {
        side_counter(&self.likes, &pair_key(parent, child))
    }

    pub fn dislikes(&self, parent: &str, child: &str) -> u64 {
        side_counter(&self.dislikes, &pair_key(parent, child))
    }

    /// Mark `user` as liking the pair, dropping any dislike. No-op when the
    /// like is already there.
    pub fn like(&mut self, user: &str, parent: &str, child: &str) {
        let key = pair_key(parent, child);
        if self.likes.entry(key.clone()).or_default().insert(user) {
            retract(&mut self.dislikes, &key, user);
        }
    }

    pub fn dislike(&mut self, user: &str, parent: &str, child: &str) {
        let key = pair_key(parent, child);
        if self.dislikes.entry(key.clone()).or_default().insert(user) {
            retract(&mut self.likes, &key, user);
        }
    }

    pub fn retract_like(&mut self, user: &str, parent: &str, child: &str) {
        retract(&mut self.likes, &pair_key(parent, child), user);
    }

    pub fn retract_dislike(&mut self, user: &str, parent: &str, child: &str) {
        retract(&mut self.dislikes, &pair_key(parent, child), user);
    }

    /// Write both tables whole; each file is last-writer-wins.
    pub async fn store(&self) -> Result<()> {
        let likes = encode(&self.likes)?;
        let dislikes = encode(&self.dislikes)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::try_join!(
            tokio::fs::write(self.likes_path(), likes),
            tokio::fs::write(self.dislikes_path(), dislikes),
        )?;
        Ok(())
    }

    /// Restore both tables. Any failure leaves the ledger empty instead of
    /// erroring; the snapshots are best effort.
    pub async fn load(&mut self) {
        match self.read_tables().await {
            Ok((likes, dislikes)) => {
                self.likes = likes;
                self.dislikes = dislikes;
            }
            Err(e) => {
                log::warn!("starting vote ledger empty: {e}");
                self.likes.clear();
                self.dislikes.clear();
            }
        }
    }

    async fn read_tables(&self) -> Result<(VoteTable, VoteTable)> {
        let (likes_path, dislikes_path) = (self.likes_path(), self.dislikes_path());
        let (likes, dislikes) = tokio::try_join!(
            tokio::fs::read_to_string(&likes_path),
            tokio::fs::read_to_string(&dislikes_path),
        )?;
        Ok((decode(&likes, &likes_path)?, decode(&dislikes, &dislikes_path)?))
    }
}

fn side_contains(table: &VoteTable, key: &str, user: &str) -> bool {
    table.get(key).map_or(false, |set| set.contains(user))
}

fn side_counter(table: &VoteTable, key: &str) -> u64 {
    table.get(key).map_or(0, VoteSet::counter)
}

fn retract(table: &mut VoteTable, key: &str, user: &str) {
    if let Some(set) = table.get_mut(key) {
        set.remove(user);
    }
}

fn encode(table: &VoteTable) -> Result<String> {
    Ok(serde_json::to_string(table)?)
}

fn decode(raw: &str, path: &Path) -> Result<VoteTable> {
    serde_json::from_str(raw).map_err(|e| EngagementError::corrupt_snapshot(path, e))
}
