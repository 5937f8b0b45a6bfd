use crate::commands::feedback::{DEFAULT_DAILY_LIMIT, DEFAULT_RECENT_LIMIT};
use crate::commands::scheduler::DEFAULT_TICK_INTERVAL;
use crate::error::Result;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementSettings {
    pub tick_interval: Duration,
    pub daily_feedback_limit: u32,
    pub recent_feedback_limit: u32,
    pub counters_dir: PathBuf,
    pub votes_dir: PathBuf,
    pub database_file: PathBuf,
}

pub fn load_effective_settings(data_dir: &Path) -> Result<EngagementSettings> {
    let settings = load_settings_from_disk(data_dir)?;

    let tick_ms = settings
        .get("tickIntervalMs")
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_TICK_INTERVAL.as_millis() as u64);
    let daily_feedback_limit = settings
        .get("dailyFeedbackLimit")
        .and_then(Value::as_u64)
        .unwrap_or(u64::from(DEFAULT_DAILY_LIMIT)) as u32;
    let recent_feedback_limit = settings
        .get("recentFeedbackLimit")
        .and_then(Value::as_u64)
        .unwrap_or(u64::from(DEFAULT_RECENT_LIMIT)) as u32;

    Ok(EngagementSettings {
        tick_interval: Duration::from_millis(tick_ms),
        daily_feedback_limit,
        recent_feedback_limit,
        counters_dir: resolve_path(data_dir, &settings, "countersDir", "counters"),
        votes_dir: resolve_path(data_dir, &settings, "votesDir", "votes"),
        database_file: resolve_path(data_dir, &settings, "databaseFile", ".data/sqlite.db"),
    })
}

pub fn load_settings_from_disk(data_dir: &Path) -> Result<Value> {
    let path = settings_path(data_dir);
    fs::create_dir_all(data_dir)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path)?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|e| {
            log::warn!("ignoring unreadable {}: {e}", path.display());
            json!({})
        })
    } else {
        json!({})
    };

    let migrated = migrate_settings(original.clone());
    if migrated != original || !path.exists() {
        write_settings_file(&path, &migrated)?;
    }

    Ok(migrated)
}

/// Merge a partial settings object into what is stored and persist it.
pub fn save_settings_to_disk(data_dir: &Path, settings: Value) -> Result<Value> {
    let path = settings_path(data_dir);

    let mut merged = load_settings_from_disk(data_dir).unwrap_or_else(|_| default_settings());
    apply_overrides(&mut merged, &settings);

    let migrated = migrate_settings(merged);
    write_settings_file(&path, &migrated)?;
    Ok(migrated)
}

fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

fn resolve_path(data_dir: &Path, settings: &Value, key: &str, default: &str) -> PathBuf {
    let raw = settings.get(key).and_then(Value::as_str).unwrap_or(default);
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<()> {
    let raw = serde_json::to_string_pretty(settings)?;
    fs::write(path, raw)?;
    Ok(())
}

fn migrate_settings(input: Value) -> Value {
    let mut out = match input {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    if let Value::Object(defaults) = default_settings() {
        fill_missing_defaults(&mut out, defaults);
    }
    sanitize_settings(&mut out);
    out.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));

    Value::Object(out)
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "tickIntervalMs": DEFAULT_TICK_INTERVAL.as_millis() as u64,
        "dailyFeedbackLimit": DEFAULT_DAILY_LIMIT,
        "recentFeedbackLimit": DEFAULT_RECENT_LIMIT,
        "countersDir": "counters",
        "votesDir": "votes",
        "databaseFile": ".data/sqlite.db"
    })
}

/// Settings are a flat object; fill every key the stored file lacks.
fn fill_missing_defaults(target: &mut Map<String, Value>, defaults: Map<String, Value>) {
    for (key, default_value) in defaults {
        target.entry(key).or_insert(default_value);
    }
}

/// Overwrite stored keys with the ones present in a partial update. Anything
/// but an object is ignored.
fn apply_overrides(target: &mut Value, incoming: &Value) {
    let (Some(target_obj), Some(incoming_obj)) = (target.as_object_mut(), incoming.as_object()) else {
        log::warn!("ignoring settings update that is not a JSON object");
        return;
    };

    for (key, value) in incoming_obj {
        target_obj.insert(key.clone(), value.clone());
    }
}

fn sanitize_settings(obj: &mut Map<String, Value>) {
    clamp_u64(obj, "tickIntervalMs", 1_000, 86_400_000, DEFAULT_TICK_INTERVAL.as_millis() as u64);
    clamp_u64(obj, "dailyFeedbackLimit", 0, 100_000, u64::from(DEFAULT_DAILY_LIMIT));
    clamp_u64(obj, "recentFeedbackLimit", 1, 100, u64::from(DEFAULT_RECENT_LIMIT));

    ensure_path(obj, "countersDir", "counters");
    ensure_path(obj, "votesDir", "votes");
    ensure_path(obj, "databaseFile", ".data/sqlite.db");
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn ensure_path(map: &mut Map<String, Value>, key: &str, default: &str) {
    let value = map
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
        .to_string();
    map.insert(key.to_string(), json!(value));
}
