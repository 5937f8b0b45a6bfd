use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One visitor's hits on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitRecord {
    pub visitor_id: String,
    pub date: NaiveDate,
    pub count: u64,
}

/// Snapshot key: `"<visitorId>|<YYYY-MM-DD>"`.
pub fn hit_key(visitor_id: &str, date: NaiveDate) -> String {
    format!("{visitor_id}|{}", date.format("%Y-%m-%d"))
}

/// Split a snapshot key back into its visitor and date. The date follows the
/// last `|`, so visitor ids containing `|` survive.
pub fn parse_hit_key(key: &str) -> Option<(String, NaiveDate)> {
    let (visitor, date) = key.rsplit_once('|')?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some((visitor.to_string(), date))
}

/// Snapshot file name for a day: `count<YYYY-MM-DD>.json`.
pub fn snapshot_file_name(date: NaiveDate) -> String {
    format!("count{}.json", date.format("%Y-%m-%d"))
}
