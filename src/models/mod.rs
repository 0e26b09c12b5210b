//! Read models assembled from remote store rows.
//!
//! Rows arrive as loosely-typed field/value maps. Each read model owns one
//! transformation from row to struct, validating and defaulting every field
//! exactly once, colocated with the model it builds:
//!
//! - `Orphan`, `OrphanLite` and their related collections
//! - `Sponsor`, `SponsorLite`
//! - `TeamMember`, `TeamMemberLite`, `Task`
//! - `Conversation`, `Message`

pub mod message;
pub mod orphan;
pub mod sponsor;
pub mod team_member;

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::Value;

use crate::store::Row;

pub use message::{normalize_pair, Conversation, Message, SenderProfile};
pub use orphan::{
    Achievement, FamilyMember, Gift, LogEntry, Occasion, Orphan, OrphanLite, Payment,
    ProgramParticipation,
};
pub use sponsor::{Sponsor, SponsorLite};
pub use team_member::{Task, TeamMember, TeamMemberLite};

// ===== Row field access =====

/// String field; `None` when missing, null, or empty.
pub(crate) fn row_str(row: &Row, key: &str) -> Option<String> {
    match row.get(key).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Some(s.to_string()),
        _ => None,
    }
}

pub(crate) fn row_f64(row: &Row, key: &str) -> Option<f64> {
    let value = row.get(key)?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

pub(crate) fn row_bool(row: &Row, key: &str) -> bool {
    row.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Date field stored as `YYYY-MM-DD`.
pub(crate) fn row_date(row: &Row, key: &str) -> Option<NaiveDate> {
    let raw = row.get(key)?.as_str()?;
    NaiveDate::parse_from_str(&raw[..raw.len().min(10)], "%Y-%m-%d").ok()
}

/// Timestamp field stored as RFC 3339.
pub(crate) fn row_timestamp(row: &Row, key: &str) -> Option<DateTime<Utc>> {
    let raw = row.get(key)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ===== Related-row grouping =====

/// Group related rows by their owning entity's external identifier.
///
/// Single pass over the row set; rows without an owner id or that fail to
/// transform are skipped. This is the multi-map every fetcher attaches
/// related collections from, instead of filtering the full set per entity.
pub(crate) fn group_by_owner<T>(
    rows: Vec<Row>,
    owner_key: &str,
    transform: impl Fn(&Row) -> Option<T>,
) -> HashMap<String, Vec<T>> {
    let mut grouped: HashMap<String, Vec<T>> = HashMap::new();
    for row in &rows {
        let Some(owner) = row_str(row, owner_key) else { continue };
        let Some(item) = transform(row) else { continue };
        grouped.entry(owner).or_default().push(item);
    }
    grouped
}

// ===== Age =====

/// Whole years between `birth` and `today`, adjusted down by one when the
/// current month/day precedes the birth month/day. Computed at assembly
/// time, never persisted.
pub(crate) fn age_on(birth: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

pub(crate) fn age_today(birth: NaiveDate) -> u32 {
    age_on(birth, Utc::now().date_naive())
}
