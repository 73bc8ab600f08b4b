//! The archived record model and its structural equivalence rules.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::RecordId;

/// Fields that churn on every fetch without the record itself changing.
/// They are ignored when deciding whether a stored and a live record match.
const VOLATILE_FIELDS: &[&str] = &[
    "followers_count",
    "following_count",
    "statuses_count",
    "last_status_at",
    "verified_at",
];

/// One archived item: a status, favourite, bookmark, or the status behind a
/// mention notification.
///
/// The merge engine only interprets the identity, the creation timestamp,
/// and the optional boost reference; everything else is carried as an opaque
/// payload and round-trips through the archive untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Stable identity, normalized to string form.
    pub id: RecordId,

    /// ISO-8601 creation timestamp, kept in its original textual encoding.
    pub created_at: String,

    /// The boosted record, for boost-wrapping records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reblog: Option<Box<Record>>,

    /// Everything else the server sent.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Record {
    /// Creation instant, if the timestamp parses.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    /// Structural match: deep equality ignoring volatile fields.
    ///
    /// Two records are equivalent when they share an identity and all
    /// non-volatile content. An absent field, an explicit null, and an empty
    /// string are treated as the same thing, and two textual encodings of
    /// the same instant compare equal.
    pub fn equivalent(&self, other: &Record) -> bool {
        if self.id != other.id {
            return false;
        }
        if !timestamps_equal(&self.created_at, &other.created_at) {
            return false;
        }
        let reblogs_match = match (&self.reblog, &other.reblog) {
            (None, None) => true,
            (Some(a), Some(b)) => a.equivalent(b),
            _ => false,
        };
        reblogs_match && maps_equivalent(&self.payload, &other.payload)
    }
}

/// One raw item from a live feed page.
///
/// The remote service hands back either bare records (statuses, favourites,
/// bookmarks) or notifications wrapping a record plus a type discriminator.
#[derive(Debug, Clone)]
pub enum FeedItem {
    /// A bare record.
    Record(Record),

    /// A notification, possibly wrapping a record.
    Notification {
        /// The notification's own id (needed to dismiss it).
        id: RecordId,
        /// The notification type, e.g. `mention`, `follow`, `reblog`.
        kind: String,
        /// The wrapped record, for types that carry one.
        record: Option<Record>,
    },
}

impl FeedItem {
    /// True for a mention notification that carries a record.
    pub fn is_mention(&self) -> bool {
        matches!(
            self,
            FeedItem::Notification {
                kind,
                record: Some(_),
                ..
            } if kind == "mention"
        )
    }

    /// Resolve this item to the record it archives, if any.
    ///
    /// Bare records resolve to themselves; notifications resolve to their
    /// wrapped record.
    pub fn into_record(self) -> Option<Record> {
        match self {
            FeedItem::Record(record) => Some(record),
            FeedItem::Notification { record, .. } => record,
        }
    }
}

/// Parse an ISO-8601 timestamp in either date-time or date-only form.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Some servers omit the zone designator.
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Some(prefix) = s.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }
    None
}

/// Compare two textual timestamps as instants when both parse, falling back
/// to string comparison when they don't. A date-only encoding equals the
/// midnight of the corresponding date-time encoding.
pub fn timestamps_equal(a: &str, b: &str) -> bool {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(ta), Some(tb)) => {
            ta == tb || (ta.date_naive() == tb.date_naive() && is_date_only(a) != is_date_only(b))
        }
        _ => a == b,
    }
}

fn is_date_only(s: &str) -> bool {
    s.len() == 10 && DateTime::parse_from_rfc3339(s).is_err()
}

/// Absent, null, and empty values are interchangeable.
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

fn values_equivalent(key: &str, a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(ma), Value::Object(mb)) => maps_equivalent(ma, mb),
        (Value::Array(va), Value::Array(vb)) => {
            va.len() == vb.len()
                && va
                    .iter()
                    .zip(vb.iter())
                    .all(|(x, y)| values_equivalent(key, x, y))
        }
        (Value::String(sa), Value::String(sb)) if key == "created_at" || key == "edited_at" => {
            timestamps_equal(sa, sb)
        }
        _ => a == b,
    }
}

fn maps_equivalent(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    let keys = a.keys().chain(b.keys());
    for key in keys {
        if VOLATILE_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let va = a.get(key);
        let vb = b.get(key);
        if is_blank(va) && is_blank(vb) {
            continue;
        }
        match (va, vb) {
            (Some(x), Some(y)) if values_equivalent(key, x, y) => {}
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn payload_round_trips_through_flatten() {
        let rec = record(json!({
            "id": 7,
            "created_at": "2024-01-05T10:00:00Z",
            "content": "<p>hello</p>",
            "reblog": null,
        }));
        assert_eq!(rec.id, RecordId::new("7"));
        assert!(rec.reblog.is_none());
        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(out["content"], "<p>hello</p>");
        assert_eq!(out["id"], "7");
    }

    #[test]
    fn volatile_fields_do_not_break_equivalence() {
        let a = record(json!({
            "id": "1",
            "created_at": "2024-01-05T10:00:00Z",
            "account": {"acct": "alice", "followers_count": 10},
        }));
        let b = record(json!({
            "id": "1",
            "created_at": "2024-01-05T10:00:00Z",
            "account": {"acct": "alice", "followers_count": 99, "last_status_at": "2024-02-01"},
        }));
        assert!(a.equivalent(&b));
    }

    #[test]
    fn changed_content_is_not_equivalent() {
        let a = record(json!({"id": "1", "created_at": "2024-01-05", "content": "old"}));
        let b = record(json!({"id": "1", "created_at": "2024-01-05", "content": "edited"}));
        assert!(!a.equivalent(&b));
    }

    #[test]
    fn absent_null_and_empty_are_interchangeable() {
        let a = record(json!({"id": "1", "created_at": "2024-01-05", "spoiler_text": ""}));
        let b = record(json!({"id": "1", "created_at": "2024-01-05", "spoiler_text": null}));
        let c = record(json!({"id": "1", "created_at": "2024-01-05"}));
        assert!(a.equivalent(&b));
        assert!(b.equivalent(&c));
        assert!(a.equivalent(&c));
    }

    #[test]
    fn date_only_and_date_time_encodings_compare_equal() {
        assert!(timestamps_equal("2024-01-05", "2024-01-05T15:30:00Z"));
        assert!(timestamps_equal(
            "2024-01-05T15:30:00Z",
            "2024-01-05T15:30:00.000Z"
        ));
        assert!(!timestamps_equal("2024-01-05", "2024-01-06T00:00:00Z"));
    }

    #[test]
    fn boost_reference_participates_in_equivalence() {
        let a = record(json!({
            "id": "2",
            "created_at": "2024-01-05",
            "reblog": {"id": "9", "created_at": "2024-01-01", "content": "x"},
        }));
        let mut b = a.clone();
        assert!(a.equivalent(&b));
        b.reblog = None;
        assert!(!a.equivalent(&b));
    }

    #[test]
    fn mention_resolution() {
        let item = FeedItem::Notification {
            id: RecordId::new("55"),
            kind: "mention".to_string(),
            record: Some(record(json!({"id": "3", "created_at": "2024-01-05"}))),
        };
        assert!(item.is_mention());
        assert_eq!(item.into_record().unwrap().id, RecordId::new("3"));

        let follow = FeedItem::Notification {
            id: RecordId::new("56"),
            kind: "follow".to_string(),
            record: None,
        };
        assert!(!follow.is_mention());
        assert!(follow.into_record().is_none());
    }
}
