//! Live feeds over the paginated REST endpoints.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use fedistash_core::{FeedItem, FeedSource, Record, RecordId, Result};

use crate::client::ApiClient;

/// How a feed's raw items are shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// Bare records: statuses, favourites, bookmarks.
    Records,
    /// Notifications wrapping a record plus a type discriminator.
    Notifications,
}

/// Notification envelope as sent by the server.
#[derive(Debug, Deserialize)]
struct RawNotification {
    id: RecordId,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    status: Option<Record>,
}

impl FeedKind {
    fn parse(self, value: Value) -> Option<FeedItem> {
        match self {
            FeedKind::Records => match serde_json::from_value::<Record>(value) {
                Ok(record) => Some(FeedItem::Record(record)),
                Err(err) => {
                    warn!(error = %err, "skipping malformed record");
                    None
                }
            },
            FeedKind::Notifications => match serde_json::from_value::<RawNotification>(value) {
                Ok(notification) => Some(FeedItem::Notification {
                    id: notification.id,
                    kind: notification.kind,
                    record: notification.status,
                }),
                Err(err) => {
                    warn!(error = %err, "skipping malformed notification");
                    None
                }
            },
        }
    }
}

/// A paginated live feed backed by the REST API, consumed newest-first.
#[derive(Debug)]
pub struct ApiFeed<'a> {
    client: &'a ApiClient,
    kind: FeedKind,
    next: Option<String>,
}

impl<'a> ApiFeed<'a> {
    /// Create a feed starting at `first_url`.
    pub fn new(client: &'a ApiClient, kind: FeedKind, first_url: String) -> Self {
        Self {
            client,
            kind,
            next: Some(first_url),
        }
    }
}

#[async_trait]
impl FeedSource for ApiFeed<'_> {
    async fn next_page(&mut self) -> Result<Option<Vec<FeedItem>>> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };

        let page = self.client.get_page(&url).await?;
        self.next = page.next;

        let items = page
            .items
            .into_iter()
            .filter_map(|value| self.kind.parse(value))
            .collect();
        Ok(Some(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_records() {
        let item = FeedKind::Records
            .parse(json!({"id": 7, "created_at": "2024-01-05T00:00:00Z", "content": "hi"}))
            .unwrap();
        match item {
            FeedItem::Record(record) => assert_eq!(record.id.as_str(), "7"),
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn parses_notifications_with_and_without_status() {
        let mention = FeedKind::Notifications
            .parse(json!({
                "id": "n1",
                "type": "mention",
                "created_at": "2024-01-05T00:00:00Z",
                "status": {"id": "3", "created_at": "2024-01-05T00:00:00Z"},
            }))
            .unwrap();
        assert!(mention.is_mention());

        let follow = FeedKind::Notifications
            .parse(json!({"id": "n2", "type": "follow"}))
            .unwrap();
        assert!(!follow.is_mention());
    }

    #[test]
    fn malformed_items_are_skipped() {
        assert!(FeedKind::Records.parse(json!({"content": "no id"})).is_none());
        assert!(FeedKind::Notifications.parse(json!("nonsense")).is_none());
    }
}
