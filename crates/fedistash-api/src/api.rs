//! Typed endpoints used by the archiver.

use serde_json::Value;
use tracing::{debug, instrument};

use fedistash_core::{RecordId, Result};

use crate::client::ApiClient;

impl ApiClient {
    /// Check the stored token and return the account payload.
    #[instrument(skip(self))]
    pub async fn verify_credentials(&self) -> Result<Value> {
        self.get_json(&self.url("api/v1/accounts/verify_credentials"))
            .await
    }

    /// First page of the account's statuses.
    pub fn statuses_url(&self, account_id: &str) -> String {
        self.url(&format!("api/v1/accounts/{}/statuses?limit=40", account_id))
    }

    /// First page of the account's favourites.
    pub fn favourites_url(&self) -> String {
        self.url("api/v1/favourites?limit=40")
    }

    /// First page of the account's bookmarks.
    pub fn bookmarks_url(&self) -> String {
        self.url("api/v1/bookmarks?limit=40")
    }

    /// First page of the account's notifications.
    pub fn notifications_url(&self) -> String {
        self.url("api/v1/notifications?limit=40")
    }

    /// First page of the people following the account.
    pub fn followers_url(&self, account_id: &str) -> String {
        self.url(&format!("api/v1/accounts/{}/followers?limit=80", account_id))
    }

    /// First page of the people the account follows.
    pub fn following_url(&self, account_id: &str) -> String {
        self.url(&format!("api/v1/accounts/{}/following?limit=80", account_id))
    }

    /// First page of muted accounts.
    pub fn mutes_url(&self) -> String {
        self.url("api/v1/mutes?limit=80")
    }

    /// First page of blocked accounts.
    pub fn blocks_url(&self) -> String {
        self.url("api/v1/blocks?limit=80")
    }

    /// Walk a paginated endpoint to exhaustion, for the wholesale-replaced
    /// social-graph lists.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self, first_url: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut next = Some(first_url.to_string());

        while let Some(url) = next {
            let page = self.get_page(&url).await?;
            items.extend(page.items);
            next = page.next;
        }

        debug!(count = items.len(), "fetched full list");
        Ok(items)
    }

    /// Delete one of the account's own statuses.
    #[instrument(skip(self))]
    pub async fn delete_status(&self, id: &RecordId) -> Result<()> {
        self.delete(&self.url(&format!("api/v1/statuses/{}", id)))
            .await
    }

    /// Remove a favourite.
    #[instrument(skip(self))]
    pub async fn unfavourite(&self, id: &RecordId) -> Result<()> {
        self.post_empty(&self.url(&format!("api/v1/statuses/{}/unfavourite", id)))
            .await
    }

    /// Remove a bookmark.
    #[instrument(skip(self))]
    pub async fn unbookmark(&self, id: &RecordId) -> Result<()> {
        self.post_empty(&self.url(&format!("api/v1/statuses/{}/unbookmark", id)))
            .await
    }

    /// Dismiss a single notification.
    #[instrument(skip(self))]
    pub async fn dismiss_notification(&self, id: &RecordId) -> Result<()> {
        self.post_empty(&self.url(&format!("api/v1/notifications/{}/dismiss", id)))
            .await
    }
}
