//! Live feed abstraction.

use async_trait::async_trait;

use crate::Result;
use crate::record::FeedItem;

/// A paginated live feed, consumed newest-first.
///
/// The merge engine pulls pages one at a time; implementations own the
/// continuation state and return `None` once the feed is exhausted.
#[async_trait]
pub trait FeedSource: Send {
    /// Fetch the next page of items, or `None` when there are no more pages.
    async fn next_page(&mut self) -> Result<Option<Vec<FeedItem>>>;
}
