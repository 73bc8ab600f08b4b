//! fedistash-api - Mastodon REST client for the fedistash archiver.
//!
//! Covers exactly what the archiver needs: the credential check, the
//! paginated collection endpoints with Link-header continuation, the
//! destructive calls used by expiry, OAuth app registration and token
//! exchange, and a rate-limit-aware request path.

pub mod api;
pub mod auth;
pub mod client;
pub mod feed;
pub mod pacer;

pub use auth::AppCredentials;
pub use client::{ApiClient, Page};
pub use feed::{ApiFeed, FeedKind};
pub use pacer::Pacer;
