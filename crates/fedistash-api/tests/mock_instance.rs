//! Mock-instance tests for the API client.
//!
//! These tests use wiremock to simulate a Mastodon server and exercise the
//! client's pagination, retry, and error-mapping behavior without network
//! access or real credentials.

use fedistash_api::{ApiClient, ApiFeed, FeedKind};
use fedistash_core::{AuthError, Error, FeedSource, RecordId};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_client(server: &MockServer, token: Option<&str>) -> ApiClient {
    ApiClient::new(&server.uri(), token.map(String::from), false).unwrap()
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn fetch_all_follows_link_headers_to_exhaustion() {
    let server = MockServer::start().await;
    let next = format!("{}/api/v1/favourites?max_id=2", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/v1/favourites"))
        .and(query_param("max_id", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "2", "created_at": "2024-01-01T00:00:00Z"},
            {"id": "1", "created_at": "2024-01-01T00:00:00Z"},
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/favourites"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", format!("<{}>; rel=\"next\"", next).as_str())
                .set_body_json(json!([
                    {"id": "4", "created_at": "2024-01-02T00:00:00Z"},
                    {"id": "3", "created_at": "2024-01-02T00:00:00Z"},
                ])),
        )
        .mount(&server)
        .await;

    let client = mock_client(&server, Some("tok"));
    let items = client.fetch_all(&client.favourites_url()).await.unwrap();

    let ids: Vec<&str> = items
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["4", "3", "2", "1"]);
}

#[tokio::test]
async fn feed_pages_match_the_server_pages() {
    let server = MockServer::start().await;
    let next = format!("{}/api/v1/bookmarks?max_id=1", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/v1/bookmarks"))
        .and(query_param("max_id", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/bookmarks"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", format!("<{}>; rel=\"next\"", next).as_str())
                .set_body_json(json!([
                    {"id": "9", "created_at": "2024-03-01T00:00:00Z"},
                ])),
        )
        .mount(&server)
        .await;

    let client = mock_client(&server, Some("tok"));
    let mut feed = ApiFeed::new(&client, FeedKind::Records, client.bookmarks_url());

    let first = feed.next_page().await.unwrap().unwrap();
    assert_eq!(first.len(), 1);
    let second = feed.next_page().await.unwrap().unwrap();
    assert!(second.is_empty());
    assert!(feed.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn notification_feed_unwraps_statuses() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "n1",
                "type": "mention",
                "status": {"id": "55", "created_at": "2024-05-01T00:00:00Z"},
            },
            {"id": "n2", "type": "follow"},
        ])))
        .mount(&server)
        .await;

    let client = mock_client(&server, Some("tok"));
    let mut feed = ApiFeed::new(&client, FeedKind::Notifications, client.notifications_url());

    let page = feed.next_page().await.unwrap().unwrap();
    assert_eq!(page.len(), 2);
    assert!(page[0].is_mention());
    assert!(!page[1].is_mention());
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn rate_limit_retries_after_the_hinted_delay() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/favourites"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("Retry-After", "0"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/favourites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "1", "created_at": "2024-01-01T00:00:00Z"},
        ])))
        .mount(&server)
        .await;

    let client = mock_client(&server, Some("tok"));
    let page = client.get_page(&client.favourites_url()).await.unwrap();
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn persistent_rate_limit_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/favourites"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("Retry-After", "0"),
        )
        .mount(&server)
        .await;

    let client = mock_client(&server, Some("tok"));
    let err = client.get_page(&client.favourites_url()).await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { .. }));
}

// ============================================================================
// Error mapping
// ============================================================================

#[tokio::test]
async fn unauthorized_maps_to_invalid_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/verify_credentials"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "The access token is invalid",
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server, Some("stale"));
    let err = client.verify_credentials().await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::InvalidToken)));
}

#[tokio::test]
async fn revoked_scope_maps_to_revoked_authorization() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/statuses/42"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "This action is outside the authorized scopes",
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server, Some("read-only"));
    let err = client
        .delete_status(&RecordId::from("42"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::Revoked { .. })));
}

#[tokio::test]
async fn other_failures_carry_status_and_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/favourites"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "Internal server error",
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server, Some("tok"));
    let err = client.get_page(&client.favourites_url()).await.unwrap_err();
    let text = err.to_string();
    assert!(text.contains("500"), "unexpected error: {}", text);
}

// ============================================================================
// Destructive calls
// ============================================================================

#[tokio::test]
async fn delete_status_sends_the_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/statuses/7"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "7"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server, Some("tok"));
    client.delete_status(&RecordId::from("7")).await.unwrap();
}

#[tokio::test]
async fn dismiss_notification_posts_to_the_dismiss_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/notifications/n9/dismiss"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server, Some("tok"));
    client
        .dismiss_notification(&RecordId::from("n9"))
        .await
        .unwrap();
}
