//! HTTP plumbing for the Mastodon REST API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, trace, warn};
use url::Url;

use fedistash_core::error::{AuthError, ProtocolError, TransportError};
use fedistash_core::{Error, Result};

use crate::pacer::Pacer;

/// How long to wait on a rate limit when the server gives no reset hint.
/// Matches the typical remote rate-limit window.
const RATE_LIMIT_FALLBACK: Duration = Duration::from_secs(300);

/// Attempts per request before a rate limit is surfaced to the caller.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Attempts per request for transient transport failures.
const MAX_TRANSIENT_RETRIES: u32 = 3;

/// One page of API results plus the continuation for the next one.
#[derive(Debug)]
pub struct Page {
    /// Raw items in feed order.
    pub items: Vec<Value>,
    /// Absolute URL of the next page, when the server offers one.
    pub next: Option<String>,
}

/// HTTP client for one instance's REST API.
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
    pacer: tokio::sync::Mutex<Pacer>,
}

impl ApiClient {
    /// Create a client for the given instance base URL.
    ///
    /// `token` enables authenticated endpoints; `pace` spaces requests out
    /// to stay under the rate limit (the `--pace` flag).
    pub fn new(base_url: &str, token: Option<String>, pace: bool) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| {
            fedistash_core::InvalidInputError::Other {
                message: format!("invalid instance URL '{}': {}", base_url, e),
            }
        })?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("fedistash/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(300))
            .build()
            .expect("failed to build HTTP client");

        Ok(Self {
            http,
            base,
            token,
            pacer: tokio::sync::Mutex::new(Pacer::new(pace)),
        })
    }

    /// Absolute URL for an API path like `api/v1/favourites`.
    pub fn url(&self, path: &str) -> String {
        let base = self.base.as_str().trim_end_matches('/');
        format!("{}/{}", base, path)
    }

    /// Fetch one page of a paginated endpoint, following the `Link` header
    /// for the continuation.
    #[instrument(skip(self))]
    pub async fn get_page(&self, url: &str) -> Result<Page> {
        let response = self.execute(Method::GET, url, None).await?;
        let next = next_link(response.headers());
        trace!(next = next.as_deref().unwrap_or("-"), "page continuation");
        let items = response.json().await.map_err(map_transport)?;
        Ok(Page { items, next })
    }

    /// GET a JSON value.
    pub(crate) async fn get_json<R: DeserializeOwned>(&self, url: &str) -> Result<R> {
        let response = self.execute(Method::GET, url, None).await?;
        response.json().await.map_err(map_transport)
    }

    /// POST a JSON body, returning the parsed response.
    pub(crate) async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|e| {
            fedistash_core::InvalidInputError::Other {
                message: e.to_string(),
            }
        })?;
        let response = self.execute(Method::POST, url, Some(body)).await?;
        response.json().await.map_err(map_transport)
    }

    /// POST with an empty body, discarding the response.
    pub(crate) async fn post_empty(&self, url: &str) -> Result<()> {
        self.execute(Method::POST, url, None).await?;
        Ok(())
    }

    /// DELETE, discarding the response.
    pub(crate) async fn delete(&self, url: &str) -> Result<()> {
        self.execute(Method::DELETE, url, None).await?;
        Ok(())
    }

    /// Fetch an arbitrary absolute URL (e.g. a media attachment) as bytes.
    #[instrument(skip(self))]
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.execute(Method::GET, url, None).await?;
        let bytes = response.bytes().await.map_err(map_transport)?;
        Ok(bytes.to_vec())
    }

    /// Issue one logical request, retrying transparently on rate limits and
    /// transient transport failures.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<reqwest::Response> {
        let mut transient_attempts = 0;
        let mut rate_limit_attempts = 0;

        loop {
            self.pacer.lock().await.wait().await;

            let mut request = self.http.request(method.clone(), url);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!(%method, url, status = status.as_u16(), "API request");

                    if status.is_success() {
                        return Ok(response);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let reset = parse_reset(response.headers());
                        rate_limit_attempts += 1;
                        if rate_limit_attempts > MAX_RATE_LIMIT_RETRIES {
                            return Err(Error::RateLimited { reset });
                        }
                        let delay = reset.map_or(RATE_LIMIT_FALLBACK, delay_until);
                        warn!(
                            delay_secs = delay.as_secs(),
                            attempt = rate_limit_attempts,
                            "rate limited, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Err(Self::response_error(response).await);
                }
                Err(err) if err.is_timeout() || err.is_connect() => {
                    transient_attempts += 1;
                    if transient_attempts > MAX_TRANSIENT_RETRIES {
                        return Err(map_transport(err));
                    }
                    let delay = Duration::from_secs(1u64 << transient_attempts.min(5));
                    warn!(
                        error = %err,
                        attempt = transient_attempts,
                        "transient network error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(map_transport(err)),
            }
        }
    }

    /// Map a non-success response to the error taxonomy.
    async fn response_error(response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => None,
        };

        if status == 401 {
            return AuthError::InvalidToken.into();
        }
        if status == 403 {
            if let Some(ref msg) = message {
                if msg.to_ascii_lowercase().contains("scope") {
                    return AuthError::Revoked {
                        message: msg.clone(),
                    }
                    .into();
                }
            }
        }

        ProtocolError::new(status, message).into()
    }
}

/// Error envelope used by the remote API.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

fn map_transport(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        TransportError::Timeout.into()
    } else if err.is_connect() {
        TransportError::Connection {
            message: err.to_string(),
        }
        .into()
    } else {
        TransportError::Http {
            message: err.to_string(),
        }
        .into()
    }
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    for part in link.split(',') {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments
            .any(|segment| segment.trim().eq_ignore_ascii_case("rel=\"next\""));
        if is_next {
            return Some(
                target
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string(),
            );
        }
    }
    None
}

/// Rate-limit reset hint: an RFC 3339 `X-RateLimit-Reset` header, or a
/// `Retry-After` delay in seconds.
fn parse_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    if let Some(value) = headers.get("x-ratelimit-reset") {
        if let Ok(text) = value.to_str() {
            if let Ok(at) = DateTime::parse_from_rfc3339(text) {
                return Some(at.with_timezone(&Utc));
            }
        }
    }
    if let Some(value) = headers.get(RETRY_AFTER) {
        if let Ok(seconds) = value.to_str().unwrap_or_default().parse::<i64>() {
            return Some(Utc::now() + chrono::Duration::seconds(seconds));
        }
    }
    None
}

fn delay_until(reset: DateTime<Utc>) -> Duration {
    (reset - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}
