//! Request pacing.
//!
//! One pacer per client, passed nowhere else; there is no process-wide
//! pacing state. The pacer enforces a minimum interval between requests
//! when pacing is enabled (the `--pace` flag), which keeps long archive
//! runs under the server's rate-limit budget instead of slamming into it.

use std::time::Duration;

use tokio::time::Instant;

/// Minimum spacing between requests when pacing is on.
const PACE_INTERVAL: Duration = Duration::from_secs(1);

/// Spaces requests out over time.
#[derive(Debug)]
pub struct Pacer {
    min_interval: Option<Duration>,
    last_request: Option<Instant>,
}

impl Pacer {
    /// Create a pacer; with `pace` false it never delays.
    pub fn new(pace: bool) -> Self {
        Self {
            min_interval: pace.then_some(PACE_INTERVAL),
            last_request: None,
        }
    }

    /// Wait until the next request is allowed, then record it.
    pub async fn wait(&mut self) {
        if let (Some(interval), Some(last)) = (self.min_interval, self.last_request) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn paced_requests_are_spaced_out() {
        let mut pacer = Pacer::new(true);
        let start = Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= 2 * PACE_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn unpaced_requests_do_not_wait() {
        let mut pacer = Pacer::new(false);
        let start = Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
