//! Bounded-concurrency existence checks.
//!
//! A batch of URLs is turned into a stream of [`ProbeResult`]s that yields
//! each result as soon as its request settles. At most `concurrency`
//! requests are in flight, every request is bounded by a timeout, and a
//! failure (timeout, non-200, transport error) only ever marks its own URL
//! as missing.

use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use rand::seq::IndexedRandom;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use tracing::{debug, trace};

/// Outcome of one existence check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub requested_url: String,
    /// Final URL after redirects; equals `requested_url` on failure.
    pub resolved_url: String,
    pub success: bool,
}

impl ProbeResult {
    fn missing(url: String) -> Self {
        Self {
            resolved_url: url.clone(),
            requested_url: url,
            success: false,
        }
    }
}

/// HTTP verb used for a check. Manifests are fetched with GET because some
/// origins answer HEAD on playlists inconsistently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMethod {
    #[default]
    Head,
    Get,
}

impl ProbeMethod {
    fn as_method(self) -> Method {
        match self {
            Self::Head => Method::HEAD,
            Self::Get => Method::GET,
        }
    }
}

/// Progress callbacks for long batches. All methods default to no-ops.
pub trait ProbeProgress: Send + Sync {
    fn on_start(&self, _label: &str, _total: usize) {}

    fn on_result(&self, _completed: usize, _total: usize, _result: &ProbeResult) {}

    fn on_finish(&self, _found: usize, _total: usize) {}
}

/// Progress sink that reports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProbeProgress for NoProgress {}

/// Every result of a fully resolved batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeReport {
    pub total: usize,
    pub found: Vec<ProbeResult>,
}

impl ProbeReport {
    pub fn found_count(&self) -> usize {
        self.found.len()
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    pub fn resolved_urls(&self) -> Vec<String> {
        self.found.iter().map(|r| r.resolved_url.clone()).collect()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.found.iter().map(|r| r.requested_url.clone()).collect()
    }

    /// Uniform-random pick among every success, spreading load across CDN edges.
    pub fn choose_random(&self) -> Option<&ProbeResult> {
        self.found.choose(&mut rand::rng())
    }
}

#[derive(Debug, Clone)]
pub struct AvailabilityProber {
    client: Client,
    concurrency: usize,
    timeout: Duration,
    method: ProbeMethod,
}

impl AvailabilityProber {
    pub const DEFAULT_CONCURRENCY: usize = 100;

    pub fn new(client: Client, concurrency: usize, timeout: Duration) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
            timeout,
            method: ProbeMethod::Head,
        }
    }

    pub fn with_method(mut self, method: ProbeMethod) -> Self {
        self.method = method;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Results in completion order, which is unrelated to submission order.
    pub fn probe_stream<'a, I>(&'a self, urls: I) -> impl Stream<Item = ProbeResult> + Send + 'a
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'a,
    {
        stream::iter(urls)
            .map(move |url| self.probe_one(url))
            .buffer_unordered(self.concurrency)
    }

    /// Run the whole batch to completion and keep the successes.
    pub async fn probe_all(
        &self,
        label: &str,
        urls: Vec<String>,
        progress: &dyn ProbeProgress,
    ) -> ProbeReport {
        let total = urls.len();
        progress.on_start(label, total);

        let mut completed = 0usize;
        let mut found = Vec::new();
        let mut results = std::pin::pin!(self.probe_stream(urls));

        while let Some(result) = results.next().await {
            completed += 1;
            progress.on_result(completed, total, &result);
            if result.success {
                found.push(result);
            }
        }

        progress.on_finish(found.len(), total);
        debug!(label, total, found = found.len(), "Probe batch finished");

        ProbeReport { total, found }
    }

    async fn probe_one(&self, url: String) -> ProbeResult {
        let request = self
            .client
            .request(self.method.as_method(), &url)
            .timeout(self.timeout)
            .send();

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) if response.status() == StatusCode::OK => ProbeResult {
                resolved_url: response.url().to_string(),
                requested_url: url,
                success: true,
            },
            Ok(Ok(response)) => {
                trace!(url = %url, status = %response.status(), "Candidate not found");
                ProbeResult::missing(url)
            }
            Ok(Err(e)) => {
                trace!(url = %url, error = %e, "Candidate request failed");
                ProbeResult::missing(url)
            }
            Err(_) => {
                trace!(url = %url, timeout = ?self.timeout, "Candidate request timed out");
                ProbeResult::missing(url)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        crate::client::install_rustls_provider();
        Client::new()
    }

    fn success(url: &str) -> ProbeResult {
        ProbeResult {
            requested_url: url.to_string(),
            resolved_url: url.to_string(),
            success: true,
        }
    }

    #[test]
    fn random_choice_is_drawn_from_successes() {
        let report = ProbeReport {
            total: 10,
            found: vec![success("a"), success("b"), success("c")],
        };
        for _ in 0..32 {
            let pick = report.choose_random().unwrap();
            assert!(["a", "b", "c"].contains(&pick.resolved_url.as_str()));
        }
    }

    #[test]
    fn empty_report_has_no_choice() {
        let report = ProbeReport {
            total: 5,
            found: vec![],
        };
        assert!(report.is_empty());
        assert!(report.choose_random().is_none());
    }

    #[tokio::test]
    async fn unreachable_hosts_are_absorbed() {
        let prober = AvailabilityProber::new(client(), 4, Duration::from_millis(500));
        let urls = vec![
            "http://127.0.0.1:9/a".to_string(),
            "http://127.0.0.1:9/b".to_string(),
            "not a url".to_string(),
        ];
        let report = prober.probe_all("unreachable", urls, &NoProgress).await;
        assert_eq!(report.total, 3);
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_report() {
        let prober = AvailabilityProber::new(client(), 4, Duration::from_millis(500));
        let report = prober.probe_all("empty", vec![], &NoProgress).await;
        assert_eq!(report.total, 0);
        assert!(report.is_empty());
    }
}
