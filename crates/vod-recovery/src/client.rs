use std::sync::OnceLock;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::config::RecoveryConfig;
use crate::error::{RecoveryError, Result};

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("*/*"),
    );
    headers.insert(
        reqwest::header::CONNECTION,
        HeaderValue::from_static("keep-alive"),
    );
    headers
}

/// Build the client shared by every request of an engine.
///
/// The idle pool is sized to the probe concurrency so that a full batch
/// can reuse its connections instead of reopening them per candidate.
pub fn build_client(config: &RecoveryConfig) -> Result<Client> {
    install_rustls_provider();

    let mut builder = Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(default_headers())
        .timeout(config.probe_timeout())
        .connect_timeout(config.connect_timeout())
        .pool_idle_timeout(config.pool_idle_timeout())
        .pool_max_idle_per_host(config.probe_concurrency);

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(proxy.build()?);
    }

    builder
        .build()
        .map_err(|e| RecoveryError::configuration(format!("failed to build HTTP client: {e}")))
}
