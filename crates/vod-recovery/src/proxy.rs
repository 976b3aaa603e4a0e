use reqwest::Proxy;
use serde::{Deserialize, Serialize};

use crate::error::{RecoveryError, Result};

/// Proxy protocol used to reach the CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    #[default]
    Http,
    Https,
    Socks5,
}

/// Proxy credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Proxy configuration applied to every probing client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    #[serde(default)]
    pub proxy_type: ProxyType,
    #[serde(default)]
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    pub fn build(&self) -> Result<Proxy> {
        let url = &self.url;

        let mut proxy = match self.proxy_type {
            ProxyType::Http => Proxy::http(url),
            ProxyType::Https => Proxy::https(url),
            ProxyType::Socks5 => {
                if url.starts_with("socks5://") || url.starts_with("socks5h://") {
                    Proxy::all(url)
                } else {
                    Proxy::all(format!("socks5://{url}"))
                }
            }
        }
        .map_err(|e| RecoveryError::configuration(format!("invalid proxy URL `{url}`: {e}")))?;

        if let Some(auth) = &self.auth {
            proxy = proxy.basic_auth(&auth.username, &auth.password);
        }

        Ok(proxy)
    }
}
