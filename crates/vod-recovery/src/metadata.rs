use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::Result;
use crate::identity::BroadcastIdentity;

/// Source of broadcast facts the engines cannot derive themselves.
///
/// Implementations typically scrape third-party tracker pages; the engines
/// only ever see the returned values.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Whether `url` points at a page this provider understands.
    fn supports(&self, url: &str) -> bool;

    /// Start of the broadcast in UTC, second precision.
    async fn resolve_broadcast_start(&self, url: &str) -> Result<NaiveDateTime>;

    /// Broadcast length in whole minutes.
    async fn resolve_broadcast_duration(&self, url: &str) -> Result<u64>;

    /// Streamer and video id encoded in the page URL, plus the resolved start.
    async fn resolve_identity(&self, url: &str) -> Result<BroadcastIdentity>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::parse_timestamp;

    struct Fixed;

    #[async_trait]
    impl MetadataProvider for Fixed {
        fn supports(&self, url: &str) -> bool {
            url.starts_with("https://tracker.example/")
        }

        async fn resolve_broadcast_start(&self, _url: &str) -> Result<NaiveDateTime> {
            parse_timestamp("2024-02-03 00:01:31")
        }

        async fn resolve_broadcast_duration(&self, _url: &str) -> Result<u64> {
            Ok(120)
        }

        async fn resolve_identity(&self, url: &str) -> Result<BroadcastIdentity> {
            let start = self.resolve_broadcast_start(url).await?;
            BroadcastIdentity::new("camila", "43549753755", start)
        }
    }

    #[tokio::test]
    async fn usable_as_trait_object() {
        let provider: Box<dyn MetadataProvider> = Box::new(Fixed);
        let url = "https://tracker.example/camila/streams/43549753755";
        assert!(provider.supports(url));
        assert!(!provider.supports("https://elsewhere.example/"));

        let identity = provider.resolve_identity(url).await.unwrap();
        assert_eq!(identity.video_id(), "43549753755");
        assert_eq!(provider.resolve_broadcast_duration(url).await.unwrap(), 120);
    }
}
