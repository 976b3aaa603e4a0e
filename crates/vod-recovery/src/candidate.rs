//! Deterministic enumeration of the CDN addresses a VOD may live at.

use chrono::Duration;
use sha1::{Digest, Sha1};

use crate::config::DomainList;
use crate::error::Result;
use crate::identity::BroadcastIdentity;

/// Seconds after the reported start that are tried. Absorbs the skew between
/// the metadata source's clock and the epoch embedded in the CDN path.
pub const SEARCH_WINDOW_SECS: i64 = 60;

/// Length of the hex digest prefix that leads every VOD path.
pub const HASH_PREFIX_LEN: usize = 20;

pub const MANIFEST_SUFFIX: &str = "/chunked/index-dvr.m3u8";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateUrl {
    pub domain_prefix: String,
    pub hash_prefix: String,
    pub base_string: String,
    pub full_url: String,
}

/// `{streamer}_{videoId}_{epochSeconds}`
pub fn base_string(streamer_name: &str, video_id: &str, epoch_seconds: i64) -> String {
    format!("{streamer_name}_{video_id}_{epoch_seconds}")
}

pub fn hash_prefix(base_string: &str) -> String {
    let digest = Sha1::digest(base_string.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_PREFIX_LEN);
    hex
}

pub struct CandidateAddressGenerator<'a> {
    domains: &'a DomainList,
}

impl<'a> CandidateAddressGenerator<'a> {
    pub fn new(domains: &'a DomainList) -> Self {
        Self { domains }
    }

    /// Every candidate for `identity`, second-major then domain order.
    ///
    /// Yields exactly `SEARCH_WINDOW_SECS * domains.len()` distinct URLs and
    /// is a pure function of its inputs.
    pub fn generate(&self, identity: &BroadcastIdentity) -> Result<Vec<CandidateUrl>> {
        self.domains.validate()?;

        let start = identity.start_utc();
        let mut candidates =
            Vec::with_capacity(SEARCH_WINDOW_SECS as usize * self.domains.len());

        for offset in 0..SEARCH_WINDOW_SECS {
            let epoch_seconds = (start + Duration::seconds(offset)).timestamp();
            let base = base_string(identity.streamer_name(), identity.video_id(), epoch_seconds);
            let hash = hash_prefix(&base);

            for domain in self.domains.iter() {
                candidates.push(CandidateUrl {
                    domain_prefix: domain.to_string(),
                    hash_prefix: hash.clone(),
                    full_url: format!("{domain}{hash}_{base}{MANIFEST_SUFFIX}"),
                    base_string: base.clone(),
                });
            }
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn identity() -> BroadcastIdentity {
        BroadcastIdentity::parse("camila", "43549753755", "2024-02-03 00:01:31").unwrap()
    }

    #[test]
    fn hash_prefix_is_sha1_hex() {
        // sha1("abc") = a9993e364706816aba3e25717850c26c9cd0d89d
        assert_eq!(hash_prefix("abc"), "a9993e364706816aba3e");
    }

    #[test]
    fn single_domain_scenario() {
        let domains = DomainList::new(vec!["https://vod-secure.twitch.tv/".to_string()]).unwrap();
        let candidates = CandidateAddressGenerator::new(&domains)
            .generate(&identity())
            .unwrap();

        assert_eq!(candidates.len(), 60);
        for (k, candidate) in candidates.iter().enumerate() {
            let base = format!("camila_43549753755_{}", 1_706_918_491 + k as i64);
            assert_eq!(candidate.base_string, base);
            assert_eq!(candidate.hash_prefix.len(), 20);
            assert!(candidate.hash_prefix.bytes().all(|b| b.is_ascii_hexdigit()));
            assert_eq!(
                candidate.full_url,
                format!(
                    "https://vod-secure.twitch.tv/{}_{}/chunked/index-dvr.m3u8",
                    hash_prefix(&base),
                    base
                )
            );
        }
    }

    #[test]
    fn yields_sixty_distinct_urls_per_domain() {
        let domains = DomainList::default();
        let candidates = CandidateAddressGenerator::new(&domains)
            .generate(&identity())
            .unwrap();

        let distinct: HashSet<_> = candidates.iter().map(|c| c.full_url.as_str()).collect();
        assert_eq!(candidates.len(), 60 * domains.len());
        assert_eq!(distinct.len(), candidates.len());
    }

    #[test]
    fn generation_is_deterministic() {
        let domains = DomainList::new(vec![
            "https://a.example/".to_string(),
            "https://b.example/".to_string(),
        ])
        .unwrap();
        let generator = CandidateAddressGenerator::new(&domains);
        assert_eq!(
            generator.generate(&identity()).unwrap(),
            generator.generate(&identity()).unwrap()
        );
    }
}
