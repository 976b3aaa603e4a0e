//! Broadcast metadata from third-party Twitch trackers
//!
//! Resolves the start time and duration of a broadcast from TwitchTracker,
//! StreamsCharts and SullyGnome stream pages, and reads the SullyGnome CSV
//! exports bulk recovery runs on.

pub mod duration;
pub mod error;
pub mod export;
pub mod provider;
pub mod sites;

pub use error::{Result, TrackerError};
pub use export::{StreamRecord, SullyGnomeExport, merge_exports, read_export, read_export_as};
pub use provider::{TrackerBroadcast, TrackerConfig, TrackerMetadataProvider};
pub use sites::{TrackerSite, TrackerUrl};
