use serde::Serialize;

/// A third-party page that may still list the broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlternateLink {
    pub site: &'static str,
    pub url: String,
}

/// Lookup pages offered when no candidate on the configured domains answered.
pub fn alternate_links(streamer_name: &str, video_id: &str) -> Vec<AlternateLink> {
    vec![
        AlternateLink {
            site: "sullygnome",
            url: format!("https://sullygnome.com/channel/{streamer_name}/stream/{video_id}"),
        },
        AlternateLink {
            site: "twitchtracker",
            url: format!("https://twitchtracker.com/{streamer_name}/streams/{video_id}"),
        },
        AlternateLink {
            site: "streamscharts",
            url: format!("https://streamscharts.com/channels/{streamer_name}/streams/{video_id}"),
        },
    ]
}

/// StreamsCharts channel page listing every stream, useful to spot split broadcasts.
pub fn streamscharts_channel_streams(streamer_name: &str) -> String {
    format!("https://streamscharts.com/channels/{streamer_name}/streams")
}
