use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use vod_recovery::{ClipFormat, Quality};

#[derive(Parser, Debug)]
#[command(
    name = "vodr",
    author,
    version,
    about = "Recover unlisted Twitch VODs and clips from the CDN",
    long_about = "Rebuilds the CDN addresses of broadcasts that are no longer linked anywhere, \
                  probes which still exist, and repairs their playlists."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (defaults to <config dir>/vodr/config.toml)
    #[arg(short, long, global = true, env = "VODR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print results as JSON instead of human readable text
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory for manifests, clip logs and downloads
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Maximum concurrent existence checks
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

/// Selected clip naming families.
#[derive(ClapArgs, Debug, Clone)]
pub struct FormatArgs {
    /// Clip naming families to search
    #[arg(long = "format", value_delimiter = ',', default_values_t = ClipFormat::ALL.to_vec())]
    pub formats: Vec<ClipFormat>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Recover a VOD from its identity or a tracker page
    Vod {
        /// Streamer login name
        #[arg(short, long, required_unless_present = "url")]
        streamer: Option<String>,

        /// Numeric video (broadcast) id
        #[arg(long, required_unless_present = "url")]
        video_id: Option<String>,

        /// Broadcast start in UTC, "YYYY-MM-DD HH:MM:SS"
        #[arg(short, long, required_unless_present = "url")]
        timestamp: Option<String>,

        /// TwitchTracker, StreamsCharts or SullyGnome stream page
        #[arg(short, long, conflicts_with_all = ["streamer", "video_id", "timestamp"])]
        url: Option<String>,

        /// Rendition to report (best available when omitted)
        #[arg(long)]
        quality: Option<Quality>,

        /// Skip playlist post-processing
        #[arg(long)]
        no_process: bool,
    },

    /// Recover every VOD listed in a SullyGnome export
    VodBulk {
        /// SullyGnome "Twitch stream stats" CSV export
        csv: PathBuf,

        /// Streamer name, required when the export was renamed
        #[arg(short, long)]
        streamer: Option<String>,
    },

    /// Search every clip of a broadcast
    Clips {
        #[arg(short, long, required_unless_present = "url")]
        streamer: Option<String>,

        #[arg(long, required_unless_present = "url")]
        video_id: Option<String>,

        /// Broadcast length in minutes
        #[arg(short, long, required_unless_present = "url")]
        duration: Option<u64>,

        /// Tracker stream page to read streamer, video id and duration from
        #[arg(short, long, conflicts_with_all = ["streamer", "video_id", "duration"])]
        url: Option<String>,

        #[command(flatten)]
        formats: FormatArgs,

        /// Download found clips without asking
        #[arg(long)]
        download: bool,
    },

    /// Print a few random clips of a broadcast
    ClipsRandom {
        #[arg(long)]
        video_id: String,

        /// Broadcast length in minutes
        #[arg(short, long)]
        duration: u64,

        #[command(flatten)]
        formats: FormatArgs,

        /// Stop after this many clips
        #[arg(short, long, default_value_t = 3)]
        limit: usize,
    },

    /// Search clips of every broadcast in a SullyGnome export
    ClipsBulk {
        /// SullyGnome export; omit when merging a directory
        #[arg(required_unless_present = "merge_dir")]
        csv: Option<PathBuf>,

        /// Merge every export in this directory first
        #[arg(long, requires = "streamer", conflicts_with = "csv")]
        merge_dir: Option<PathBuf>,

        #[arg(short, long)]
        streamer: Option<String>,

        #[command(flatten)]
        formats: FormatArgs,

        /// Download found clips and remove their logs
        #[arg(long)]
        download: bool,
    },

    /// Rewrite the muted segments of a recovered playlist
    Unmute {
        /// Recovered index-dvr.m3u8 URL
        url: String,
    },

    /// Check which segments of a recovered playlist still exist
    Verify { url: String },

    /// Comment out the segments of a recovered playlist that no longer exist
    Mark { url: String },

    /// Transcode a recovered playlist to mp4 with ffmpeg
    Download {
        /// Playlist URL
        #[arg(long, required_unless_present = "file", conflicts_with = "file")]
        url: Option<String>,

        /// Local playlist file, e.g. VodRecovery_<streamer>_<id>.m3u8
        #[arg(long)]
        file: Option<PathBuf>,

        /// Output file name (derived from the playlist when omitted)
        #[arg(long)]
        output: Option<String>,

        /// Trim start, HH:MM:SS
        #[arg(long, requires = "end")]
        start: Option<String>,

        /// Trim end, HH:MM:SS
        #[arg(long, requires = "start")]
        end: Option<String>,

        /// ffmpeg binary
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: String,
    },

    /// Serve VOD recovery over HTTP
    Serve {
        /// Bind address, overrides the configuration
        #[arg(long)]
        bind: Option<String>,

        /// Port, overrides the configuration
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show or reset the configuration file
    Config {
        #[arg(long)]
        show: bool,

        #[arg(long, conflicts_with = "show")]
        reset: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_manual_vod() {
        let args = Args::try_parse_from([
            "vodr",
            "vod",
            "--streamer",
            "camila",
            "--video-id",
            "43549753755",
            "--timestamp",
            "2024-02-03 00:01:31",
            "--quality",
            "720p60",
            "--json",
        ])
        .unwrap();
        assert!(args.json);
        match args.command {
            Commands::Vod {
                streamer, quality, ..
            } => {
                assert_eq!(streamer.as_deref(), Some("camila"));
                assert_eq!(quality, Some(Quality::P720p60));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn vod_needs_identity_or_url() {
        assert!(Args::try_parse_from(["vodr", "vod", "--streamer", "camila"]).is_err());
        assert!(
            Args::try_parse_from([
                "vodr",
                "vod",
                "--url",
                "https://twitchtracker.com/camila/streams/1"
            ])
            .is_ok()
        );
    }

    #[test]
    fn clip_formats_default_to_all() {
        let args = Args::try_parse_from(["vodr", "clips-random", "--video-id", "1", "-d", "10"])
            .unwrap();
        let Commands::ClipsRandom { formats, limit, .. } = args.command else {
            panic!("expected clips-random");
        };
        assert_eq!(formats.formats, ClipFormat::ALL.to_vec());
        assert_eq!(limit, 3);

        let args = Args::try_parse_from([
            "vodr",
            "clips-random",
            "--video-id",
            "1",
            "-d",
            "10",
            "--format",
            "legacy,alternate",
        ])
        .unwrap();
        let Commands::ClipsRandom { formats, .. } = args.command else {
            panic!("expected clips-random");
        };
        assert_eq!(formats.formats, vec![ClipFormat::Legacy, ClipFormat::Alternate]);
    }

    #[test]
    fn trims_come_in_pairs() {
        assert!(
            Args::try_parse_from(["vodr", "download", "--url", "https://x/a.m3u8", "--start", "00:00:01"])
                .is_err()
        );
    }
}
