//! Command-line flags.

use clap::Parser;
use std::path::PathBuf;

/// Scanner command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Photograph unauthenticated VNC servers found via Shodan", long_about = None)]
pub struct Args {
    /// Directory screenshots are dumped to (created if absent)
    #[arg(long, value_name = "DIR", default_value = "/tmp/vncdumps")]
    pub dumpdir: PathBuf,

    /// Log file location
    #[arg(long, value_name = "FILE", default_value = "vncsnap.log")]
    pub logfile: PathBuf,

    /// Shodan search query
    #[arg(
        long,
        value_name = "QUERY",
        default_value = "port:5901 authentication disabled"
    )]
    pub query: String,

    /// Result pages to retrieve in batch mode
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub pages: u32,

    /// Service port captures connect to
    #[arg(long, value_name = "PORT", default_value_t = 5901)]
    pub port: u16,

    /// Follow the live banner feed instead of fetching search pages
    #[arg(long)]
    pub stream: bool,

    /// Per-step capture timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Shodan API key
    #[arg(long, value_name = "KEY", env = "SHODAN_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable verbose logging (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_the_scan_profile() {
        let args = Args::try_parse_from(["vncsnap"]).unwrap();
        assert_eq!(args.dumpdir, PathBuf::from("/tmp/vncdumps"));
        assert_eq!(args.query, "port:5901 authentication disabled");
        assert_eq!(args.pages, 1);
        assert_eq!(args.port, 5901);
        assert_eq!(args.timeout_secs, 10);
        assert!(!args.stream);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "vncsnap",
            "--dumpdir",
            "/srv/shots",
            "--pages",
            "4",
            "--port",
            "5900",
            "--stream",
            "--timeout-secs",
            "3",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.dumpdir, PathBuf::from("/srv/shots"));
        assert_eq!(args.pages, 4);
        assert_eq!(args.port, 5900);
        assert!(args.stream);
        assert_eq!(args.timeout_secs, 3);
        assert_eq!(args.verbose, 2);
    }
}
