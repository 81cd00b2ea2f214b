//! Command-line argument parsing
//!
//! Flags given here override the matching settings from the configuration file.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the yapnet chat server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    ///
    /// If the file doesn't exist, a default configuration will be created.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Server listen address
    ///
    /// Format: "IP:PORT" (e.g., "127.0.0.1:8080" or "0.0.0.0:3000")
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.toml"),
            listen: None,
            debug: false,
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default() {
        let args = Args::default();
        assert_eq!(args.config, PathBuf::from("config.toml"));
        assert!(!args.debug);
        assert!(!args.json_logs);
        assert!(args.listen.is_none());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "yapnet",
            "--config",
            "chat.toml",
            "--listen",
            "0.0.0.0:9000",
            "--debug",
            "--json-logs",
        ]);
        assert_eq!(args.config, PathBuf::from("chat.toml"));
        assert_eq!(args.listen.as_deref(), Some("0.0.0.0:9000"));
        assert!(args.debug);
        assert!(args.json_logs);
    }
}
