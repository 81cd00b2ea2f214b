//! Configuration management for the yapnet server.
//!
//! This module handles loading, validation, and conversion of server configuration
//! from TOML files and command-line arguments.

use crate::cli::Args;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use yapnet_server::{AccessEntry, ChatConfig, ServerConfig};

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Chats created at startup
    #[serde(default = "default_chats")]
    pub chats: Vec<ChatSettings>,
}

/// Network, keepalive and queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Largest accepted inbound frame, in bytes
    pub max_frame_size: usize,
    /// Silence allowed before a connection is dropped, in milliseconds
    pub pong_timeout_ms: u64,
    /// Keepalive ping period in milliseconds; must be below `pong_timeout_ms`
    pub ping_period_ms: u64,
    /// Deadline for a single outbound write, in milliseconds
    pub write_timeout_ms: u64,
    /// Capacity of each connection's outbound mailbox
    pub mailbox_capacity: usize,
    /// Capacity of the shared inbound queue
    pub inbound_queue_capacity: usize,
    /// Replay chat history after every Welcome
    pub recap_on_welcome: bool,
    /// Messages per recap chunk
    pub recap_chunk_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            bind_address: defaults.bind_address.to_string(),
            max_frame_size: defaults.max_frame_size,
            pong_timeout_ms: defaults.pong_timeout.as_millis() as u64,
            ping_period_ms: defaults.ping_period.as_millis() as u64,
            write_timeout_ms: defaults.write_timeout.as_millis() as u64,
            mailbox_capacity: defaults.mailbox_capacity,
            inbound_queue_capacity: defaults.inbound_queue_capacity,
            recap_on_welcome: defaults.recap_on_welcome,
            recap_chunk_size: defaults.recap_chunk_size,
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// A chat and its access list.
///
/// Access entries are written as `"any"`, `"group:<name>"` or `"player:<uuid>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub name: String,
    #[serde(default)]
    pub access: Vec<String>,
}

fn default_chats() -> Vec<ChatSettings> {
    vec![ChatSettings {
        name: "general".to_string(),
        access: vec!["any".to_string()],
    }]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
            chats: default_chats(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the specified path
    /// and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded or default configuration and whether the file was just
    /// created, or an error if loading/creation failed. Runs before logging is
    /// set up, so reporting the creation is left to the caller.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<(Self, bool)> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok((config, false))
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            Ok((default_config, true))
        }
    }

    /// Applies command-line overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(listen) = &args.listen {
            self.server.bind_address = listen.clone();
        }
        if args.debug {
            self.logging.level = "debug".to_string();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        let limits = [
            ("max_frame_size", self.server.max_frame_size as u64),
            ("pong_timeout_ms", self.server.pong_timeout_ms),
            ("ping_period_ms", self.server.ping_period_ms),
            ("write_timeout_ms", self.server.write_timeout_ms),
            ("mailbox_capacity", self.server.mailbox_capacity as u64),
            ("inbound_queue_capacity", self.server.inbound_queue_capacity as u64),
            ("recap_chunk_size", self.server.recap_chunk_size as u64),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(format!("{name} must be greater than zero"));
        }

        if self.server.ping_period_ms >= self.server.pong_timeout_ms {
            return Err("ping_period_ms must be less than pong_timeout_ms".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        let mut names = HashSet::new();
        for chat in &self.chats {
            if chat.name.is_empty() {
                return Err("Chat name cannot be empty".to_string());
            }
            if !names.insert(chat.name.as_str()) {
                return Err(format!("Duplicate chat: {}", chat.name));
            }
            for entry in &chat.access {
                if let Err(e) = entry.parse::<AccessEntry>() {
                    return Err(format!("Chat '{}': {e}", chat.name));
                }
            }
        }

        Ok(())
    }

    /// Converts the application configuration to the server library's configuration.
    pub fn to_server_config(&self) -> anyhow::Result<ServerConfig> {
        let chats = self
            .chats
            .iter()
            .map(|chat| -> anyhow::Result<ChatConfig> {
                let access = chat
                    .access
                    .iter()
                    .map(|entry| entry.parse::<AccessEntry>())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ChatConfig::new(chat.name.as_str(), access))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_frame_size: self.server.max_frame_size,
            pong_timeout: Duration::from_millis(self.server.pong_timeout_ms),
            ping_period: Duration::from_millis(self.server.ping_period_ms),
            write_timeout: Duration::from_millis(self.server.write_timeout_ms),
            mailbox_capacity: self.server.mailbox_capacity,
            inbound_queue_capacity: self.server.inbound_queue_capacity,
            recap_on_welcome: self.server.recap_on_welcome,
            recap_chunk_size: self.server.recap_chunk_size,
            chats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use yapnet_server::{ChatId, GroupId};

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert_eq!(config.server.max_frame_size, 1024);
        assert_eq!(config.server.pong_timeout_ms, 10_000);
        assert_eq!(config.server.ping_period_ms, 9_000);
        assert_eq!(config.server.write_timeout_ms, 120_000);
        assert!(!config.server.recap_on_welcome);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.chats, default_chats());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_server_config() {
        let mut config = AppConfig::default();
        config.chats.push(ChatSettings {
            name: "staff".to_string(),
            access: vec!["group:staff".to_string()],
        });

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(server_config.ping_period, Duration::from_secs(9));
        assert_eq!(server_config.chats.len(), 2);
        assert_eq!(server_config.chats[1].name, ChatId::from("staff"));
        assert_eq!(
            server_config.chats[1].access,
            vec![AccessEntry::Group(GroupId::new("staff"))]
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.mailbox_capacity = 0;
        assert!(config.validate().unwrap_err().contains("mailbox_capacity"));

        let mut config = AppConfig::default();
        config.server.ping_period_ms = config.server.pong_timeout_ms;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chat_validation() {
        let mut config = AppConfig::default();
        config.chats.push(config.chats[0].clone());
        assert!(config.validate().unwrap_err().contains("Duplicate chat"));

        let mut config = AppConfig::default();
        config.chats[0].access.push("everyone".to_string());
        assert!(config.validate().is_err());
        assert!(config.to_server_config().is_err());
    }

    #[test]
    fn test_apply_args() {
        let mut config = AppConfig::default();
        let args = Args {
            listen: Some("0.0.0.0:9000".to_string()),
            debug: true,
            json_logs: true,
            ..Default::default()
        };
        config.apply_args(&args);

        assert_eq!(config.server.bind_address, "0.0.0.0:9000");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[tokio::test]
    async fn test_load_partial_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
bind_address = "0.0.0.0:4000"
recap_on_welcome = true

[[chats]]
name = "lobby"
access = ["any"]

[[chats]]
name = "ops"
access = ["group:ops"]
"#
        )
        .unwrap();

        let (config, created) = AppConfig::load_from_file(file.path()).await.unwrap();
        assert!(!created);
        assert_eq!(config.server.bind_address, "0.0.0.0:4000");
        assert!(config.server.recap_on_welcome);
        // Unset fields fall back to defaults.
        assert_eq!(config.server.max_frame_size, 1024);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.chats.len(), 2);
        assert_eq!(config.chats[1].name, "ops");
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let (config, created) = AppConfig::load_from_file(&path).await.unwrap();
        assert!(created);
        assert!(path.exists());
        assert_eq!(config.chats, default_chats());

        let (reloaded, created) = AppConfig::load_from_file(&path).await.unwrap();
        assert!(!created);
        assert_eq!(reloaded.server.bind_address, config.server.bind_address);
        assert_eq!(reloaded.chats, config.chats);
    }

    #[tokio::test]
    async fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "this is not toml = = =").unwrap();
        assert!(AppConfig::load_from_file(file.path()).await.is_err());
    }
}
