//! # Configuration Management Module
//!
//! Configuration for the chains subsystem: system identity, the session line the
//! local node answers on, where the chain catalog and user records live, and
//! logging.
//!
//! ## Configuration Structure
//!
//! - [`BbsConfig`] - System name, sysop, chain list presentation
//! - [`SessionConfig`] - Connection parameters handed to door programs
//! - [`StorageConfig`] - Data directory
//! - [`ChainsConfig`] - Chain catalog location
//! - [`LoggingConfig`] - Log level, log file and sysop log
//! - [`SerialConfig`] - Optional serial line for remote sessions
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chainbbs::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("BBS Name: {}", config.bbs.name);
//!     println!("Catalog: {}", config.catalog_path().display());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [bbs]
//! name = "My Chain BBS"
//! sysop = "sysop"
//! show_chain_usage = true
//! session_timeout = 60
//!
//! [session]
//! modem_speed = 38400
//! primary_port = 1
//! ansi = true
//! exclusive_transport = false
//!
//! [storage]
//! data_dir = "./data"
//!
//! [logging]
//! level = "info"
//! file = "chainbbs.log"
//! sysop_file = "sysop.log"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BbsConfig {
    pub name: String,
    pub sysop: String,
    /// Show the usage column in the compact chain list.
    #[serde(default = "default_true")]
    pub show_chain_usage: bool,
    pub session_timeout: u32, // minutes
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Connection speed reported to door programs (`%2`/`%4`).
    pub modem_speed: u32,
    /// Port number reported to door programs (`%3`).
    pub primary_port: u8,
    /// Whether the answering terminal understands ANSI.
    #[serde(default = "default_true")]
    pub ansi: bool,
    /// Close the session transport while a door runs so the door can open the
    /// line itself. Only meaningful for remote (serial) sessions.
    #[serde(default)]
    pub exclusive_transport: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChainsConfig {
    /// Override for the catalog path; defaults to `<data_dir>/chains.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    /// Receives records logged with target `sysop` (chain runs and the like).
    #[serde(default)]
    pub sysop_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial device answering remote callers, e.g. `/dev/ttyS0`.
    #[serde(default)]
    pub port: String,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: String::new(),
            baud_rate: 38400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bbs: BbsConfig,
    pub session: SessionConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub chains: ChainsConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub serial: SerialConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Resolved location of the chain catalog.
    pub fn catalog_path(&self) -> PathBuf {
        match &self.chains.catalog_file {
            Some(file) => PathBuf::from(file),
            None => PathBuf::from(&self.storage.data_dir).join("chains.json"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bbs: BbsConfig {
                name: "chainbbs Station".to_string(),
                sysop: "sysop".to_string(),
                show_chain_usage: true,
                session_timeout: 60,
            },
            session: SessionConfig {
                modem_speed: 38400,
                primary_port: 1,
                ansi: true,
                exclusive_transport: false,
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
            },
            chains: ChainsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("chainbbs.log".to_string()),
                sysop_file: Some("sysop.log".to_string()),
            },
            serial: SerialConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_lives_in_data_dir() {
        let config = Config::default();
        assert_eq!(config.catalog_path(), PathBuf::from("./data").join("chains.json"));

        let mut custom = Config::default();
        custom.chains.catalog_file = Some("/srv/bbs/chains.json".into());
        assert_eq!(custom.catalog_path(), PathBuf::from("/srv/bbs/chains.json"));
    }

    #[test]
    fn minimal_toml_fills_defaults() {
        let toml_src = r#"
            [bbs]
            name = "Test"
            sysop = "root"
            session_timeout = 30

            [session]
            modem_speed = 2400
            primary_port = 2

            [storage]
            data_dir = "/tmp/bbs"

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert!(config.bbs.show_chain_usage);
        assert!(config.session.ansi);
        assert!(!config.session.exclusive_transport);
        assert_eq!(config.session.modem_speed, 2400);
        assert!(config.chains.catalog_file.is_none());
        assert!(config.logging.file.is_none());
        assert_eq!(config.serial.baud_rate, 38400);
    }

    #[tokio::test]
    async fn create_default_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();
        Config::create_default(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded.bbs.name, "chainbbs Station");
        assert_eq!(loaded.logging.sysop_file.as_deref(), Some("sysop.log"));
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let err = Config::load("/definitely/not/here.toml").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
