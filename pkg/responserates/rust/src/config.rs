// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::Deserialize;

use crate::errors::ConfigError;
use crate::store::PoolSettings;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/response-rates/config.yaml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub chart: ChartConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

/// Connection pool knobs. The pool holds `pool_size` connections and may
/// temporarily open `max_overflow` more.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub pool_size: usize,
    pub max_overflow: usize,
    pub pool_timeout_secs: u64,
    pub pool_recycle_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// TrueType font for chart text. System fonts are tried when unset.
    pub font: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            chart: ChartConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/response-rates/response_rates.db"),
            pool_size: 5,
            max_overflow: 2,
            pool_timeout_secs: 30,
            pool_recycle_secs: 1800,
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            font: None,
            width: 1200,
            height: 600,
        }
    }
}

impl DatabaseConfig {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            path: self.path.clone(),
            pool_size: self.pool_size,
            max_overflow: self.max_overflow,
            timeout: Duration::from_secs(self.pool_timeout_secs),
            recycle: Duration::from_secs(self.pool_recycle_secs),
        }
    }
}

impl Config {
    pub fn log_level(&self) -> log::Level {
        parse_log_level(&self.log_level)
    }
}

/// Loads the YAML config file if it exists, then applies environment overrides.
/// A missing file is not an error; a malformed one is.
pub fn load_config(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));

    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        }
    } else {
        warn!(
            "Config file not found at {}. Using defaults and environment variables.",
            path.display()
        );
        Config::default()
    };

    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Environment variables take precedence over the file.
fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Some(level) = env_var("RR_LOG_LEVEL").or_else(|| env_var("LOG_LEVEL")) {
        config.log_level = level;
    }
    if let Some(address) = env_var("RR_BIND_ADDRESS") {
        config.server.bind_address = address;
    }
    if let Some(port) = env_var("RR_PORT") {
        config.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
            key: "RR_PORT",
            value: port,
        })?;
    }
    if let Some(path) = env_var("RR_DATABASE_PATH") {
        info!("database path overridden by RR_DATABASE_PATH");
        config.database.path = PathBuf::from(path);
    }
    if let Some(font) = env_var("RR_CHART_FONT") {
        config.chart.font = Some(PathBuf::from(font));
    }
    Ok(())
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Unknown levels silently default to Info.
fn parse_log_level(level: &str) -> log::Level {
    match level.to_lowercase().as_str() {
        "trace" => log::Level::Trace,
        "debug" => log::Level::Debug,
        "info" => log::Level::Info,
        "warn" | "warning" => log::Level::Warn,
        "error" | "critical" | "off" => log::Level::Error,
        _ => log::Level::Info,
    }
}
