// civic_zone_rust\src\configs.rs
//! 設定の読み込み・バリデーション
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf, time::Duration};
use thiserror::Error;

use crate::geometry::ValidationOptions;

/// アプリケーション設定全体
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Persisted authorities + zones (JSON).
    #[serde(default = "Config::default_state_path")]
    pub state_path: PathBuf,

    #[serde(default = "Config::default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub log_json: bool,

    /// Upper bound for one EXIF decode in async intake.
    #[serde(default = "Config::default_gps_timeout_ms")]
    pub gps_timeout_ms: u64,

    #[serde(default = "Config::default_check_self_intersection")]
    pub check_self_intersection: bool,
    #[serde(default = "Config::default_max_ring_vertices")]
    pub max_ring_vertices: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            state_path: Self::default_state_path(),
            log_filter: Self::default_log_filter(),
            log_json: false,
            gps_timeout_ms: Self::default_gps_timeout_ms(),
            check_self_intersection: Self::default_check_self_intersection(),
            max_ring_vertices: Self::default_max_ring_vertices(),
        }
    }
}

impl Config {
    fn default_state_path() -> PathBuf { PathBuf::from("zones.json") }
    fn default_log_filter() -> String { "info".into() }
    fn default_gps_timeout_ms() -> u64 { 2_000 }
    fn default_check_self_intersection() -> bool { true }
    fn default_max_ring_vertices() -> usize { 50_000 }

    /// TOML からロード。ファイルが無ければデフォルト値。
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let p = path.as_ref();
        let cfg = if p.exists() {
            let s = fs::read_to_string(p).map_err(|e| ConfigError::Io(p.display().to_string(), e))?;
            Self::from_toml_str(&s).map_err(|e| match e {
                ConfigError::Parse(_, msg) => ConfigError::Parse(p.display().to_string(), msg),
                other => other,
            })?
        } else {
            Config::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// TOML 文字列から (validate はしない)
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse("<inline>".into(), e.to_string()))
    }

    /// 制約チェック
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.state_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue("state_path cannot be empty".into()));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue("log_filter cannot be empty".into()));
        }
        if self.gps_timeout_ms == 0 || self.gps_timeout_ms > 60_000 {
            return Err(ConfigError::InvalidValue(format!(
                "gps_timeout_ms out of range (1..=60000): {}",
                self.gps_timeout_ms
            )));
        }
        if self.max_ring_vertices < 4 {
            return Err(ConfigError::InvalidValue(
                "max_ring_vertices must be >=4 (smallest closed ring)".into(),
            ));
        }
        Ok(())
    }

    pub fn gps_timeout(&self) -> Duration {
        Duration::from_millis(self.gps_timeout_ms)
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            check_self_intersection: self.check_self_intersection,
            max_ring_vertices: self.max_ring_vertices,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading `{0}`: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("Parse error in `{0}`: {1}")]
    Parse(String, String),
    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}
