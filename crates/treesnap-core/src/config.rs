//! Persistent configuration for treesnap.
//!
//! Stores capture settings in `~/.treesnap/config.json`. Every field has a
//! default, so a missing or partial file is fine; command-line flags are
//! applied on top by the caller.
//!
//! # Example
//!
//! ```no_run
//! use treesnap_core::config::CaptureConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = CaptureConfig::load();
//! println!("snapshots go to {}", config.output_path.display());
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::{CaptureLimits, IndexMode};

const CONFIG_FILENAME: &str = "config.json";
const SNAPSHOT_FILENAME: &str = "ui_tree.json";

/// Returns the treesnap state directory (`~/.treesnap/`).
///
/// Only resolves the path; the directory is created by [`CaptureConfig::save`]
/// and [`CaptureConfig::prepare_output_dir`]. Falls back to the current
/// directory when no home directory is known.
pub fn treesnap_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".treesnap")
}

fn default_output_path() -> PathBuf {
    treesnap_dir().join(SNAPSHOT_FILENAME)
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_idle_timeout_ms() -> u64 {
    10_000
}

/// Settings for one capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Where the snapshot is written. Replaced on every capture.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Index given to the root snapshot.
    #[serde(default)]
    pub root_index: usize,

    #[serde(default)]
    pub index_mode: IndexMode,

    #[serde(default)]
    pub limits: CaptureLimits,

    /// Pause after the UI reports idle, before the walk starts.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// How long to wait for the UI to report idle.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Indent the written JSON.
    #[serde(default)]
    pub pretty: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            root_index: 0,
            index_mode: IndexMode::default(),
            limits: CaptureLimits::default(),
            settle_delay_ms: default_settle_delay_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            pretty: false,
        }
    }
}

impl CaptureConfig {
    /// Load config from `~/.treesnap/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(treesnap_dir().join(CONFIG_FILENAME))
    }

    /// Load config from an explicit path, with the same fallback as [`load`](Self::load).
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(path = %path.as_ref().display(), error = %e, "ignoring unparsable config");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save config to `~/.treesnap/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(treesnap_dir().join(CONFIG_FILENAME))
    }

    /// Save config to an explicit path, creating its parent directory.
    pub fn save_to(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
    }

    /// Creates `~/.treesnap/` when snapshots go to the default location.
    ///
    /// Any other destination directory must already exist; a missing one is
    /// reported by the write itself.
    pub fn prepare_output_dir(&self) -> std::io::Result<()> {
        if self.output_path == default_output_path() {
            std::fs::create_dir_all(treesnap_dir())?;
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_values() {
        let config = CaptureConfig::default();
        assert_eq!(config.root_index, 0);
        assert_eq!(config.index_mode, IndexMode::SiblingLocal);
        assert_eq!(config.limits, CaptureLimits::default());
        assert_eq!(config.settle_delay(), Duration::from_secs(1));
        assert_eq!(config.idle_timeout(), Duration::from_secs(10));
        assert!(config.output_path.ends_with("ui_tree.json"));
        assert!(!config.pretty);
    }

    #[test]
    fn deserialize_partial_json_fills_defaults() {
        let loaded: CaptureConfig =
            serde_json::from_str(r#"{"index_mode": "global", "limits": {"max_depth": 64}}"#)
                .unwrap();
        assert_eq!(loaded.index_mode, IndexMode::Global);
        assert_eq!(loaded.limits.max_depth, Some(64));
        assert_eq!(loaded.limits.max_nodes, None);
        assert_eq!(loaded.settle_delay_ms, 1000);
    }

    #[test]
    fn roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = CaptureConfig {
            output_path: PathBuf::from("/sdcard/autojs_ui_tree.json"),
            root_index: 3,
            settle_delay_ms: 0,
            pretty: true,
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(CaptureConfig::load_from(&path), config);
    }

    #[test]
    fn save_creates_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        CaptureConfig::default().save_to(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn custom_output_dir_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let config = CaptureConfig {
            output_path: dir.path().join("missing").join("ui_tree.json"),
            ..Default::default()
        };

        config.prepare_output_dir().unwrap();
        assert!(!dir.path().join("missing").exists());
    }

    #[test]
    fn load_falls_back_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let loaded = CaptureConfig::load_from(&path);
        assert_eq!(loaded.settle_delay_ms, 1000);
        assert!(CaptureConfig::load_from(dir.path().join("absent.json")).output_path.ends_with("ui_tree.json"));
    }
}
