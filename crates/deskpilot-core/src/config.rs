use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DeskpilotError, Result};

/// Top-level configuration for the Deskpilot daemon.
///
/// Loaded from `~/.deskpilot/config.toml` by default. Each section corresponds
/// to one running component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeskpilotConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub desktop: DesktopConfig,
}

impl DeskpilotConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DeskpilotConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Turn the scheduler off when no automation worker runs. Task files and
    /// scripted steps are dispatched through the queue, so without a worker a
    /// tick would wait on them forever. Returns `true` if the scheduler was
    /// disabled.
    pub fn disable_scheduler_without_worker(&mut self) -> bool {
        if self.scheduler.enabled && !self.dispatch.worker_enabled {
            self.scheduler.enabled = false;
            return true;
        }
        false
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DeskpilotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Interface the API server binds to.
    pub host: String,
    /// API server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            host: "127.0.0.1".to_string(),
            port: 9990,
        }
    }
}

/// Action dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Run the built-in automation worker against the headless desktop.
    /// Without it actions stay queued and the task scheduler cannot run.
    pub worker_enabled: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_enabled: true,
        }
    }
}

/// Task scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Whether the task scheduler loop runs at all.
    pub enabled: bool,
    /// Seconds between scheduler ticks.
    pub tick_interval_secs: u64,
    /// Directory on the desktop that task attachments are written into.
    pub upload_dir: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: 5,
            upload_dir: "Desktop".to_string(),
        }
    }
}

/// Headless desktop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    /// Root directory for file actions. Relative action paths resolve here
    /// and no action may escape it.
    pub root_dir: String,
    /// Virtual screen width in pixels.
    pub screen_width: u32,
    /// Virtual screen height in pixels.
    pub screen_height: u32,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            root_dir: "~/.deskpilot/desktop".to_string(),
            screen_width: 1280,
            screen_height: 960,
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").ok();
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").ok();
        if let Some(home) = home {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
