//! Application settings storage

use crate::error::{LauncherError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Folder name under %APPDATA%
pub const APP_DIR_NAME: &str = "LoLAccountLauncher";

/// Overrides the data directory (portable installs, tests)
pub const HOME_ENV_VAR: &str = "LOL_LAUNCHER_HOME";

const SETTINGS_FILE: &str = "settings.json";
const ACCOUNTS_FILE: &str = "accounts.db";

/// Default warm-up after launching the client, in milliseconds
pub const DEFAULT_LAUNCH_DELAY_MS: u64 = 3000;

/// Where the Riot Client installer puts the launcher, relative to Program Files
const RIOT_CLIENT_RELATIVE: &str = "Riot Games/Riot Client/RiotClientServices.exe";
const RIOT_CLIENT_DEFAULT: &str = "C:/Riot Games/Riot Client/RiotClientServices.exe";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    /// User-chosen path to RiotClientServices.exe, tried before the defaults
    #[serde(default)]
    pub riot_client_path: Option<PathBuf>,
    #[serde(default = "default_launch_delay_ms")]
    pub launch_delay_ms: u64,
}

fn default_launch_delay_ms() -> u64 {
    DEFAULT_LAUNCH_DELAY_MS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            riot_client_path: None,
            launch_delay_ms: DEFAULT_LAUNCH_DELAY_MS,
        }
    }
}

impl AppConfig {
    pub fn launch_delay(&self) -> Duration {
        Duration::from_millis(self.launch_delay_ms)
    }

    /// Executables to try, in order: the override first, then the install defaults
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(ref custom) = self.riot_client_path {
            if !custom.as_os_str().is_empty() {
                paths.push(custom.clone());
            }
        }

        paths.push(PathBuf::from(RIOT_CLIENT_DEFAULT));
        for var in ["ProgramFiles", "ProgramFiles(x86)"] {
            if let Ok(dir) = std::env::var(var) {
                paths.push(PathBuf::from(dir).join(RIOT_CLIENT_RELATIVE));
            }
        }

        paths
    }
}

/// Per-user data directory, created on first use
pub fn data_dir() -> Result<PathBuf> {
    let base = match std::env::var_os(HOME_ENV_VAR) {
        Some(home) => PathBuf::from(home),
        None => {
            let app_data = std::env::var_os("APPDATA")
                .ok_or_else(|| LauncherError::ConfigError("APPDATA not found".to_string()))?;
            PathBuf::from(app_data).join(APP_DIR_NAME)
        }
    };

    if !base.exists() {
        fs::create_dir_all(&base).map_err(|e| LauncherError::ConfigError(e.to_string()))?;
    }

    Ok(base)
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(SETTINGS_FILE))
}

pub fn accounts_db_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(ACCOUNTS_FILE))
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&settings_path()?)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(&settings_path()?, config)
}

/// Missing or malformed file means defaults; an unreadable one is an error
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| LauncherError::ConfigError(e.to_string()))?;

    match serde_json::from_str(&content) {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!("Ignoring malformed {}: {}", path.display(), e);
            Ok(AppConfig::default())
        }
    }
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| LauncherError::ConfigError(e.to_string()))?;

    fs::write(path, content).map_err(|e| LauncherError::ConfigError(e.to_string()))
}
