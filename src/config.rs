use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::{debug, info};
use serde::Deserialize;

use crate::viewer::ReaderSettings;

/// On-disk settings; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub auto_advance_ms: Option<u64>,
    pub show_controls_on_open: Option<bool>,
    #[serde(default)]
    pub window: WindowConfigFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WindowConfigFile {
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub maximized: Option<bool>,
}

/// Settings with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub reader: ReaderSettings,
    pub window: WindowConfig,
    pub open_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
    pub maximized: bool,
}

impl ConfigFile {
    /// Applies defaults to missing fields. `open_path` comes from the command line.
    pub fn resolve(self, open_path: Option<PathBuf>) -> Config {
        let defaults = ReaderSettings::default();
        let config = Config {
            reader: ReaderSettings {
                auto_advance: self
                    .auto_advance_ms
                    .filter(|ms| *ms > 0)
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.auto_advance),
                show_controls_on_open: self
                    .show_controls_on_open
                    .unwrap_or(defaults.show_controls_on_open),
            },
            window: WindowConfig {
                width: self.window.width.unwrap_or(1920.0),
                height: self.window.height.unwrap_or(1080.0),
                maximized: self.window.maximized.unwrap_or(true),
            },
            open_path,
        };
        info!(
            "config: resolved auto_advance={}ms, show_controls_on_open={}, \
             window={}x{} maximized={}",
            config.reader.auto_advance.as_millis(),
            config.reader.show_controls_on_open,
            config.window.width,
            config.window.height,
            config.window.maximized,
        );
        config
    }
}

fn config_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .or_else(|| std::env::var_os("APPDATA").map(PathBuf::from))?;
    Some(config_dir.join("manga_viewer").join("config.toml"))
}

/// Loads the config file, or defaults when there is none.
pub fn load_config() -> Result<ConfigFile> {
    let Some(path) = config_path() else {
        info!("config: no config directory available, using defaults");
        return Ok(ConfigFile::default());
    };
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            toml::from_str(&text).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow!("failed to read {}: {e}", path.display())),
    }
}
