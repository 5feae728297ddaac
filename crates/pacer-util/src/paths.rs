//! Default paths for budget-pacer components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/pacer/config.toml` or `~/.config/pacer/config.toml`
//! - Data: `$XDG_DATA_HOME/pacer` or `~/.local/share/pacer`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const PACER_CONFIG_ENV: &str = "PACER_CONFIG";

/// Environment variable for overriding the data directory; read by the
/// `pacerd` command line and taking precedence over the config file
pub const PACER_DATA_DIR_ENV: &str = "PACER_DATA_DIR";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Database filename within the data directory
pub const DATABASE_FILENAME: &str = "pacer.db";

/// Application subdirectory name
const APP_DIR: &str = "pacer";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$PACER_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/pacer/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/pacer/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(PACER_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the data directory used when neither the config file nor
/// `$PACER_DATA_DIR` names one.
///
/// Order of precedence:
/// 1. `$XDG_DATA_HOME/pacer` (if XDG_DATA_HOME is set)
/// 2. `~/.local/share/pacer` (fallback)
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_contains_app_dir() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("pacer"));
    }

    #[test]
    fn config_path_is_toml() {
        let path = default_config_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }
}
