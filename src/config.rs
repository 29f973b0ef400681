//! Configuration file loading for nodechat.
//!
//! # Configuration File
//!
//! The configuration file is located at `~/.nodechat/config.toml`:
//!
//! ```toml
//! # Outbound line terminator: "crlf" or "cr"
//! line_ending = "crlf"
//!
//! # Upper-case submitted lines before transmission
//! uppercase = false
//!
//! # Echo submitted lines into the transcript
//! local_echo = true
//!
//! # Send one "?" after the first unlock
//! auto_help = true
//!
//! # Forward Ctrl-Z to the node as a SUB byte
//! pass_ctrl_z = true
//! ctrl_z_eol = false
//!
//! # Input lock timing (milliseconds)
//! unlock_delay_ms = 1200
//! unlock_quiet_ms = 300
//!
//! [login]
//! username = "n0call"
//! password = "secret"
//! blind = false
//! ```
//!
//! Every key is optional; command-line flags override file values.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Outbound line terminator: "crlf" or "cr"
    pub line_ending: String,
    /// Upper-case submitted lines
    pub uppercase: bool,
    /// Echo submitted lines into the transcript
    pub local_echo: bool,
    /// Send one "?" after the first unlock
    pub auto_help: bool,
    /// Forward Ctrl-Z as a SUB byte instead of suspending
    pub pass_ctrl_z: bool,
    /// Append the line terminator after a forwarded SUB
    pub ctrl_z_eol: bool,
    /// Minimum lock duration after login completes
    pub unlock_delay_ms: u64,
    /// RX quiet period required by the early-unlock heuristic
    pub unlock_quiet_ms: u64,
    /// Stored login credentials
    pub login: LoginConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            line_ending: "crlf".to_string(),
            uppercase: false,
            local_echo: true,
            auto_help: true,
            pass_ctrl_z: true,
            ctrl_z_eol: false,
            unlock_delay_ms: 1200,
            unlock_quiet_ms: 300,
            login: LoginConfig::default(),
        }
    }
}

/// Login configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Send credentials on a timer instead of waiting for prompts
    pub blind: bool,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(config) = toml::from_str(&content) {
                        return config;
                    }
                }
            }
        }
        Self::default()
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        if let Some(home) = home_dir() {
            let dir = home.join(".nodechat");
            if !dir.exists() {
                let _ = fs::create_dir_all(&dir);
            }
            return Some(dir.join("config.toml"));
        }
        None
    }
}

/// Directory for the log file, created on demand.
pub fn log_dir() -> Option<PathBuf> {
    let dir = home_dir()?.join(".nodechat");
    if !dir.exists() {
        fs::create_dir_all(&dir).ok()?;
    }
    Some(dir)
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_missing_keys() {
        let config: Config = toml::from_str("uppercase = true").unwrap();
        assert!(config.uppercase);
        assert_eq!(config.line_ending, "crlf");
        assert!(config.local_echo);
        assert_eq!(config.unlock_delay_ms, 1200);
        assert_eq!(config.unlock_quiet_ms, 300);
        assert!(config.login.username.is_none());
    }

    #[test]
    fn login_table_parses() {
        let text = "[login]\nusername = \"n0call\"\npassword = \"pw\"\nblind = true\n";
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.login.username.as_deref(), Some("n0call"));
        assert_eq!(config.login.password.as_deref(), Some("pw"));
        assert!(config.login.blind);
    }
}
