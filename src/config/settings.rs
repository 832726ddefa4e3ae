use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub transfer: TransferSettings,

    #[serde(default)]
    pub shell: ShellSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub server: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Expected `SHA256:...` host key fingerprint, checked when set
    #[serde(default)]
    pub host_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    #[serde(default = "default_local_dir")]
    pub local_dir: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellSettings {
    #[serde(default = "default_prompt")]
    pub prompt: String,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default)]
    pub history_file: Option<String>,
}

// Default values
fn default_port() -> u16 {
    22
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_local_dir() -> String {
    ".".to_string()
}
fn default_chunk_size() -> usize {
    32 * 1024
}
fn default_prompt() -> String {
    "jtransfer> ".to_string()
}
fn default_history_limit() -> usize {
    50
}

impl Settings {
    /// Loads `config/default.*` (optional), then `path` when given, then
    /// `JTRANSFER__SECTION__KEY` environment variables.
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        Self::load(path, None)
    }

    /// Like `new`, but reads variables from `env` instead of the process
    /// environment when it is given.
    pub fn load(
        path: Option<&str>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("JTRANSFER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;
        config.try_deserialize()
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            server: None,
            username: None,
            password: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            host_fingerprint: None,
        }
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self { local_dir: default_local_dir(), chunk_size: default_chunk_size() }
    }
}

impl TransferSettings {
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            history_limit: default_history_limit(),
            history_file: None,
        }
    }
}

impl ShellSettings {
    pub fn effective_history_limit(&self) -> usize {
        self.history_limit.max(1)
    }

    // Falls back to $HOME/.jtransfer_history, or the current directory
    pub fn history_path(&self) -> PathBuf {
        if let Some(file) = &self.history_file {
            return PathBuf::from(file);
        }
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        home.join(".jtransfer_history")
    }
}
