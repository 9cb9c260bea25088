//! Configuration for Eclair
//!
//! Server connection settings, session parameters, and the TOML file that
//! groups them. Values are validated once on load; the core only ever sees
//! validated configs.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default values and accepted ranges
pub mod defaults {
    use std::ops::RangeInclusive;

    pub const TIMEOUT_SECS: u64 = 30;
    pub const TIMEOUT_RANGE: RangeInclusive<u64> = 1..=300;
    pub const RETRY_ATTEMPTS: u32 = 3;
    pub const RETRY_RANGE: RangeInclusive<u32> = 1..=10;
    pub const MODEL: &str = "us.anthropic.claude-3-7-sonnet-20250219-v1:0";
    pub const SYSTEM_PROMPT: &str = "You are a helpful assistant for testing MCP servers.";
    pub const MAX_CONTEXT_LENGTH: u32 = 100_000;
    pub const CONTEXT_RANGE: RangeInclusive<u32> = 1_000..=1_000_000;
}

fn default_timeout() -> u64 {
    defaults::TIMEOUT_SECS
}

fn default_retry_attempts() -> u32 {
    defaults::RETRY_ATTEMPTS
}

fn default_model() -> String {
    defaults::MODEL.to_string()
}

fn default_system_prompt() -> String {
    defaults::SYSTEM_PROMPT.to_string()
}

fn default_max_context_length() -> u32 {
    defaults::MAX_CONTEXT_LENGTH
}

/// How to launch and reach one MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConnectionConfig {
    /// Display name (filled from the table key when loaded from a file)
    #[serde(default)]
    pub name: String,
    /// Executable to spawn
    pub command: String,
    /// Command-line arguments
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Environment overrides layered on the inherited environment
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Per-handshake timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Number of connection attempts
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

impl ServerConnectionConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            command: command.into(),
            args: Vec::new(),
            description: String::new(),
            env: HashMap::new(),
            timeout: defaults::TIMEOUT_SECS,
            retry_attempts: defaults::RETRY_ATTEMPTS,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Handshake timeout as a `Duration`
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Name used in logs and messages, falling back to the command
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.command
        } else {
            &self.name
        }
    }

    /// Check ranges and normalize whitespace.
    ///
    /// Returns the cleaned-up config: trimmed command, trimmed args with
    /// blank entries dropped.
    pub fn validated(mut self) -> Result<Self> {
        self.command = self.command.trim().to_string();
        if self.command.is_empty() {
            return Err(Error::Config(format!(
                "server '{}': command cannot be empty",
                self.name
            )));
        }

        self.args = self
            .args
            .into_iter()
            .map(|arg| arg.trim().to_string())
            .filter(|arg| !arg.is_empty())
            .collect();

        check_range("timeout", &self.name, self.timeout, &defaults::TIMEOUT_RANGE)?;
        check_range(
            "retry_attempts",
            &self.name,
            self.retry_attempts,
            &defaults::RETRY_RANGE,
        )?;

        Ok(self)
    }
}

fn check_range<T>(field: &str, owner: &str, value: T, range: &RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "'{}': {} must be between {} and {} (got {})",
            owner,
            field,
            range.start(),
            range.end(),
            value
        )))
    }
}

/// Parameters for one conversational session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub server_name: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_max_context_length")]
    pub max_context_length: u32,
}

impl SessionConfig {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            max_context_length: defaults::MAX_CONTEXT_LENGTH,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_context_length(mut self, length: u32) -> Self {
        self.max_context_length = length;
        self
    }

    pub fn validated(mut self) -> Result<Self> {
        self.server_name = self.server_name.trim().to_string();
        if self.server_name.is_empty() {
            return Err(Error::Config("session: server name cannot be empty".to_string()));
        }
        check_range(
            "max_context_length",
            "session",
            self.max_context_length,
            &defaults::CONTEXT_RANGE,
        )?;
        Ok(self)
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Servers by name
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConnectionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_session: Option<SessionConfig>,
}

impl ConfigFile {
    /// Default config location (`<config dir>/eclair/config.toml`)
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("eclair").join("config.toml"))
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let parsed: ConfigFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        parsed.validated()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&content)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Validate every entry, filling server names from their table keys
    pub fn validated(self) -> Result<Self> {
        if self.servers.is_empty() {
            return Err(Error::Config(
                "At least one server must be configured".to_string(),
            ));
        }

        let mut servers = BTreeMap::new();
        for (key, mut server) in self.servers {
            if server.name.trim().is_empty() {
                server.name = key.clone();
            }
            servers.insert(key, server.validated()?);
        }

        let default_session = self
            .default_session
            .map(SessionConfig::validated)
            .transpose()?;

        Ok(Self {
            servers,
            default_session,
        })
    }

    pub fn get_server(&self, name: &str) -> Option<&ServerConnectionConfig> {
        self.servers.get(name)
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.servers.keys().map(|s| s.as_str()).collect()
    }

    /// Session config for `server_name`: the file's default session when it
    /// targets that server, otherwise built-in defaults.
    pub fn session_for(&self, server_name: &str) -> SessionConfig {
        match &self.default_session {
            Some(session) if session.server_name == server_name => session.clone(),
            _ => SessionConfig::new(server_name),
        }
    }
}
