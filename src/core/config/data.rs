use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Where the primary secret store lives.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretsBackend {
    /// A TOML secrets file (`secrets.toml`).
    #[default]
    File,
    /// The platform keyring.
    Keyring,
}

impl SecretsBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Some(SecretsBackend::File),
            "keyring" => Some(SecretsBackend::Keyring),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SecretsBackend::File => "file",
            SecretsBackend::Keyring => "keyring",
        }
    }
}

/// An expert definition as written in the config file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExpertEntry {
    pub code: String,
    pub label: String,
    pub system: String,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Chat model identifier sent with every request
    pub model: Option<String>,
    /// Sampling temperature sent with every request
    pub temperature: Option<f32>,
    /// Base URL of the OpenAI-compatible API
    pub base_url: Option<String>,
    /// Abort requests that take longer than this many seconds
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub secrets_backend: SecretsBackend,
    /// Location of the TOML secrets file when `secrets_backend = "file"`
    pub secrets_path: Option<PathBuf>,
    /// Expert code preselected by the interactive form
    pub default_expert: Option<String>,
    /// Replaces the built-in expert table when non-empty
    #[serde(default)]
    pub experts: Vec<ExpertEntry>,
}

impl Config {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or(DEFAULT_MODEL)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// Config value first, then `OPENAI_BASE_URL`, then the public OpenAI endpoint.
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
