//! `set` and `unset`: edit config.toml from the command line.
//!
//! Each key is served by a [`SettingHandler`]; [`SettingRegistry`] keeps them
//! in display order for the bare `expert-mode set` listing.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use crate::cli::AppContext;
use crate::core::config::{path_display, Config, SecretsBackend};
use crate::core::expert::ExpertRegistry;

#[derive(Debug)]
pub enum SettingError {
    UnknownKey(String),
    UnknownExpert { input: String },
    InvalidValue {
        key: &'static str,
        input: String,
        expected: &'static str,
    },
    MissingArgs {
        hint: &'static str,
        example: &'static str,
    },
    ConfigError(String),
}

impl SettingError {
    pub fn print(&self) {
        match self {
            SettingError::UnknownKey(key) => {
                eprintln!("❌ Unknown config key: {key}");
                eprintln!("   Run 'expert-mode set' to list available keys.");
            }
            SettingError::UnknownExpert { input } => {
                eprintln!(
                    "❌ Unknown expert: {input}. Run 'expert-mode experts' to list available experts."
                );
            }
            SettingError::InvalidValue {
                key,
                input,
                expected,
            } => {
                eprintln!("❌ Invalid value for {key}: {input}");
                eprintln!("   Expected {expected}");
            }
            SettingError::MissingArgs { hint, example } => {
                eprintln!("⚠️  {hint}");
                eprintln!("Example: {example}");
            }
            SettingError::ConfigError(msg) => {
                eprintln!("❌ Failed to save configuration: {msg}");
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => write!(f, "Unknown config key: {key}"),
            SettingError::UnknownExpert { input } => write!(f, "Unknown expert: {input}"),
            SettingError::InvalidValue { key, input, .. } => {
                write!(f, "Invalid value for {key}: {input}")
            }
            SettingError::MissingArgs { hint, .. } => write!(f, "{hint}"),
            SettingError::ConfigError(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl Error for SettingError {}

/// Read-only state a handler may validate against.
pub struct SetContext<'a> {
    pub experts: &'a ExpertRegistry,
}

pub trait SettingHandler: Send + Sync {
    fn key(&self) -> &'static str;

    /// Applies `args` to `config` and returns the confirmation message.
    fn set(
        &self,
        config: &mut Config,
        args: &[String],
        ctx: &SetContext<'_>,
    ) -> Result<String, SettingError>;

    fn unset(&self, config: &mut Config) -> String;

    /// One indented line for the settings listing.
    fn format(&self, config: &Config) -> String;
}

fn success_set(key: &str, value: &str) -> String {
    format!("✅ Set {key} to: {value}")
}

fn success_unset(key: &str) -> String {
    format!("✅ Unset {key} (will use default)")
}

fn require_value(
    args: &[String],
    hint: &'static str,
    example: &'static str,
) -> Result<String, SettingError> {
    let value = args.join(" ");
    if value.trim().is_empty() {
        return Err(SettingError::MissingArgs { hint, example });
    }
    Ok(value.trim().to_string())
}

struct ModelHandler;

impl SettingHandler for ModelHandler {
    fn key(&self) -> &'static str {
        "model"
    }

    fn set(
        &self,
        config: &mut Config,
        args: &[String],
        _ctx: &SetContext<'_>,
    ) -> Result<String, SettingError> {
        let model = require_value(
            args,
            "To set the model, specify its identifier:",
            "expert-mode set model gpt-4o-mini",
        )?;
        let message = success_set(self.key(), &model);
        config.model = Some(model);
        Ok(message)
    }

    fn unset(&self, config: &mut Config) -> String {
        config.model = None;
        success_unset(self.key())
    }

    fn format(&self, config: &Config) -> String {
        match &config.model {
            Some(model) => format!("  model: {model}"),
            None => format!("  model: {} (default)", config.model()),
        }
    }
}

struct TemperatureHandler;

impl SettingHandler for TemperatureHandler {
    fn key(&self) -> &'static str {
        "temperature"
    }

    fn set(
        &self,
        config: &mut Config,
        args: &[String],
        _ctx: &SetContext<'_>,
    ) -> Result<String, SettingError> {
        let input = require_value(
            args,
            "To set the temperature, specify a number:",
            "expert-mode set temperature 0.3",
        )?;
        let temperature = input
            .parse::<f32>()
            .ok()
            .filter(|value| (0.0..=2.0).contains(value))
            .ok_or_else(|| SettingError::InvalidValue {
                key: "temperature",
                input: input.clone(),
                expected: "a number between 0 and 2",
            })?;
        config.temperature = Some(temperature);
        Ok(success_set(self.key(), &temperature.to_string()))
    }

    fn unset(&self, config: &mut Config) -> String {
        config.temperature = None;
        success_unset(self.key())
    }

    fn format(&self, config: &Config) -> String {
        match config.temperature {
            Some(temperature) => format!("  temperature: {temperature}"),
            None => format!("  temperature: {} (default)", config.temperature()),
        }
    }
}

struct BaseUrlHandler;

impl SettingHandler for BaseUrlHandler {
    fn key(&self) -> &'static str {
        "base-url"
    }

    fn set(
        &self,
        config: &mut Config,
        args: &[String],
        _ctx: &SetContext<'_>,
    ) -> Result<String, SettingError> {
        let url = require_value(
            args,
            "To set the API base URL, specify it:",
            "expert-mode set base-url https://api.openai.com/v1",
        )?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SettingError::InvalidValue {
                key: "base-url",
                input: url,
                expected: "an http:// or https:// URL",
            });
        }
        let message = success_set(self.key(), &url);
        config.base_url = Some(url);
        Ok(message)
    }

    fn unset(&self, config: &mut Config) -> String {
        config.base_url = None;
        success_unset(self.key())
    }

    fn format(&self, config: &Config) -> String {
        match &config.base_url {
            Some(url) => format!("  base-url: {url}"),
            None => "  base-url: (unset)".to_string(),
        }
    }
}

struct RequestTimeoutHandler;

impl SettingHandler for RequestTimeoutHandler {
    fn key(&self) -> &'static str {
        "request-timeout"
    }

    fn set(
        &self,
        config: &mut Config,
        args: &[String],
        _ctx: &SetContext<'_>,
    ) -> Result<String, SettingError> {
        let input = require_value(
            args,
            "To set a request timeout, specify the number of seconds:",
            "expert-mode set request-timeout 60",
        )?;
        let secs = input
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| SettingError::InvalidValue {
                key: "request-timeout",
                input: input.clone(),
                expected: "a whole number of seconds greater than 0",
            })?;
        config.request_timeout_secs = Some(secs);
        Ok(success_set(self.key(), &format!("{secs}s")))
    }

    fn unset(&self, config: &mut Config) -> String {
        config.request_timeout_secs = None;
        success_unset(self.key())
    }

    fn format(&self, config: &Config) -> String {
        match config.request_timeout_secs {
            Some(secs) => format!("  request-timeout: {secs}s"),
            None => "  request-timeout: (unset)".to_string(),
        }
    }
}

struct SecretsBackendHandler;

impl SettingHandler for SecretsBackendHandler {
    fn key(&self) -> &'static str {
        "secrets-backend"
    }

    fn set(
        &self,
        config: &mut Config,
        args: &[String],
        _ctx: &SetContext<'_>,
    ) -> Result<String, SettingError> {
        let input = require_value(
            args,
            "To choose where the API key is stored, specify a backend:",
            "expert-mode set secrets-backend keyring",
        )?;
        let backend = SecretsBackend::parse(&input).ok_or_else(|| SettingError::InvalidValue {
            key: "secrets-backend",
            input: input.clone(),
            expected: "'file' or 'keyring'",
        })?;
        config.secrets_backend = backend;
        Ok(success_set(self.key(), backend.as_str()))
    }

    fn unset(&self, config: &mut Config) -> String {
        config.secrets_backend = SecretsBackend::default();
        success_unset(self.key())
    }

    fn format(&self, config: &Config) -> String {
        format!("  secrets-backend: {}", config.secrets_backend.as_str())
    }
}

struct SecretsPathHandler;

impl SettingHandler for SecretsPathHandler {
    fn key(&self) -> &'static str {
        "secrets-path"
    }

    fn set(
        &self,
        config: &mut Config,
        args: &[String],
        _ctx: &SetContext<'_>,
    ) -> Result<String, SettingError> {
        let path = require_value(
            args,
            "To move the secrets file, specify its path:",
            "expert-mode set secrets-path ~/.config/expert-mode/secrets.toml",
        )?;
        let path = PathBuf::from(path);
        let message = success_set(self.key(), &path_display(&path));
        config.secrets_path = Some(path);
        Ok(message)
    }

    fn unset(&self, config: &mut Config) -> String {
        config.secrets_path = None;
        success_unset(self.key())
    }

    fn format(&self, config: &Config) -> String {
        match &config.secrets_path {
            Some(path) => format!("  secrets-path: {}", path_display(path)),
            None => "  secrets-path: (unset)".to_string(),
        }
    }
}

struct DefaultExpertHandler;

impl SettingHandler for DefaultExpertHandler {
    fn key(&self) -> &'static str {
        "default-expert"
    }

    fn set(
        &self,
        config: &mut Config,
        args: &[String],
        ctx: &SetContext<'_>,
    ) -> Result<String, SettingError> {
        let input = require_value(
            args,
            "To set a default expert, specify its code:",
            "expert-mode set default-expert B",
        )?;
        let expert = ctx
            .experts
            .iter()
            .find(|expert| expert.code.eq_ignore_ascii_case(&input))
            .ok_or(SettingError::UnknownExpert { input })?;
        let message = success_set(self.key(), &expert.label);
        config.default_expert = Some(expert.code.clone());
        Ok(message)
    }

    fn unset(&self, config: &mut Config) -> String {
        config.default_expert = None;
        success_unset(self.key())
    }

    fn format(&self, config: &Config) -> String {
        match &config.default_expert {
            Some(code) => format!("  default-expert: {code}"),
            None => "  default-expert: (unset)".to_string(),
        }
    }
}

pub struct SettingRegistry {
    handlers: Vec<Box<dyn SettingHandler>>,
}

impl SettingRegistry {
    pub fn new() -> Self {
        Self {
            handlers: vec![
                Box::new(ModelHandler),
                Box::new(TemperatureHandler),
                Box::new(BaseUrlHandler),
                Box::new(RequestTimeoutHandler),
                Box::new(SecretsBackendHandler),
                Box::new(SecretsPathHandler),
                Box::new(DefaultExpertHandler),
            ],
        }
    }

    pub fn get(&self, key: &str) -> Option<&dyn SettingHandler> {
        self.handlers
            .iter()
            .find(|handler| handler.key() == key)
            .map(|handler| handler.as_ref())
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(|handler| handler.key())
    }

    pub fn set_value(
        &self,
        config: &mut Config,
        experts: &ExpertRegistry,
        key: &str,
        args: &[String],
    ) -> Result<String, SettingError> {
        let handler = self
            .get(key)
            .ok_or_else(|| SettingError::UnknownKey(key.to_string()))?;
        handler.set(config, args, &SetContext { experts })
    }

    pub fn unset_value(&self, config: &mut Config, key: &str) -> Result<String, SettingError> {
        let handler = self
            .get(key)
            .ok_or_else(|| SettingError::UnknownKey(key.to_string()))?;
        Ok(handler.unset(config))
    }

    pub fn format_settings(&self, config: &Config) -> String {
        let mut out = String::from("Current settings:\n");
        for handler in &self.handlers {
            out.push_str(&handler.format(config));
            out.push('\n');
        }
        out
    }
}

impl Default for SettingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn save(ctx: &AppContext, config: &Config) -> Result<(), SettingError> {
    config
        .save_to_path(&ctx.config_path)
        .map_err(|err| SettingError::ConfigError(err.to_string()))
}

fn exit_with(err: SettingError) -> ! {
    err.print();
    std::process::exit(err.exit_code());
}

pub fn run_set(
    ctx: &AppContext,
    key: Option<String>,
    value: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let registry = SettingRegistry::new();

    let Some(key) = key else {
        print!("{}", registry.format_settings(&ctx.config));
        println!("\nConfig file: {}", path_display(&ctx.config_path));
        return Ok(());
    };

    let mut config = ctx.config.clone();
    let message = registry
        .set_value(&mut config, &ctx.experts, &key, &value)
        .and_then(|message| save(ctx, &config).map(|()| message))
        .unwrap_or_else(|err| exit_with(err));
    println!("{message}");
    Ok(())
}

pub fn run_unset(ctx: &AppContext, key: &str) -> Result<(), Box<dyn Error>> {
    let registry = SettingRegistry::new();
    let mut config = ctx.config.clone();
    let message = registry
        .unset_value(&mut config, key)
        .and_then(|message| save(ctx, &config).map(|()| message))
        .unwrap_or_else(|err| exit_with(err));
    println!("{message}");
    Ok(())
}
