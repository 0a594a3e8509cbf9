//! Structured secret stores consulted before the process environment.
//!
//! Secrets are addressed by a path of keys, so `["openai", "api_key"]`
//! matches an `[openai]` table with an `api_key` entry in the TOML file, or
//! the keyring account `openai.api_key`.

use crate::core::config::data::path_display;
use crate::core::config::{config_dir, write_atomically, Config, SecretsBackend};
use crate::core::keyring::{KeyringAccessError, KEYRING_SERVICE};
use keyring::Entry;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::PathBuf;

pub const SECRETS_PATH_ENV: &str = "EXPERT_MODE_SECRETS";

#[derive(Debug)]
pub enum SecretStoreError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Write {
        path: PathBuf,
        source: Box<dyn Error>,
    },
    Keyring(KeyringAccessError),
    Unavailable(String),
}

impl fmt::Display for SecretStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretStoreError::Read { path, source } => {
                write!(f, "Failed to read secrets at {}: {}", path_display(path), source)
            }
            SecretStoreError::Parse { path, source } => {
                write!(f, "Failed to parse secrets at {}: {}", path_display(path), source)
            }
            SecretStoreError::Write { path, source } => {
                write!(f, "Failed to write secrets at {}: {}", path_display(path), source)
            }
            SecretStoreError::Keyring(err) => write!(f, "Keyring access failed: {err}"),
            SecretStoreError::Unavailable(reason) => write!(f, "Secret store unavailable: {reason}"),
        }
    }
}

impl Error for SecretStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SecretStoreError::Read { source, .. } => Some(source),
            SecretStoreError::Parse { source, .. } => Some(source),
            SecretStoreError::Write { source, .. } => Some(source.as_ref()),
            SecretStoreError::Keyring(err) => Some(err),
            SecretStoreError::Unavailable(_) => None,
        }
    }
}

impl From<KeyringAccessError> for SecretStoreError {
    fn from(err: KeyringAccessError) -> Self {
        SecretStoreError::Keyring(err)
    }
}

pub trait SecretStore {
    /// Short name used in logs and status output.
    fn describe(&self) -> String;

    /// Looks up a string secret. `Ok(None)` means the key is not present.
    fn lookup(&self, path: &[&str]) -> Result<Option<String>, SecretStoreError>;

    fn store(&self, path: &[&str], value: &str) -> Result<(), SecretStoreError>;

    /// Returns whether anything was removed.
    fn remove(&self, path: &[&str]) -> Result<bool, SecretStoreError>;
}

/// Builds the store selected by `secrets_backend`.
pub fn open_store(config: &Config) -> Box<dyn SecretStore> {
    match config.secrets_backend {
        SecretsBackend::Keyring => Box::new(KeyringSecretStore::new()),
        SecretsBackend::File => match secrets_path(config) {
            Some(path) => Box::new(TomlSecretStore::new(path)),
            None => Box::new(UnavailableStore::new("no config directory for secrets.toml")),
        },
    }
}

/// `EXPERT_MODE_SECRETS`, then `secrets_path` from the config, then
/// `secrets.toml` next to the config file.
pub fn secrets_path(config: &Config) -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(SECRETS_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    if let Some(path) = &config.secrets_path {
        return Some(path.clone());
    }
    config_dir().ok().map(|dir| dir.join("secrets.toml"))
}

/// A TOML file such as:
///
/// ```toml
/// OPENAI_API_KEY = "sk-..."
///
/// [openai]
/// api_key = "sk-..."
/// ```
///
/// The file is read on every lookup; a missing file is an empty store.
pub struct TomlSecretStore {
    path: PathBuf,
}

impl TomlSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_table(&self) -> Result<toml::Table, SecretStoreError> {
        if !self.path.exists() {
            return Ok(toml::Table::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|source| SecretStoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        contents
            .parse::<toml::Table>()
            .map_err(|source| SecretStoreError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    fn write_table(&self, table: &toml::Table) -> Result<(), SecretStoreError> {
        let write_err = |source: Box<dyn Error>| SecretStoreError::Write {
            path: self.path.clone(),
            source,
        };
        let contents = toml::to_string_pretty(table).map_err(|err| write_err(Box::new(err)))?;
        write_atomically(&self.path, contents.as_bytes()).map_err(write_err)
    }
}

impl SecretStore for TomlSecretStore {
    fn describe(&self) -> String {
        path_display(&self.path)
    }

    fn lookup(&self, path: &[&str]) -> Result<Option<String>, SecretStoreError> {
        let table = self.read_table()?;
        let Some((last, parents)) = path.split_last() else {
            return Ok(None);
        };

        let mut current = &table;
        for key in parents {
            match current.get(*key).and_then(toml::Value::as_table) {
                Some(nested) => current = nested,
                None => return Ok(None),
            }
        }

        Ok(current
            .get(*last)
            .and_then(toml::Value::as_str)
            .map(str::to_string))
    }

    fn store(&self, path: &[&str], value: &str) -> Result<(), SecretStoreError> {
        let Some((last, parents)) = path.split_last() else {
            return Ok(());
        };
        let mut table = self.read_table()?;

        let mut current = &mut table;
        for key in parents {
            let entry = current
                .entry(key.to_string())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            if !entry.is_table() {
                *entry = toml::Value::Table(toml::Table::new());
            }
            current = match entry {
                toml::Value::Table(nested) => nested,
                _ => unreachable!("entry was just replaced with a table"),
            };
        }
        current.insert(last.to_string(), toml::Value::String(value.to_string()));

        self.write_table(&table)
    }

    fn remove(&self, path: &[&str]) -> Result<bool, SecretStoreError> {
        let Some((last, parents)) = path.split_last() else {
            return Ok(false);
        };
        if !self.path.exists() {
            return Ok(false);
        }
        let mut table = self.read_table()?;

        let mut current = &mut table;
        for key in parents {
            match current.get_mut(*key).and_then(toml::Value::as_table_mut) {
                Some(nested) => current = nested,
                None => return Ok(false),
            }
        }

        if current.remove(*last).is_none() {
            return Ok(false);
        }
        self.write_table(&table)?;
        Ok(true)
    }
}

/// Platform keyring, one account per dotted secret path.
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    fn entry(&self, path: &[&str]) -> Result<Entry, SecretStoreError> {
        Entry::new(&self.service, &path.join("."))
            .map_err(|err| SecretStoreError::Keyring(KeyringAccessError::from(err)))
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeyringSecretStore {
    fn describe(&self) -> String {
        format!("keyring service '{}'", self.service)
    }

    fn lookup(&self, path: &[&str]) -> Result<Option<String>, SecretStoreError> {
        match self.entry(path)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(KeyringAccessError::from(err).into()),
        }
    }

    fn store(&self, path: &[&str], value: &str) -> Result<(), SecretStoreError> {
        self.entry(path)?
            .set_password(value)
            .map_err(|err| KeyringAccessError::from(err).into())
    }

    fn remove(&self, path: &[&str]) -> Result<bool, SecretStoreError> {
        match self.entry(path)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(KeyringAccessError::from(err).into()),
        }
    }
}

/// Stand-in used when no store location can be determined. Every lookup fails,
/// which the credential resolver treats as "not found".
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> SecretStoreError {
        SecretStoreError::Unavailable(self.reason.clone())
    }
}

impl SecretStore for UnavailableStore {
    fn describe(&self) -> String {
        "unavailable".to_string()
    }

    fn lookup(&self, _path: &[&str]) -> Result<Option<String>, SecretStoreError> {
        Err(self.error())
    }

    fn store(&self, _path: &[&str], _value: &str) -> Result<(), SecretStoreError> {
        Err(self.error())
    }

    fn remove(&self, _path: &[&str]) -> Result<bool, SecretStoreError> {
        Err(self.error())
    }
}
