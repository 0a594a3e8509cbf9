use crate::core::secrets::SecretStore;
use std::fmt;
use tracing::debug;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const API_KEY_PATH: &[&str] = &["OPENAI_API_KEY"];
pub const NESTED_API_KEY_PATH: &[&str] = &["openai", "api_key"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    PrimaryStore,
    Environment,
    Absent,
}

impl CredentialSource {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialSource::PrimaryStore => "secrets",
            CredentialSource::Environment => "env",
            CredentialSource::Absent => "missing",
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: Option<String>,
    pub source: CredentialSource,
}

impl Credential {
    pub fn absent() -> Self {
        Self {
            value: None,
            source: CredentialSource::Absent,
        }
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

// Keeps the key itself out of logs and panic messages.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .field("source", &self.source)
            .finish()
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String>>;

/// Finds the API key: secret store first (`OPENAI_API_KEY`, then
/// `openai.api_key`), then the environment.
pub struct CredentialResolver {
    store: Box<dyn SecretStore>,
    env: EnvLookup,
}

impl CredentialResolver {
    pub fn new(store: Box<dyn SecretStore>) -> Self {
        Self::with_env(store, |name| std::env::var(name).ok())
    }

    pub fn with_env<F>(store: Box<dyn SecretStore>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + 'static,
    {
        Self {
            store,
            env: Box::new(env),
        }
    }

    pub fn store(&self) -> &dyn SecretStore {
        self.store.as_ref()
    }

    pub fn resolve(&self) -> Credential {
        if let Some(value) = self.lookup_store() {
            return Credential {
                value: Some(value),
                source: CredentialSource::PrimaryStore,
            };
        }

        if let Some(value) = (self.env)(API_KEY_ENV).filter(|v| !v.is_empty()) {
            return Credential {
                value: Some(value),
                source: CredentialSource::Environment,
            };
        }

        Credential::absent()
    }

    fn lookup_store(&self) -> Option<String> {
        for path in [API_KEY_PATH, NESTED_API_KEY_PATH] {
            match self.store.lookup(path) {
                Ok(Some(value)) if !value.is_empty() => return Some(value),
                Ok(_) => continue,
                Err(err) => {
                    debug!(
                        store = %self.store.describe(),
                        error = %err,
                        "secret store lookup failed; trying the environment"
                    );
                    return None;
                }
            }
        }
        None
    }
}
