//! The fixed table of expert personas.
//!
//! The registry is built once at startup, either from the embedded
//! `builtin_experts.toml` or from the `[[experts]]` list in the user's config,
//! and is only ever read afterwards.

use crate::core::config::{Config, ExpertEntry};
use serde::Deserialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expert {
    pub code: String,
    pub label: String,
    pub system_instruction: String,
}

impl From<ExpertEntry> for Expert {
    fn from(entry: ExpertEntry) -> Self {
        Self {
            code: entry.code,
            label: entry.label,
            system_instruction: entry.system,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ExpertError {
    Empty,
    DuplicateCode(String),
    BlankCode,
}

impl fmt::Display for ExpertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpertError::Empty => write!(f, "expert table is empty"),
            ExpertError::DuplicateCode(code) => write!(f, "expert code '{code}' is defined twice"),
            ExpertError::BlankCode => write!(f, "expert code must not be blank"),
        }
    }
}

impl Error for ExpertError {}

#[derive(Deserialize)]
struct BuiltinExperts {
    experts: Vec<ExpertEntry>,
}

#[derive(Debug, Clone)]
pub struct ExpertRegistry {
    // Never empty; the first entry is the fallback.
    experts: Vec<Expert>,
}

impl ExpertRegistry {
    pub fn builtin() -> Self {
        const CONFIG_CONTENT: &str = include_str!("../builtin_experts.toml");

        let parsed: BuiltinExperts =
            toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_experts.toml");
        Self::from_entries(parsed.experts).expect("builtin_experts.toml must define valid experts")
    }

    pub fn from_entries(entries: Vec<ExpertEntry>) -> Result<Self, ExpertError> {
        if entries.is_empty() {
            return Err(ExpertError::Empty);
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.code.trim().is_empty() {
                return Err(ExpertError::BlankCode);
            }
            if !seen.insert(entry.code.as_str()) {
                return Err(ExpertError::DuplicateCode(entry.code.clone()));
            }
        }

        Ok(Self {
            experts: entries.into_iter().map(Expert::from).collect(),
        })
    }

    /// Uses the config's `[[experts]]` when present and valid, the built-in
    /// table otherwise.
    pub fn from_config(config: &Config) -> Self {
        if config.experts.is_empty() {
            return Self::builtin();
        }

        match Self::from_entries(config.experts.clone()) {
            Ok(registry) => registry,
            Err(err) => {
                warn!(error = %err, "ignoring configured experts; using built-in table");
                Self::builtin()
            }
        }
    }

    pub fn find(&self, code: &str) -> Option<&Expert> {
        self.experts.iter().find(|expert| expert.code == code)
    }

    /// Exact match, or the default expert when `code` is unknown.
    pub fn get(&self, code: &str) -> &Expert {
        self.find(code).unwrap_or_else(|| {
            let fallback = self.default_expert();
            debug!(code, fallback = %fallback.code, "unknown expert code");
            fallback
        })
    }

    pub fn default_expert(&self) -> &Expert {
        &self.experts[0]
    }

    /// `(code, label)` pairs in definition order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.experts
            .iter()
            .map(|expert| (expert.code.as_str(), expert.label.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Expert> {
        self.experts.iter()
    }

    pub fn len(&self) -> usize {
        self.experts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str) -> ExpertEntry {
        ExpertEntry {
            code: code.to_string(),
            label: format!("{code} | label"),
            system: format!("system for {code}"),
        }
    }

    #[test]
    fn builtin_table_has_a_and_b_in_order() {
        let registry = ExpertRegistry::builtin();
        let codes: Vec<&str> = registry.entries().map(|(code, _)| code).collect();
        assert_eq!(codes, vec!["A", "B"]);
        assert_eq!(registry.default_expert().code, "A");
        for expert in registry.iter() {
            assert!(!expert.label.is_empty());
            assert!(!expert.system_instruction.trim().is_empty());
        }
    }

    #[test]
    fn known_codes_return_exact_entry() {
        let registry = ExpertRegistry::builtin();
        assert_eq!(registry.get("A").code, "A");
        assert_eq!(registry.get("B").code, "B");
        assert_eq!(registry.get("B"), registry.find("B").unwrap());
    }

    #[test]
    fn unknown_codes_fall_back_to_first_entry() {
        let registry = ExpertRegistry::builtin();
        for code in ["", "Z", "a", "b", " A", "AB"] {
            assert_eq!(registry.get(code), registry.default_expert(), "code {code:?}");
            assert!(registry.find(code).is_none());
        }
    }

    #[test]
    fn configured_table_replaces_builtin() {
        let config = Config {
            experts: vec![entry("X"), entry("Y")],
            ..Config::default()
        };
        let registry = ExpertRegistry::from_config(&config);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.default_expert().code, "X");
        assert_eq!(registry.get("A").code, "X");
        assert_eq!(registry.get("Y").system_instruction, "system for Y");
    }

    #[test]
    fn invalid_configured_table_uses_builtin() {
        let config = Config {
            experts: vec![entry("X"), entry("X")],
            ..Config::default()
        };
        let registry = ExpertRegistry::from_config(&config);
        assert_eq!(registry.default_expert().code, "A");
    }

    #[test]
    fn from_entries_validates() {
        assert_eq!(
            ExpertRegistry::from_entries(Vec::new()).unwrap_err(),
            ExpertError::Empty
        );
        assert_eq!(
            ExpertRegistry::from_entries(vec![entry("A"), entry("A")]).unwrap_err(),
            ExpertError::DuplicateCode("A".to_string())
        );
        assert_eq!(
            ExpertRegistry::from_entries(vec![entry("  ")]).unwrap_err(),
            ExpertError::BlankCode
        );
    }
}
