//! Universe definitions and loading.
//!
//! Universes are declared in YAML (or JSON, which YAML accepts) as named,
//! ordered lists of timeline items.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::timeline::TimelineItem;

/// A named, ordered declaration of timeline items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    /// Short machine key (unique, no whitespace)
    pub key: String,

    /// Display name, also the name of the synchronized collection
    pub name: String,

    /// Items in intended viewing order
    #[serde(default)]
    pub items: Vec<TimelineItem>,
}

impl Universe {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: TimelineItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_items(mut self, items: impl IntoIterator<Item = TimelineItem>) -> Self {
        self.items.extend(items);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reason the key or name cannot be used, if any
    pub fn identity_problem(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("universe key cannot be empty".to_string());
        }
        if self.key.chars().any(char::is_whitespace) {
            return Some(format!("universe key '{}' contains whitespace", self.key));
        }
        if self.name.trim().is_empty() {
            return Some(format!("universe '{}' has an empty display name", self.key));
        }
        None
    }

    /// Hash of the declared triples in order (first 16 hex chars of SHA256)
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for item in &self.items {
            hasher.update(item.source.as_bytes());
            hasher.update([0u8]);
            hasher.update(item.id.as_bytes());
            hasher.update([0u8]);
            hasher.update(item.kind.as_bytes());
            hasher.update([b'\n']);
        }
        let result = hasher.finalize();
        hex::encode(&result[..8])
    }
}

/// Universe definitions file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseFile {
    #[serde(default)]
    pub version: Option<String>,

    pub universes: Vec<Universe>,
}

impl UniverseFile {
    /// Load definitions from a YAML or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read universes file: {}", path.display()))?;

        Self::from_yaml(&content)
            .with_context(|| format!("Failed to load universes from {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse universes YAML")
    }

    /// Structural checks that belong upstream of the engine
    pub fn validate(&self) -> Result<()> {
        let mut keys = HashSet::new();
        let mut names = HashSet::new();

        for universe in &self.universes {
            if let Some(problem) = universe.identity_problem() {
                anyhow::bail!(problem);
            }
            if !keys.insert(universe.key.as_str()) {
                anyhow::bail!("Duplicate universe key '{}'", universe.key);
            }
            if !names.insert(universe.name.as_str()) {
                anyhow::bail!(
                    "Universes '{}' share the collection name '{}'",
                    universe.key,
                    universe.name
                );
            }
        }

        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Universe> {
        self.universes.iter().find(|u| u.key == key)
    }
}
