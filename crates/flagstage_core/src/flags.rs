use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between namespace and flag name in a staged property key.
pub const KEY_SEPARATOR: char = '*';

/// Namespace the platform publishes staged flag values under.
pub const STAGED_NAMESPACE: &str = "staged";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagKeyError {
    #[error("missing `*` separator in `{0}`")]
    MissingSeparator(String),
    #[error("empty namespace in `{0}`")]
    EmptyNamespace(String),
    #[error("empty flag name in `{0}`")]
    EmptyFlag(String),
}

/// A `namespace*flag` key taken from a property change batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlagKey {
    pub namespace: String,
    pub flag: String,
}

impl FlagKey {
    /// Splits on the first separator. Any further separators stay in the flag name.
    pub fn parse(raw: &str) -> Result<Self, FlagKeyError> {
        let Some((namespace, flag)) = raw.split_once(KEY_SEPARATOR) else {
            return Err(FlagKeyError::MissingSeparator(raw.to_string()));
        };
        if namespace.is_empty() {
            return Err(FlagKeyError::EmptyNamespace(raw.to_string()));
        }
        if flag.is_empty() {
            return Err(FlagKeyError::EmptyFlag(raw.to_string()));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            flag: flag.to_string(),
        })
    }
}

impl fmt::Display for FlagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, KEY_SEPARATOR, self.flag)
    }
}

/// Flags known to need a reboot before a staged value takes effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StagedFlagSet {
    namespaces: HashMap<String, HashSet<String>>,
}

impl StagedFlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON object of the form `{ "namespace": ["flag", ...] }`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading staged flag set `{}`", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing staged flag set `{}`", path.display()))
    }

    pub fn insert(&mut self, namespace: impl Into<String>, flag: impl Into<String>) {
        self.namespaces
            .entry(namespace.into())
            .or_default()
            .insert(flag.into());
    }

    pub fn contains(&self, key: &FlagKey) -> bool {
        self.namespaces
            .get(&key.namespace)
            .map(|flags| flags.contains(&key.flag))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.values().all(HashSet::is_empty)
    }

    pub fn len(&self) -> usize {
        self.namespaces.values().map(HashSet::len).sum()
    }

    /// True when any key in the batch names a staged flag. Malformed keys are
    /// logged and skipped.
    pub fn contains_staged_changes<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> bool {
        for raw in keys {
            match FlagKey::parse(raw) {
                Ok(key) if self.contains(&key) => return true,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(key = raw, %err, "detected malformed staged flag");
                }
            }
        }
        false
    }
}

impl<N, F> FromIterator<(N, F)> for StagedFlagSet
where
    N: Into<String>,
    F: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, F)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (namespace, flag) in iter {
            set.insert(namespace, flag);
        }
        set
    }
}

/// One batch of changed properties. Values are carried but never inspected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    pub namespace: String,
    pub values: BTreeMap<String, String>,
}

impl Properties {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn staged(values: BTreeMap<String, String>) -> Self {
        Self {
            namespace: STAGED_NAMESPACE.to_string(),
            values,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged() -> StagedFlagSet {
        [("sys", "feature_x"), ("sys", "feature_y"), ("media", "codec2")]
            .into_iter()
            .collect()
    }

    #[test]
    fn parses_on_first_separator() {
        let key = FlagKey::parse("sys*feature_x").unwrap();
        assert_eq!(key.namespace, "sys");
        assert_eq!(key.flag, "feature_x");

        let nested = FlagKey::parse("sys*a*b").unwrap();
        assert_eq!(nested.flag, "a*b");
        assert_eq!(nested.to_string(), "sys*a*b");
    }

    #[test]
    fn rejects_malformed_keys() {
        assert_eq!(
            FlagKey::parse("bogus_key"),
            Err(FlagKeyError::MissingSeparator("bogus_key".into()))
        );
        assert_eq!(
            FlagKey::parse("*feature_x"),
            Err(FlagKeyError::EmptyNamespace("*feature_x".into()))
        );
        assert_eq!(
            FlagKey::parse("sys*"),
            Err(FlagKeyError::EmptyFlag("sys*".into()))
        );
        assert!(FlagKey::parse("*").is_err());
        assert!(FlagKey::parse("").is_err());
    }

    #[test]
    fn malformed_only_batches_never_match() {
        let set = staged();
        for key in ["", "*", "sys*", "*feature_x", "sysfeature_x"] {
            assert!(!set.contains_staged_changes([key]), "{key} should not match");
        }
    }

    #[test]
    fn any_staged_key_matches_the_batch() {
        let set = staged();
        assert!(set.contains_staged_changes(["bogus_key", "sys*feature_x"]));
        assert!(set.contains_staged_changes(["*", "media*codec2", "sys*"]));
        assert!(!set.contains_staged_changes(["sys*feature_z", "other*feature_x"]));
    }

    #[test]
    fn deserializes_namespace_map() {
        let set: StagedFlagSet =
            serde_json::from_str(r#"{"sys": ["feature_x"], "media": []}"#).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains(&FlagKey::parse("sys*feature_x").unwrap()));
        assert!(!set.contains(&FlagKey::parse("media*feature_x").unwrap()));
    }

    #[test]
    fn properties_expose_keys_only() {
        let props = Properties::new(STAGED_NAMESPACE)
            .with("sys*feature_x", "true")
            .with("bogus_key", "1");
        let keys: Vec<&str> = props.keys().collect();
        assert_eq!(keys, vec!["bogus_key", "sys*feature_x"]);
    }
}
