use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notifications::IconRef;

pub const DEFAULT_RESOURCES_PACKAGE: &str = "flagstage.resources";

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resources package `{0}` not found")]
    PackageNotFound(String),
}

/// Strings and icons the reminder is rendered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBundle {
    pub title: String,
    pub content: String,
    pub action_text: String,
    pub flag_icon: IconRef,
    pub restart_icon: IconRef,
}

impl ResourceBundle {
    /// Untranslated strings shipped with the default resources package.
    pub fn english(package: &str) -> Self {
        Self {
            title: "Flags staged".to_string(),
            content: "Restart your device to apply the staged flag changes.".to_string(),
            action_text: "Restart".to_string(),
            flag_icon: IconRef {
                package: package.to_string(),
                name: "ic_flag".to_string(),
            },
            restart_icon: IconRef {
                package: package.to_string(),
                name: "ic_restart".to_string(),
            },
        }
    }
}

/// Resolves the package holding reminder resources and loads bundles out of it.
pub trait ResourceResolver: Send + Sync {
    /// The installed resources package, if one can be found.
    fn resources_package_name(&self) -> Option<String>;
    fn load(&self, package: &str) -> Result<ResourceBundle, ResourceError>;
}

/// Which package the notifier reads its resources from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceLookup {
    Fixed(String),
    Discover,
}

impl Default for ResourceLookup {
    fn default() -> Self {
        ResourceLookup::Fixed(DEFAULT_RESOURCES_PACKAGE.to_string())
    }
}

/// Resolver over a fixed set of in-memory bundles.
#[derive(Debug, Clone, Default)]
pub struct StaticResources {
    bundles: HashMap<String, ResourceBundle>,
    discovered: Option<String>,
}

impl StaticResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the default package, with English strings, discoverable.
    pub fn builtin() -> Self {
        Self::new()
            .with_bundle(
                DEFAULT_RESOURCES_PACKAGE,
                ResourceBundle::english(DEFAULT_RESOURCES_PACKAGE),
            )
            .discoverable(DEFAULT_RESOURCES_PACKAGE)
    }

    pub fn with_bundle(mut self, package: impl Into<String>, bundle: ResourceBundle) -> Self {
        self.bundles.insert(package.into(), bundle);
        self
    }

    pub fn discoverable(mut self, package: impl Into<String>) -> Self {
        self.discovered = Some(package.into());
        self
    }
}

impl ResourceResolver for StaticResources {
    fn resources_package_name(&self) -> Option<String> {
        self.discovered.clone()
    }

    fn load(&self, package: &str) -> Result<ResourceBundle, ResourceError> {
        self.bundles
            .get(package)
            .cloned()
            .ok_or_else(|| ResourceError::PackageNotFound(package.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_resolves_default_package() {
        let resources = StaticResources::builtin();
        let package = resources.resources_package_name().unwrap();
        assert_eq!(package, DEFAULT_RESOURCES_PACKAGE);
        let bundle = resources.load(&package).unwrap();
        assert_eq!(bundle.restart_icon.name, "ic_restart");
        assert_eq!(bundle.flag_icon.package, DEFAULT_RESOURCES_PACKAGE);
    }

    #[test]
    fn unknown_package_is_not_found() {
        let err = StaticResources::new().load("missing.pkg").unwrap_err();
        assert!(matches!(err, ResourceError::PackageNotFound(ref p) if p == "missing.pkg"));
        assert_eq!(err.to_string(), "resources package `missing.pkg` not found");
    }

    #[test]
    fn lookup_mode_deserializes() {
        let fixed: ResourceLookup = serde_json::from_str(r#"{"fixed": "a.b"}"#).unwrap();
        assert_eq!(fixed, ResourceLookup::Fixed("a.b".into()));
        let discover: ResourceLookup = serde_json::from_str(r#""discover""#).unwrap();
        assert_eq!(discover, ResourceLookup::Discover);
    }
}
