//! Dependency accessors backed by `package.json`.
//!
//! Dependencies are never stored separately: every read parses the
//! `dependencies` object of the manifest file, and every write rewrites it.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use super::{FileStore, StoreError};

/// Path of the project manifest.
pub const MANIFEST_PATH: &str = "package.json";

/// What `add_dependency` did to the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyChange {
    /// The package was not listed before
    Added,
    /// The package was listed with a different version
    Updated {
        /// Version that was replaced
        previous: String,
    },
    /// The package was already listed at this version; nothing was written
    Unchanged,
}

/// Extract `dependencies` from manifest text; invalid JSON yields nothing.
pub fn parse_dependencies(manifest: &str) -> BTreeMap<String, String> {
    let Ok(value) = serde_json::from_str::<Value>(manifest) else {
        return BTreeMap::new();
    };
    value
        .get("dependencies")
        .and_then(Value::as_object)
        .map(|deps| {
            deps.iter()
                .map(|(name, version)| {
                    let version = match version {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (name.clone(), version)
                })
                .collect()
        })
        .unwrap_or_default()
}

impl FileStore {
    /// Dependencies declared in `package.json`, empty when it is absent or invalid.
    pub fn dependencies(&self) -> BTreeMap<String, String> {
        self.read_file(MANIFEST_PATH)
            .map(|file| parse_dependencies(&file.content))
            .unwrap_or_default()
    }

    /// Add or update a dependency, creating a minimal manifest if needed.
    pub fn add_dependency(
        &mut self,
        name: &str,
        version: &str,
    ) -> Result<DependencyChange, StoreError> {
        let mut manifest = self.load_manifest()?;
        let deps = dependencies_mut(&mut manifest)?;

        let change = match deps.get(name) {
            Some(Value::String(existing)) if existing == version => DependencyChange::Unchanged,
            Some(existing) => DependencyChange::Updated {
                previous: existing.as_str().map_or_else(|| existing.to_string(), str::to_string),
            },
            None => DependencyChange::Added,
        };
        if change == DependencyChange::Unchanged {
            return Ok(change);
        }

        deps.insert(name.to_string(), Value::String(version.to_string()));
        sort_keys(deps);
        self.save_manifest(&manifest)?;
        Ok(change)
    }

    /// Remove a dependency. Returns whether it was listed.
    pub fn remove_dependency(&mut self, name: &str) -> Result<bool, StoreError> {
        if self.read_file(MANIFEST_PATH).is_none() {
            return Ok(false);
        }
        let mut manifest = self.load_manifest()?;
        let deps = dependencies_mut(&mut manifest)?;
        if deps.remove(name).is_none() {
            return Ok(false);
        }
        sort_keys(deps);
        self.save_manifest(&manifest)?;
        Ok(true)
    }

    fn load_manifest(&self) -> Result<Value, StoreError> {
        let Some(file) = self.read_file(MANIFEST_PATH) else {
            return Ok(json!({
                "name": "project",
                "version": "1.0.0",
                "dependencies": {},
            }));
        };
        let value: Value = serde_json::from_str(&file.content)
            .map_err(|e| StoreError::InvalidManifest(format!("{MANIFEST_PATH}: {e}")))?;
        if !value.is_object() {
            return Err(StoreError::InvalidManifest(format!(
                "{MANIFEST_PATH}: top level is not an object"
            )));
        }
        Ok(value)
    }

    fn save_manifest(&mut self, manifest: &Value) -> Result<(), StoreError> {
        let mut text = serde_json::to_string_pretty(manifest)
            .map_err(|e| StoreError::InvalidManifest(e.to_string()))?;
        text.push('\n');
        self.write_file(MANIFEST_PATH, &text)?;
        Ok(())
    }
}

fn dependencies_mut(manifest: &mut Value) -> Result<&mut Map<String, Value>, StoreError> {
    let root = manifest.as_object_mut().ok_or_else(|| {
        StoreError::InvalidManifest(format!("{MANIFEST_PATH}: top level is not an object"))
    })?;
    let deps = root
        .entry("dependencies")
        .or_insert_with(|| Value::Object(Map::new()));
    if !deps.is_object() {
        *deps = Value::Object(Map::new());
    }
    deps.as_object_mut().ok_or_else(|| {
        StoreError::InvalidManifest(format!("{MANIFEST_PATH}: dependencies is not an object"))
    })
}

fn sort_keys(map: &mut Map<String, Value>) {
    let mut entries: Vec<(String, Value)> = std::mem::take(map).into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    map.extend(entries);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dependencies() {
        let deps = parse_dependencies(
            r#"{"name": "app", "dependencies": {"react": "^18.2.0", "expo": "~50.0.0"}}"#,
        );
        assert_eq!(deps.len(), 2);
        assert_eq!(deps["react"], "^18.2.0");
    }

    #[test]
    fn test_parse_dependencies_invalid_json() {
        assert!(parse_dependencies("{ not json").is_empty());
        assert!(parse_dependencies(r#"{"name": "app"}"#).is_empty());
    }

    #[test]
    fn test_dependencies_without_manifest() {
        let store = FileStore::new();
        assert!(store.dependencies().is_empty());
    }

    #[test]
    fn test_add_dependency_creates_manifest() {
        let mut store = FileStore::new();

        let change = store.add_dependency("lodash", "latest").unwrap();

        assert_eq!(change, DependencyChange::Added);
        assert_eq!(store.dependencies()["lodash"], "latest");
        let manifest = store.read_file(MANIFEST_PATH).unwrap();
        assert!(manifest.content.contains("\"name\": \"project\""));
    }

    #[test]
    fn test_add_dependency_is_idempotent() {
        let mut store = FileStore::new();
        store.add_dependency("lodash", "4.17.21").unwrap();
        let history = store.history_len();

        let change = store.add_dependency("lodash", "4.17.21").unwrap();

        assert_eq!(change, DependencyChange::Unchanged);
        assert_eq!(store.history_len(), history);
        assert_eq!(store.dependencies().len(), 1);
    }

    #[test]
    fn test_add_dependency_updates_version() {
        let mut store = FileStore::new();
        store.add_dependency("react", "17.0.0").unwrap();

        let change = store.add_dependency("react", "18.2.0").unwrap();

        assert_eq!(
            change,
            DependencyChange::Updated {
                previous: "17.0.0".to_string()
            }
        );
        assert_eq!(store.dependencies()["react"], "18.2.0");
    }

    #[test]
    fn test_add_dependency_preserves_other_keys() {
        let mut store = FileStore::new();
        store
            .write_file(
                MANIFEST_PATH,
                r#"{"name": "my-app", "scripts": {"start": "expo start"}, "dependencies": {"react": "18.2.0"}}"#,
            )
            .unwrap();

        store.add_dependency("axios", "1.6.0").unwrap();

        let content = &store.read_file(MANIFEST_PATH).unwrap().content;
        let value: Value = serde_json::from_str(content).unwrap();
        assert_eq!(value["name"], "my-app");
        assert_eq!(value["scripts"]["start"], "expo start");
        let keys: Vec<&String> = value["dependencies"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["axios", "react"]);
    }

    #[test]
    fn test_add_dependency_invalid_manifest() {
        let mut store = FileStore::new();
        store.write_file(MANIFEST_PATH, "{ broken").unwrap();

        let result = store.add_dependency("lodash", "latest");
        assert!(matches!(result, Err(StoreError::InvalidManifest(_))));
    }

    #[test]
    fn test_remove_dependency() {
        let mut store = FileStore::new();
        store.add_dependency("lodash", "latest").unwrap();

        assert!(store.remove_dependency("lodash").unwrap());
        assert!(!store.remove_dependency("lodash").unwrap());
        assert!(store.dependencies().is_empty());
    }

    #[test]
    fn test_remove_dependency_without_manifest() {
        let mut store = FileStore::new();
        assert!(!store.remove_dependency("lodash").unwrap());
        assert!(store.read_file(MANIFEST_PATH).is_none());
    }
}
