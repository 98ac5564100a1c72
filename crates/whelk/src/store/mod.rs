//! In-memory project filesystem.
//!
//! [`FileStore`] owns everything an agent session mutates:
//!
//! - the path → [`VirtualFile`] mapping
//! - the error list reported by external validators
//! - the optional task [`Plan`]
//! - a bounded stack of snapshots for [`FileStore::rollback`]
//!
//! Dependencies are derived from `package.json` on demand (see [`manifest`]).
//! The store knows nothing about shell commands.

mod history;
pub mod manifest;
mod plan;
mod search;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::limits::ResourceLimits;

use history::{FileMap, History};

pub use history::Snapshot;
pub use manifest::{DependencyChange, MANIFEST_PATH};
pub use plan::{Plan, PlanTask, TaskStatus};
pub use search::{SearchMatch, SearchOptions, compile_lenient};

/// Errors returned by store operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// File not found
    #[error("No such file or directory: {0}")]
    NotFound(String),
    /// Path cannot be used as a file key
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// Text to replace was not present
    #[error("text to replace not found in {0}")]
    PatternNotFound(String),
    /// `package.json` (or a session document) could not be used
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
    /// No plan has been set
    #[error("no plan has been set")]
    NoPlan,
    /// Plan has no task with this id
    #[error("no task with id {0}")]
    TaskNotFound(String),
}

/// Source language of a file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// `.tsx`, `.jsx`
    Tsx,
    /// `.ts`, `.js`, `.mjs`, `.cjs`
    Ts,
    /// `.json`
    Json,
    /// `.css`
    Css,
    /// `.md` and anything unrecognized
    Md,
}

impl Language {
    /// Detect the language from a path's extension.
    pub fn from_path(path: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path);
        let ext = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
            _ => return Language::Md,
        };
        match ext.as_str() {
            "tsx" | "jsx" => Language::Tsx,
            "ts" | "js" | "mjs" | "cjs" => Language::Ts,
            "json" => Language::Json,
            "css" => Language::Css,
            _ => Language::Md,
        }
    }

    /// Short lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Tsx => "tsx",
            Language::Ts => "ts",
            Language::Json => "json",
            Language::Css => "css",
            Language::Md => "md",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualFile {
    /// Normalized path, the unique key
    pub path: String,
    /// Full text content
    pub content: String,
    /// Language derived from `path`
    pub language: Language,
    /// Time of the last write
    pub last_modified: DateTime<Utc>,
}

impl VirtualFile {
    /// Create a file stamped with the current time.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            language: Language::from_path(&path),
            path,
            content: content.into(),
            last_modified: Utc::now(),
        }
    }

    /// Content length in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Number of lines, counting a final unterminated line.
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}

/// Listing entry returned by [`FileStore::list_files`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File path
    pub path: String,
    /// Detected language
    pub language: Language,
    /// Size in bytes
    pub size: usize,
}

/// Result of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Whether the file did not exist before
    pub created: bool,
}

/// Normalize a user-supplied path into a store key.
///
/// Leading `./` and `/` are dropped, repeated separators collapse and `.`
/// segments vanish. Empty paths, trailing separators and `..` segments are
/// rejected.
pub fn normalize_path(path: &str) -> Result<String, StoreError> {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed.ends_with('/') || trimmed.contains('\0') {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(StoreError::InvalidPath(path.to_string())),
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segments.join("/"))
}

/// Normalize a directory operand; the root (`.`, `/`, `./`) becomes `""`.
pub fn normalize_dir(dir: &str) -> Result<String, StoreError> {
    let trimmed = dir.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        return Ok(String::new());
    }
    normalize_path(trimmed)
}

/// In-memory project filesystem with bounded undo.
#[derive(Debug, Clone)]
pub struct FileStore {
    files: Arc<FileMap>,
    errors: Vec<String>,
    plan: Option<Plan>,
    history: History,
    limits: ResourceLimits,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore {
    /// Create an empty store with default limits.
    pub fn new() -> Self {
        Self::with_limits(ResourceLimits::default())
    }

    /// Create an empty store with the given limits.
    pub fn with_limits(limits: ResourceLimits) -> Self {
        Self {
            files: Arc::new(FileMap::new()),
            errors: Vec::new(),
            plan: None,
            history: History::new(limits.history_depth),
            limits,
        }
    }

    /// Seed a store from `(path, content)` pairs. Seeding records no history.
    pub fn from_files<I, P, C>(files: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let mut store = Self::new();
        store.seed(files)?;
        Ok(store)
    }

    /// Replace all files without recording history.
    pub fn seed<I, P, C>(&mut self, files: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let mut map = FileMap::new();
        for (path, content) in files {
            let path = normalize_path(path.as_ref())?;
            map.insert(path.clone(), Arc::new(VirtualFile::new(path, content)));
        }
        self.files = Arc::new(map);
        self.history.clear();
        Ok(())
    }

    /// Limits this store was created with.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Look up a file.
    pub fn read_file(&self, path: &str) -> Option<&VirtualFile> {
        let path = normalize_path(path).ok()?;
        self.files.get(&path).map(|f| &**f)
    }

    /// Whether a file exists at `path`.
    pub fn exists(&self, path: &str) -> bool {
        self.read_file(path).is_some()
    }

    /// Whether any file lives under directory `dir` (the root always counts).
    pub fn is_dir(&self, dir: &str) -> bool {
        match normalize_dir(dir) {
            Ok(prefix) if prefix.is_empty() => true,
            Ok(prefix) => self.paths_under(&prefix).next().is_some(),
            Err(_) => false,
        }
    }

    /// Create or overwrite a file.
    pub fn write_file(&mut self, path: &str, content: &str) -> Result<WriteOutcome, StoreError> {
        let path = normalize_path(path)?;
        let created = !self.files.contains_key(&path);
        self.snapshot();
        let file = VirtualFile::new(path.clone(), content);
        Arc::make_mut(&mut self.files).insert(path, Arc::new(file));
        Ok(WriteOutcome { created })
    }

    /// Append to a file, creating it when absent.
    pub fn append_file(&mut self, path: &str, content: &str) -> Result<WriteOutcome, StoreError> {
        let existing = self
            .read_file(path)
            .map(|f| f.content.clone())
            .unwrap_or_default();
        let mut combined = existing;
        combined.push_str(content);
        self.write_file(path, &combined)
    }

    /// Delete a file.
    pub fn delete_file(&mut self, path: &str) -> Result<(), StoreError> {
        let key = normalize_path(path)?;
        if !self.files.contains_key(&key) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        self.snapshot();
        Arc::make_mut(&mut self.files).remove(&key);
        Ok(())
    }

    /// Move a file, replacing any file already at `to`.
    pub fn rename_file(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        let from_key = normalize_path(from)?;
        let to_key = normalize_path(to)?;
        let Some(file) = self.files.get(&from_key).cloned() else {
            return Err(StoreError::NotFound(from.to_string()));
        };
        if from_key == to_key {
            return Ok(());
        }
        self.snapshot();
        let files = Arc::make_mut(&mut self.files);
        files.remove(&from_key);
        let mut moved = VirtualFile::new(to_key.clone(), file.content.clone());
        moved.last_modified = file.last_modified;
        files.insert(to_key, Arc::new(moved));
        Ok(())
    }

    /// Replace the first occurrence of `old` with `new` in a file.
    pub fn patch_file(&mut self, path: &str, old: &str, new: &str) -> Result<(), StoreError> {
        let Some(file) = self.read_file(path) else {
            return Err(StoreError::NotFound(path.to_string()));
        };
        if old.is_empty() || !file.content.contains(old) {
            return Err(StoreError::PatternNotFound(path.to_string()));
        }
        let patched = file.content.replacen(old, new, 1);
        self.write_file(path, &patched)?;
        Ok(())
    }

    /// All files ordered by path.
    pub fn list_files(&self) -> Vec<FileEntry> {
        self.files
            .values()
            .map(|f| FileEntry {
                path: f.path.clone(),
                language: f.language,
                size: f.size(),
            })
            .collect()
    }

    /// Iterate files ordered by path.
    pub fn files(&self) -> impl Iterator<Item = &VirtualFile> {
        self.files.values().map(|f| &**f)
    }

    /// Iterate paths ordered lexically.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Paths inside directory `prefix` (a normalized dir, `""` for the root).
    pub fn paths_under<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.paths().filter(move |p| {
            prefix.is_empty()
                || p.strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the store has no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    // ==================== Errors ====================

    /// Errors reported against the project.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Replace the error list.
    pub fn set_errors(&mut self, errors: Vec<String>) {
        self.errors = errors;
    }

    /// Append one error.
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Remove all errors.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    // ==================== Plan ====================

    /// Replace the plan.
    pub fn set_plan(&mut self, tasks: Vec<PlanTask>) {
        self.plan = Some(Plan {
            tasks,
            created_at: Utc::now(),
        });
    }

    /// Current plan, if one has been set.
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Change the status of one task.
    pub fn update_task_status(&mut self, id: &str, status: TaskStatus) -> Result<(), StoreError> {
        let plan = self.plan.as_mut().ok_or(StoreError::NoPlan)?;
        let task = plan
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        task.status = status;
        Ok(())
    }

    // ==================== History ====================

    fn snapshot(&mut self) {
        self.history.push(Snapshot::capture(&self.files));
    }

    /// Restore the file mapping from before the most recent mutation.
    ///
    /// Returns `false` when there is nothing to restore.
    pub fn rollback(&mut self) -> bool {
        match self.history.pop() {
            Some(snapshot) => {
                self.files = snapshot.into_files();
                tracing::trace!("rolled back, {} snapshots left", self.history.len());
                true
            }
            None => false,
        }
    }

    /// Number of snapshots available to [`FileStore::rollback`].
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    // ==================== Serialization ====================

    /// Plain path → content mapping.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.files
            .iter()
            .map(|(path, file)| (path.clone(), file.content.clone()))
            .collect()
    }

    /// JSON object of path → content.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.files
                .iter()
                .map(|(path, file)| (path.clone(), serde_json::Value::String(file.content.clone())))
                .collect(),
        )
    }

    /// Build a store from a JSON object of path → content.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, StoreError> {
        Self::from_json_with_limits(value, ResourceLimits::default())
    }

    /// Build a store with custom limits from a JSON object of path → content.
    pub fn from_json_with_limits(
        value: &serde_json::Value,
        limits: ResourceLimits,
    ) -> Result<Self, StoreError> {
        let object = value.as_object().ok_or_else(|| {
            StoreError::InvalidManifest("session document is not an object".to_string())
        })?;
        let mut files = Vec::with_capacity(object.len());
        for (path, content) in object {
            let content = content.as_str().ok_or_else(|| {
                StoreError::InvalidManifest(format!("content of {path} is not a string"))
            })?;
            files.push((path.as_str(), content));
        }
        let mut store = Self::with_limits(limits);
        store.seed(files)?;
        Ok(store)
    }
}
