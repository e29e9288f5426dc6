// src/mods/mod.rs

//! Mod metadata model
//!
//! A [`ModRecord`] is everything modloom knows about one mod directory. Its
//! identity is the canonical (lower-cased) package id; two records with the
//! same canonical id are never merged, they are reported as duplicates.

pub mod manifest;

pub use manifest::{parse, parse_with_origin};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Normalize a package identifier to its canonical form
pub fn canonical_id(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Where a mod came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModOrigin {
    /// Installed by hand into a local mods folder
    #[default]
    Local,
    /// Subscribed to or downloaded from a remote catalog
    Subscribed,
    /// Shipped with the application itself (base game and expansions)
    BuiltIn,
}

impl ModOrigin {
    pub fn label(self) -> &'static str {
        match self {
            ModOrigin::Local => "Local",
            ModOrigin::Subscribed => "Subscribed",
            ModOrigin::BuiltIn => "Built-in",
        }
    }
}

impl fmt::Display for ModOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A set of canonical package ids
///
/// Entries are normalized on insertion and iterate in sorted order, so
/// anything derived from them is independent of manifest ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdSet(BTreeSet<String>);

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an id, normalizing it first. Blank ids are ignored.
    pub fn insert(&mut self, raw: &str) -> bool {
        let id = canonical_id(raw);
        if id.is_empty() {
            return false;
        }
        self.0.insert(id)
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.0.contains(&canonical_id(raw))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for IdSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = IdSet::new();
        for id in iter {
            set.insert(id.as_ref());
        }
        set
    }
}

/// One discovered mod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModRecord {
    /// Lower-cased unique key
    pub canonical_id: String,

    pub display_name: String,
    pub author: String,
    pub description: String,
    pub url: String,

    /// Application versions the mod declares support for, in manifest order
    pub supported_versions: Vec<String>,

    /// Mods that must be active for this one to work
    pub dependencies: IdSet,
    /// This mod must load before these
    pub load_before: IdSet,
    /// This mod must load after these
    pub load_after: IdSet,
    /// Mods that must not be active alongside this one
    pub incompatible_with: IdSet,

    /// The mod's directory (the manifest's containing mod folder)
    pub source_path: PathBuf,
    pub origin: ModOrigin,

    pub is_valid: bool,
    pub error_detail: Option<String>,

    /// Remote catalog id, when the mod was subscribed or downloaded
    pub external_id: Option<u64>,
}

impl ModRecord {
    /// Create a valid record with fallback metadata
    pub fn new(canonical: impl AsRef<str>, source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let canonical_id = canonical_id(canonical.as_ref());
        let display_name = folder_name(&source_path).unwrap_or_else(|| canonical_id.clone());
        Self {
            canonical_id,
            display_name,
            author: UNKNOWN_AUTHOR.to_string(),
            description: String::new(),
            url: String::new(),
            supported_versions: Vec::new(),
            dependencies: IdSet::new(),
            load_before: IdSet::new(),
            load_after: IdSet::new(),
            incompatible_with: IdSet::new(),
            source_path,
            origin: ModOrigin::Local,
            is_valid: true,
            error_detail: None,
            external_id: None,
        }
    }

    /// Flag the record as degraded and record why
    pub fn mark_invalid(&mut self, detail: impl Into<String>) {
        self.is_valid = false;
        self.error_detail = Some(detail.into());
    }

    /// Name of the mod's directory, if it has one
    pub fn folder_name(&self) -> Option<String> {
        folder_name(&self.source_path)
    }

    pub fn is_subscribed(&self) -> bool {
        self.origin == ModOrigin::Subscribed
    }

    pub fn is_builtin(&self) -> bool {
        self.origin == ModOrigin::BuiltIn
    }
}

/// Author used when the manifest names none
pub const UNKNOWN_AUTHOR: &str = "Unknown";

pub(crate) fn folder_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
}

/// The user's intended load order
///
/// Records are shared with the registry they came from, so an activation
/// list is a cheap snapshot that can be handed to the sorter and the
/// analyzer at the same time.
#[derive(Debug, Clone, Default)]
pub struct ActivationList {
    entries: Vec<Arc<ModRecord>>,
}

impl ActivationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve ids against a registry, keeping the given order
    ///
    /// Returns the list together with the ids that the registry does not
    /// know about.
    pub fn from_ids<S: AsRef<str>>(
        registry: &crate::registry::ModRegistry,
        ids: &[S],
    ) -> (Self, Vec<String>) {
        let mut list = Self::new();
        let mut unresolved = Vec::new();
        for raw in ids {
            match registry.get(raw.as_ref()) {
                Some(record) => list.push(Arc::clone(record)),
                None => unresolved.push(canonical_id(raw.as_ref())),
            }
        }
        (list, unresolved)
    }

    pub fn push(&mut self, record: Arc<ModRecord>) {
        self.entries.push(record);
    }

    /// Insert at `index`, clamped to the end of the list
    pub fn insert(&mut self, index: usize, record: Arc<ModRecord>) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, record);
    }

    pub fn remove(&mut self, index: usize) -> Option<Arc<ModRecord>> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    pub fn move_up(&mut self, index: usize) {
        if index == 0 || index >= self.entries.len() {
            return;
        }
        self.entries.swap(index, index - 1);
    }

    pub fn move_down(&mut self, index: usize) {
        if index + 1 >= self.entries.len() {
            return;
        }
        self.entries.swap(index, index + 1);
    }

    /// Move the entry at `from` so that it ends up at `to`
    pub fn move_to(&mut self, from: usize, to: usize) {
        if from >= self.entries.len() {
            return;
        }
        let record = self.entries.remove(from);
        let to = to.min(self.entries.len());
        self.entries.insert(to, record);
    }

    /// Index of the first entry with this id
    pub fn position(&self, id: &str) -> Option<usize> {
        let id = canonical_id(id);
        self.entries.iter().position(|r| r.canonical_id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.canonical_id.clone()).collect()
    }

    pub fn records(&self) -> &[Arc<ModRecord>] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModRecord> {
        self.entries.iter().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<ModRecord> for ActivationList {
    fn from_iter<I: IntoIterator<Item = ModRecord>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(Arc::new).collect(),
        }
    }
}

impl FromIterator<Arc<ModRecord>> for ActivationList {
    fn from_iter<I: IntoIterator<Item = Arc<ModRecord>>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
