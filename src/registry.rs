// src/registry.rs

//! Mod registry
//!
//! A [`ModRegistry`] is a snapshot of every mod found under a set of scan
//! roots. It is rebuilt from scratch by each [`ModRegistry::scan`] call and
//! never patched in place, so mods removed from disk between scans cannot
//! linger as stale entries.

use crate::mods::{self, canonical_id, ModOrigin, ModRecord};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Folder names that hold mod content rather than mods
const SKIP_FOLDERS: &[&str] = &[
    "about",
    "assemblies",
    "defs",
    "languages",
    "patches",
    "sounds",
    "textures",
    "source",
    "news",
    "common",
    "loadfolders",
    "1.0",
    "1.1",
    "1.2",
    "1.3",
    "1.4",
    "1.5",
    "1.6",
    "v1.0",
    "v1.1",
    "v1.2",
    "v1.3",
    "v1.4",
    "v1.5",
    "v1.6",
];

/// A directory whose immediate subdirectories are mods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRoot {
    pub path: PathBuf,
    /// Origin given to every mod found under this root
    pub origin: ModOrigin,
}

impl ScanRoot {
    pub fn new(path: impl Into<PathBuf>, origin: ModOrigin) -> Self {
        Self {
            path: path.into(),
            origin,
        }
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ModOrigin::Local)
    }

    pub fn subscribed(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ModOrigin::Subscribed)
    }

    pub fn builtin(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ModOrigin::BuiltIn)
    }
}

/// All discovered mods, indexed by canonical id and by directory
#[derive(Debug, Default)]
pub struct ModRegistry {
    /// Valid records in merge order, duplicates included
    records: Vec<Arc<ModRecord>>,
    /// Records whose manifest could not be read
    invalid: Vec<Arc<ModRecord>>,
    /// Later records whose id was already taken
    duplicates: Vec<Arc<ModRecord>>,
    by_id: HashMap<String, Arc<ModRecord>>,
    by_path: HashMap<PathBuf, Arc<ModRecord>>,
}

impl ModRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every root and build a fresh registry
    ///
    /// Roots are merged in the order given and, within a root, in sorted path
    /// order, so the first mod to claim an id is deterministic. Unreadable
    /// directories are logged and skipped.
    pub fn scan(roots: &[ScanRoot]) -> Self {
        let candidates: Vec<(PathBuf, ModOrigin)> = roots
            .iter()
            .flat_map(|root| {
                candidate_dirs(&root.path)
                    .into_iter()
                    .map(move |dir| (dir, root.origin))
            })
            .collect();

        debug!("Parsing {} mod directories", candidates.len());

        let parsed: Vec<ModRecord> = candidates
            .par_iter()
            .map(|(dir, origin)| mods::parse_with_origin(dir, *origin))
            .collect();

        let registry = Self::from_records(parsed);
        info!(
            "Scanned {} roots: {} mods, {} invalid, {} duplicate ids",
            roots.len(),
            registry.records.len(),
            registry.invalid.len(),
            registry.duplicates.len()
        );
        registry
    }

    /// Build a registry from already parsed records, in the given order
    pub fn from_records<I: IntoIterator<Item = ModRecord>>(records: I) -> Self {
        let mut registry = Self::new();
        for record in records {
            registry.merge(record);
        }
        registry
    }

    fn merge(&mut self, record: ModRecord) {
        let record = Arc::new(record);
        self.by_path
            .entry(record.source_path.clone())
            .or_insert_with(|| Arc::clone(&record));

        if !record.is_valid {
            self.invalid.push(record);
            return;
        }

        if let Some(existing) = self.by_id.get(&record.canonical_id) {
            warn!(
                "Duplicate mod id {}: {} and {}",
                record.canonical_id,
                existing.source_path.display(),
                record.source_path.display()
            );
            self.duplicates.push(Arc::clone(&record));
        } else {
            self.by_id
                .insert(record.canonical_id.clone(), Arc::clone(&record));
        }
        self.records.push(record);
    }

    /// Look up a mod by package id, ignoring case
    pub fn get(&self, id: &str) -> Option<&Arc<ModRecord>> {
        self.by_id.get(&canonical_id(id))
    }

    /// Look up a mod (valid or not) by its directory
    pub fn get_by_path(&self, path: &Path) -> Option<&Arc<ModRecord>> {
        self.by_path.get(path)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Valid records, duplicates included
    pub fn records(&self) -> &[Arc<ModRecord>] {
        &self.records
    }

    /// Records that could not be parsed
    pub fn invalid(&self) -> &[Arc<ModRecord>] {
        &self.invalid
    }

    /// Records that lost their id to an earlier record
    pub fn duplicates(&self) -> &[Arc<ModRecord>] {
        &self.duplicates
    }

    /// Sorted canonical ids of indexed mods
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.by_id.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Immediate subdirectories of `root` that look like mods, sorted by path
fn candidate_dirs(root: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read mod directory {}: {}", root.display(), e);
            return Vec::new();
        }
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", root.display(), e);
                continue;
            }
        };
        let path = entry.path();
        if !path.is_dir() || is_skipped(&entry.file_name().to_string_lossy()) {
            continue;
        }
        if mods::manifest::find_manifest(&path).is_none() {
            debug!("No manifest in {}, skipping", path.display());
            continue;
        }
        dirs.push(path);
    }
    dirs.sort();
    dirs
}

fn is_skipped(name: &str) -> bool {
    if name.starts_with('.') {
        return true;
    }
    let lower = name.to_lowercase();
    SKIP_FOLDERS.contains(&lower.as_str())
}
