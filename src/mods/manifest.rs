// src/mods/manifest.rs

//! Mod manifest (About.xml) parser
//!
//! [`parse`] is total: a missing directory, a missing manifest or malformed
//! markup all yield a [`ModRecord`] with `is_valid == false` and an error
//! detail, never an `Err`.

use super::{canonical_id, folder_name, IdSet, ModOrigin, ModRecord, UNKNOWN_AUTHOR};
use crate::error::Result;
use crate::xml::{self, Element};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Manifest locations relative to a mod directory, probed in order
pub const MANIFEST_CANDIDATES: [&str; 3] = ["About/About.xml", "About/about.xml", "about.xml"];

/// Sidecar file holding the remote catalog id
pub const EXTERNAL_ID_SIDECAR: &str = "About/PublishedFileId.txt";

/// Parent directory name that marks bundled content
const BUILTIN_PARENT: &str = "Data";

/// Prefix of identifiers synthesized for manifests that declare none
const SYNTHESIZED_PREFIX: &str = "unknown.";

/// One way of reading a text field out of a manifest root
type TextSource = fn(&Element) -> Option<String>;

/// One way of reading a list field out of a manifest root
type ListSource = fn(&Element) -> Vec<String>;

const IDENTIFIER_SOURCES: &[TextSource] = &[package_id_field, legacy_identifier_field];
const NAME_SOURCES: &[TextSource] = &[name_field];
const AUTHOR_SOURCES: &[TextSource] = &[author_field, authors_list_field];
const DESCRIPTION_SOURCES: &[TextSource] = &[description_field];
const URL_SOURCES: &[TextSource] = &[url_field];
const VERSION_SOURCES: &[ListSource] = &[supported_versions_field, target_version_field];

/// Parse a mod directory as a locally installed mod
pub fn parse(dir: &Path) -> ModRecord {
    parse_with_origin(dir, ModOrigin::Local)
}

/// Parse a mod directory, tagging it with the origin of its scan root
///
/// Directories whose parent is the application's `Data` folder are always
/// built-in; a catalog id upgrades a local mod to subscribed.
pub fn parse_with_origin(dir: &Path, origin: ModOrigin) -> ModRecord {
    let mut record = ModRecord::new(synthesized_id(dir), dir);
    record.origin = if is_builtin_dir(dir) {
        ModOrigin::BuiltIn
    } else {
        origin
    };

    match find_manifest(dir) {
        None => record.mark_invalid("manifest not found"),
        Some(path) => match read_manifest(&path) {
            Ok(root) => apply_manifest(&mut record, &root),
            Err(e) => {
                record.mark_invalid(format!("Failed to parse {}: {}", path.display(), e));
                record.display_name = folder_display_name(dir, &record.canonical_id);
            }
        },
    }

    if let Some(id) = detect_external_id(dir) {
        record.external_id = Some(id);
        if record.origin == ModOrigin::Local {
            record.origin = ModOrigin::Subscribed;
        }
    }

    if record.is_valid {
        debug!(
            "Parsed mod {} ({}) from {}",
            record.canonical_id,
            record.display_name,
            dir.display()
        );
    } else {
        warn!(
            "Degraded mod record for {}: {}",
            dir.display(),
            record.error_detail.as_deref().unwrap_or("unknown error")
        );
    }

    record
}

/// First existing manifest candidate inside `dir`
pub fn find_manifest(dir: &Path) -> Option<PathBuf> {
    MANIFEST_CANDIDATES
        .iter()
        .map(|rel| dir.join(rel))
        .find(|path| path.is_file())
}

/// Read, sanitize and parse a manifest file
fn read_manifest(path: &Path) -> Result<Element> {
    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    parse_manifest_str(&content)
}

/// Sanitize and parse manifest text into its root element
pub fn parse_manifest_str(content: &str) -> Result<Element> {
    let cleaned = xml::sanitize(content);
    xml::parse_document(&cleaned)
}

/// Populate a record from a parsed manifest root
pub fn apply_manifest(record: &mut ModRecord, root: &Element) {
    let folder = record.folder_name();

    if let Some(id) = first_text(IDENTIFIER_SOURCES, root) {
        record.canonical_id = canonical_id(&id);
    }

    record.display_name = first_text(NAME_SOURCES, root)
        .or(folder)
        .unwrap_or_else(|| record.canonical_id.clone());
    record.author = first_text(AUTHOR_SOURCES, root).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    record.description = first_text(DESCRIPTION_SOURCES, root).unwrap_or_default();
    record.url = first_text(URL_SOURCES, root).unwrap_or_default();
    record.supported_versions = first_list(VERSION_SOURCES, root);

    record.dependencies = id_list(root, "modDependencies");
    record.load_before = id_list(root, "loadBefore");
    record.load_after = id_list(root, "loadAfter");
    record.incompatible_with = id_list(root, "incompatibleWith");

    record.is_valid = true;
    record.error_detail = None;
}

fn first_text(sources: &[TextSource], root: &Element) -> Option<String> {
    sources
        .iter()
        .filter_map(|source| source(root))
        .find(|value| !value.is_empty())
}

fn first_list(sources: &[ListSource], root: &Element) -> Vec<String> {
    sources
        .iter()
        .map(|source| source(root))
        .find(|values| !values.is_empty())
        .unwrap_or_default()
}

fn package_id_field(root: &Element) -> Option<String> {
    root.child_text("packageId").map(str::to_string)
}

fn legacy_identifier_field(root: &Element) -> Option<String> {
    root.child_text("identifier").map(str::to_string)
}

fn name_field(root: &Element) -> Option<String> {
    root.child_text("name").map(str::to_string)
}

fn author_field(root: &Element) -> Option<String> {
    root.child_text("author").map(str::to_string)
}

fn authors_list_field(root: &Element) -> Option<String> {
    let names = text_list(root, "authors");
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

fn description_field(root: &Element) -> Option<String> {
    root.child_text("description").map(str::to_string)
}

fn url_field(root: &Element) -> Option<String> {
    root.child_text("url").map(str::to_string)
}

fn supported_versions_field(root: &Element) -> Vec<String> {
    text_list(root, "supportedVersions")
}

fn target_version_field(root: &Element) -> Vec<String> {
    root.child_text("targetVersion")
        .map(|v| vec![v.to_string()])
        .unwrap_or_default()
}

/// Plain `<li>` text entries under `tag`
fn text_list(root: &Element, tag: &str) -> Vec<String> {
    root.child(tag)
        .map(|parent| {
            parent
                .children_named("li")
                .filter(|li| !li.text.is_empty())
                .map(|li| li.text.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Package ids under `tag`, accepting both `<li>id</li>` and
/// `<li><packageId>id</packageId>...</li>` entries
fn id_list(root: &Element, tag: &str) -> IdSet {
    let mut ids = IdSet::new();
    if let Some(parent) = root.child(tag) {
        for li in parent.children_named("li") {
            if !li.text.is_empty() {
                ids.insert(&li.text);
            } else if let Some(nested) = li.child_text("packageId") {
                ids.insert(nested);
            }
        }
    }
    ids
}

/// Identifier used until (or unless) the manifest provides one
pub fn synthesized_id(dir: &Path) -> String {
    let folder = folder_name(dir).unwrap_or_default();
    format!(
        "{}{}",
        SYNTHESIZED_PREFIX,
        folder.to_lowercase().replace(' ', "_")
    )
}

fn folder_display_name(dir: &Path, fallback: &str) -> String {
    folder_name(dir).unwrap_or_else(|| fallback.to_string())
}

fn is_builtin_dir(dir: &Path) -> bool {
    dir.parent()
        .and_then(Path::file_name)
        .map(|name| name == BUILTIN_PARENT)
        .unwrap_or(false)
}

/// Remote catalog id from a numeric folder name or the sidecar file
pub fn detect_external_id(dir: &Path) -> Option<u64> {
    if let Some(id) = folder_name(dir).as_deref().and_then(parse_numeral) {
        return Some(id);
    }

    let sidecar = dir.join(EXTERNAL_ID_SIDECAR);
    match fs::read_to_string(&sidecar) {
        Ok(content) => parse_numeral(content.trim()),
        Err(_) => None,
    }
}

fn parse_numeral(value: &str) -> Option<u64> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
