// src/import/mod.rs

//! Modlist import
//!
//! Reads an ordered list of mods from the files other mod managers and the
//! game itself produce:
//! - ModsConfig.xml: the game's own activation file
//! - XML modlists: `<mod>`, `<li>`, `<item>` or `<entry>` elements
//! - JSON modlists: arrays of ids or objects, or an object wrapping one
//! - Plain text: one package id per line, `#` and `//` comments
//! - Workshop id lists: numeric ids or workshop page URLs

pub mod json;
pub mod text;
pub mod xml;

use crate::error::{Error, Result};
use crate::mods::canonical_id;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Shortest numeral accepted as a workshop id
pub const MIN_WORKSHOP_ID_LEN: usize = 7;

/// Lines inspected when sniffing a text file
const SNIFF_LINES: usize = 10;

/// Recognized modlist formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportFormat {
    ModsConfig,
    XmlList,
    Json,
    PlainText,
    WorkshopIds,
}

impl fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImportFormat::ModsConfig => "ModsConfig.xml",
            ImportFormat::XmlList => "XML modlist",
            ImportFormat::Json => "JSON modlist",
            ImportFormat::PlainText => "plain text (package ids)",
            ImportFormat::WorkshopIds => "workshop ids",
        };
        f.write_str(label)
    }
}

/// What a modlist file contained
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub format: ImportFormat,
    /// Canonical package ids, in file order, without repeats
    pub package_ids: Vec<String>,
    /// Workshop ids, in file order, without repeats
    pub workshop_ids: Vec<String>,
    /// Display names the file gave for package ids
    pub mod_names: BTreeMap<String, String>,
    /// Entries that were skipped
    pub warnings: Vec<String>,
    #[serde(skip)]
    seen_packages: HashSet<String>,
    #[serde(skip)]
    seen_workshop: HashSet<String>,
}

impl ImportResult {
    pub fn new(format: ImportFormat) -> Self {
        Self {
            format,
            package_ids: Vec::new(),
            workshop_ids: Vec::new(),
            mod_names: BTreeMap::new(),
            warnings: Vec::new(),
            seen_packages: HashSet::new(),
            seen_workshop: HashSet::new(),
        }
    }

    /// Record a package id; returns its canonical form
    pub fn push_package(&mut self, raw: &str) -> Option<String> {
        let id = canonical_id(raw);
        if id.is_empty() {
            return None;
        }
        if self.seen_packages.insert(id.clone()) {
            self.package_ids.push(id.clone());
        }
        Some(id)
    }

    pub fn push_workshop(&mut self, raw: &str) {
        let id = raw.trim();
        if is_workshop_id(id) && self.seen_workshop.insert(id.to_string()) {
            self.workshop_ids.push(id.to_string());
        }
    }

    pub fn set_name(&mut self, package_id: &str, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.mod_names.insert(canonical_id(package_id), name.to_string());
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.package_ids.is_empty() && self.workshop_ids.is_empty()
    }

    /// Fail when nothing usable was found
    pub(crate) fn require_mods(self) -> Result<Self> {
        if self.is_empty() {
            return Err(Error::ImportError(format!(
                "no valid mods found in {}",
                self.format
            )));
        }
        Ok(self)
    }
}

/// A parser for one modlist format
pub trait ModlistParser {
    fn format(&self) -> ImportFormat;

    /// Parse the whole file content
    fn parse(&self, content: &str) -> Result<ImportResult>;
}

/// The parser responsible for a format
pub fn parser_for(format: ImportFormat) -> Box<dyn ModlistParser> {
    match format {
        ImportFormat::ModsConfig => Box::new(xml::ModsConfigParser),
        ImportFormat::XmlList => Box::new(xml::XmlListParser),
        ImportFormat::Json => Box::new(json::JsonParser),
        ImportFormat::PlainText => Box::new(text::TextParser::package_ids()),
        ImportFormat::WorkshopIds => Box::new(text::TextParser::workshop_ids()),
    }
}

/// A purely numeric id of at least [`MIN_WORKSHOP_ID_LEN`] digits
pub fn is_workshop_id(value: &str) -> bool {
    value.len() >= MIN_WORKSHOP_ID_LEN && value.bytes().all(|b| b.is_ascii_digit())
}

/// Detect the format from the file name first, then from the content
pub fn detect_format(path: &Path, content: &str) -> Option<ImportFormat> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if name == "modsconfig.xml" {
        return Some(ImportFormat::ModsConfig);
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "json" => Some(ImportFormat::Json),
        "xml" => Some(xml::classify(content)),
        "txt" | "list" | "rml" => Some(text::classify(content)),
        _ => sniff_content(content),
    }
}

/// Guess a format from the first non-blank character
fn sniff_content(content: &str) -> Option<ImportFormat> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    match trimmed.chars().next()? {
        '{' | '[' => Some(ImportFormat::Json),
        '<' => Some(xml::classify(content)),
        _ => {
            let looks_like_list = text::significant_lines(content)
                .take(SNIFF_LINES)
                .any(|line| line.contains('.') || is_workshop_id(line));
            looks_like_list.then(|| text::classify(content))
        }
    }
}

/// Read and parse a modlist file, detecting its format
pub fn import_file(path: &Path) -> Result<ImportResult> {
    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);

    let format = detect_format(path, &content)
        .ok_or_else(|| Error::UnknownFormat(path.display().to_string()))?;
    debug!("Importing {} as {}", path.display(), format);

    let result = parser_for(format).parse(&content)?;
    info!(
        "Imported {} package ids and {} workshop ids from {}",
        result.package_ids.len(),
        result.workshop_ids.len(),
        path.display()
    );
    Ok(result)
}

/// Parse pasted text: package ids, workshop ids and workshop URLs mixed
pub fn import_text(content: &str) -> ImportResult {
    text::TextParser::package_ids().collect(content)
}
