// src/import/json.rs

//! JSON modlists
//!
//! Accepts a bare array of entries, or an object holding one under any of
//! the keys mod managers commonly use. Entries are either id strings or
//! objects with id, name and workshop id fields.

use super::{is_workshop_id, ImportFormat, ImportResult, ModlistParser};
use crate::error::{Error, Result};
use serde_json::Value;

/// Object keys that hold the ordered entry list, tried in order
const LIST_KEYS: &[&str] = &[
    "mods",
    "active_mods",
    "activeMods",
    "mod_list",
    "modList",
    "modlist",
];

const PACKAGE_ID_KEYS: &[&str] = &["packageId", "package_id", "id"];
const NAME_KEYS: &[&str] = &["name", "displayName"];
const WORKSHOP_ID_KEYS: &[&str] = &["workshopId", "workshop_id", "steamId"];

/// Parser for JSON modlists
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl ModlistParser for JsonParser {
    fn format(&self) -> ImportFormat {
        ImportFormat::Json
    }

    fn parse(&self, content: &str) -> Result<ImportResult> {
        let data: Value = serde_json::from_str(content.trim_start_matches('\u{feff}'))?;
        let mut result = ImportResult::new(ImportFormat::Json);

        match &data {
            Value::Array(entries) => collect_entries(&mut result, entries),
            Value::Object(map) => {
                match LIST_KEYS.iter().find_map(|key| map.get(*key)) {
                    Some(Value::Array(entries)) => collect_entries(&mut result, entries),
                    Some(_) => result.warn("Mod list field is not an array"),
                    None => {}
                }
                if let Some(Value::Array(ids)) = map.get("package_ids") {
                    for id in ids.iter().filter_map(Value::as_str) {
                        result.push_package(id);
                    }
                }
                if let Some(Value::Array(ids)) = map.get("workshop_ids") {
                    for id in ids.iter().filter_map(scalar_text) {
                        result.push_workshop(&id);
                    }
                }
                if let Some(Value::Object(names)) = map.get("mod_names") {
                    for (id, name) in names {
                        if let Some(name) = name.as_str() {
                            result.set_name(id, name);
                        }
                    }
                }
            }
            _ => {
                return Err(Error::ImportError(
                    "JSON modlist must be an array or an object".to_string(),
                ))
            }
        }

        result.require_mods()
    }
}

fn collect_entries(result: &mut ImportResult, entries: &[Value]) {
    for entry in entries {
        match entry {
            Value::String(text) => {
                let text = text.trim();
                if is_workshop_id(text) {
                    result.push_workshop(text);
                } else {
                    result.push_package(text);
                }
            }
            Value::Object(_) => collect_object(result, entry),
            other => result.warn(format!("Skipped unsupported entry: {}", other)),
        }
    }
}

fn collect_object(result: &mut ImportResult, entry: &Value) {
    let package_id = first_field(entry, PACKAGE_ID_KEYS);
    let name = first_field(entry, NAME_KEYS);
    let workshop_id = first_field(entry, WORKSHOP_ID_KEYS);

    if let Some(id) = package_id.as_deref().and_then(|id| result.push_package(id)) {
        if let Some(name) = &name {
            result.set_name(&id, name);
        }
    }
    if let Some(wid) = &workshop_id {
        result.push_workshop(wid);
    }
    if package_id.is_none() && workshop_id.is_none() {
        result.warn(format!("Skipped entry without an id: {}", entry));
    }
}

/// First non-empty string or number among `keys`
fn first_field(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| entry.get(*key))
        .filter_map(scalar_text)
        .find(|text| !text.trim().is_empty())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
