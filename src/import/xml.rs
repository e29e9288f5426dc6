// src/import/xml.rs

//! XML modlists: the game's ModsConfig.xml and other managers' exports

use super::{ImportFormat, ImportResult, ModlistParser};
use crate::error::{Error, Result};
use crate::xml::{self, Element};

const MODS_CONFIG_ROOT: &str = "ModsConfigData";

/// Element names that hold one mod each in exported lists
const ENTRY_TAGS: &[&str] = &["mod", "li", "item", "entry"];
const PACKAGE_ID_TAGS: &[&str] = &["packageid", "package_id", "id"];
const NAME_TAGS: &[&str] = &["name", "displayname", "title"];
const WORKSHOP_ID_TAGS: &[&str] = &["workshopid", "workshop_id", "steamid", "publishedfileid"];

const PACKAGE_ID_ATTRS: &[&str] = &["packageId", "id"];
const NAME_ATTRS: &[&str] = &["name"];
const WORKSHOP_ID_ATTRS: &[&str] = &["workshopId", "steamId"];

fn parse_root(content: &str) -> Result<Element> {
    xml::parse_document(&xml::sanitize(content))
}

/// ModsConfig.xml when the root says so, a generic list otherwise
pub fn classify(content: &str) -> ImportFormat {
    match parse_root(content) {
        Ok(root) if root.name == MODS_CONFIG_ROOT => ImportFormat::ModsConfig,
        _ => ImportFormat::XmlList,
    }
}

/// Parser for the game's activation file
#[derive(Debug, Clone, Copy, Default)]
pub struct ModsConfigParser;

impl ModlistParser for ModsConfigParser {
    fn format(&self) -> ImportFormat {
        ImportFormat::ModsConfig
    }

    fn parse(&self, content: &str) -> Result<ImportResult> {
        let root = parse_root(content)?;
        let active = root
            .child("activeMods")
            .ok_or_else(|| Error::ImportError("no activeMods section found".to_string()))?;

        let mut result = ImportResult::new(ImportFormat::ModsConfig);
        for li in active.children_named("li") {
            result.push_package(&li.text);
        }
        if result.package_ids.is_empty() {
            result.warn("No active mods found in ModsConfig.xml");
        }
        Ok(result)
    }
}

/// Parser for XML lists exported by other mod managers
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlListParser;

impl ModlistParser for XmlListParser {
    fn format(&self) -> ImportFormat {
        ImportFormat::XmlList
    }

    fn parse(&self, content: &str) -> Result<ImportResult> {
        let root = parse_root(content)?;
        let mut result = ImportResult::new(ImportFormat::XmlList);
        visit(&root, &mut result);
        result.require_mods()
    }
}

/// Depth-first walk collecting every entry element
fn visit(element: &Element, result: &mut ImportResult) {
    if ENTRY_TAGS.contains(&element.name.to_lowercase().as_str()) {
        collect_entry(element, result);
    }
    for child in &element.children {
        visit(child, result);
    }
}

fn collect_entry(entry: &Element, result: &mut ImportResult) {
    let mut package_id = None;
    let mut workshop_id = None;

    if entry.text.contains('.') {
        package_id = Some(entry.text.clone());
    } else if !entry.text.is_empty() && entry.text.bytes().all(|b| b.is_ascii_digit()) {
        workshop_id = Some(entry.text.clone());
    }

    let package_id = child_field(entry, PACKAGE_ID_TAGS)
        .or(package_id)
        .or_else(|| attribute_field(entry, PACKAGE_ID_ATTRS));
    let name = child_field(entry, NAME_TAGS).or_else(|| attribute_field(entry, NAME_ATTRS));
    let workshop_id = child_field(entry, WORKSHOP_ID_TAGS)
        .or(workshop_id)
        .or_else(|| attribute_field(entry, WORKSHOP_ID_ATTRS));

    if let Some(id) = package_id.as_deref().and_then(|id| result.push_package(id)) {
        if let Some(name) = &name {
            result.set_name(&id, name);
        }
    }
    if let Some(wid) = &workshop_id {
        result.push_workshop(wid);
    }
}

/// Text of the first child whose lower-cased tag is in `tags`
fn child_field(entry: &Element, tags: &[&str]) -> Option<String> {
    entry
        .children
        .iter()
        .find(|c| !c.text.is_empty() && tags.contains(&c.name.to_lowercase().as_str()))
        .map(|c| c.text.clone())
}

fn attribute_field(entry: &Element, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| entry.attribute(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("<ModsConfigData><activeMods/></ModsConfigData>"),
            ImportFormat::ModsConfig
        );
        assert_eq!(classify("<ModList/>"), ImportFormat::XmlList);
        assert_eq!(classify("<broken"), ImportFormat::XmlList);
    }

    #[test]
    fn test_mods_config() {
        let result = ModsConfigParser
            .parse(
                r#"<?xml version="1.0" encoding="utf-8"?>
<ModsConfigData>
  <version>1.5.4104 rev435</version>
  <activeMods>
    <li>brrainz.harmony</li>
    <li>Ludeon.RimWorld</li>
    <li>ludeon.rimworld</li>
  </activeMods>
  <knownExpansions><li>ludeon.rimworld.royalty</li></knownExpansions>
</ModsConfigData>"#,
            )
            .unwrap();
        assert_eq!(result.package_ids, vec!["brrainz.harmony", "ludeon.rimworld"]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_mods_config_without_active_section() {
        let err = ModsConfigParser
            .parse("<ModsConfigData><version>1.5</version></ModsConfigData>")
            .unwrap_err();
        assert!(matches!(err, Error::ImportError(_)));

        let empty = ModsConfigParser
            .parse("<ModsConfigData><activeMods/></ModsConfigData>")
            .unwrap();
        assert!(empty.package_ids.is_empty());
        assert_eq!(empty.warnings.len(), 1);
    }

    #[test]
    fn test_generic_list_shapes() {
        let result = XmlListParser
            .parse(
                r#"<ModList>
  <mod>Brrainz.Harmony</mod>
  <mod packageId="Ludeon.RimWorld" name="Core"/>
  <item>
    <PackageId>unlimitedhugs.hugslib</PackageId>
    <DisplayName>HugsLib</DisplayName>
    <PublishedFileId>818773962</PublishedFileId>
  </item>
  <entry>2009463077</entry>
</ModList>"#,
            )
            .unwrap();
        assert_eq!(
            result.package_ids,
            vec!["brrainz.harmony", "ludeon.rimworld", "unlimitedhugs.hugslib"]
        );
        assert_eq!(result.workshop_ids, vec!["818773962", "2009463077"]);
        assert_eq!(
            result.mod_names.get("ludeon.rimworld").map(String::as_str),
            Some("Core")
        );
        assert_eq!(
            result.mod_names.get("unlimitedhugs.hugslib").map(String::as_str),
            Some("HugsLib")
        );
    }

    #[test]
    fn test_generic_list_without_mods() {
        assert!(XmlListParser.parse("<ModList><note>hi</note></ModList>").is_err());
        assert!(XmlListParser.parse("<ModList>").is_err());
    }
}
