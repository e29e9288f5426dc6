// src/activation/mod.rs

//! Activation file (ModsConfig.xml) reading and writing
//!
//! The application reads the file by element name and position, so the
//! writer always emits `version`, `activeMods` and `knownExpansions` in that
//! order, with no repeated ids. Writes go to a temp file in the target's
//! directory that is then renamed over the target, so readers never see a
//! half-written file.

mod policy;

pub use policy::{Category, OrderingPolicy, FALLBACK_VERSION, POLICY_VERSION};

use crate::error::{Error, Result};
use crate::mods::{canonical_id, ActivationList};
use crate::xml;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Conventional file name of the activation file
pub const ACTIVATION_FILE_NAME: &str = "ModsConfig.xml";

const ROOT_ELEMENT: &str = "ModsConfigData";
const VERSION_ELEMENT: &str = "version";
const ACTIVE_ELEMENT: &str = "activeMods";
const KNOWN_ELEMENT: &str = "knownExpansions";
const ITEM_ELEMENT: &str = "li";
const BACKUP_SUFFIX: &str = ".backup";

/// Contents of an activation file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistedActivation {
    pub version: String,
    /// Ids in load order
    pub active_ids: Vec<String>,
    /// Extension ids present, without the base application id
    pub known_category_ids: Vec<String>,
}

/// Canonicalize ids and drop blanks and repeats, keeping first-seen order
pub fn normalize_ids<S: AsRef<str>>(ids: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| canonical_id(id.as_ref()))
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// An activation file target and the policy used to lay it out
#[derive(Debug, Clone)]
pub struct ActivationFile {
    path: PathBuf,
    policy: OrderingPolicy,
}

impl ActivationFile {
    /// Target `path` with the default ordering policy
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_policy(path, OrderingPolicy::default())
    }

    pub fn with_policy(path: impl Into<PathBuf>, policy: OrderingPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> &OrderingPolicy {
        &self.policy
    }

    /// Where the previous file is copied before an overwrite
    pub fn backup_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }

    /// Version to write: the hint, else the existing file's, else the fallback
    pub fn resolve_version(&self, version_hint: Option<&str>) -> String {
        if let Some(hint) = version_hint.map(str::trim).filter(|h| !h.is_empty()) {
            return hint.to_string();
        }
        match read_activation_file(&self.path) {
            Ok(existing) if !existing.version.is_empty() => existing.version,
            _ => self.policy.fallback_version.clone(),
        }
    }

    /// Compute what would be written for these ids, without touching disk
    pub fn layout<S: AsRef<str>>(
        &self,
        ids: &[S],
        version_hint: Option<&str>,
    ) -> PersistedActivation {
        let ids = normalize_ids(ids);
        let (active_ids, known_category_ids) = self.policy.arrange(&ids);
        PersistedActivation {
            version: self.resolve_version(version_hint),
            active_ids,
            known_category_ids,
        }
    }

    /// Write the activation file for an already ordered list
    ///
    /// Never fails: I/O problems are logged and reported as `false`, and the
    /// previous file is left intact.
    pub fn serialize(&self, list: &ActivationList, version_hint: Option<&str>) -> bool {
        self.serialize_ids(&list.ids(), version_hint)
    }

    /// [`serialize`](Self::serialize) for plain ids
    pub fn serialize_ids<S: AsRef<str>>(&self, ids: &[S], version_hint: Option<&str>) -> bool {
        match self.save(ids, version_hint) {
            Ok(written) => {
                info!(
                    "Wrote {} active mods to {}",
                    written.active_ids.len(),
                    self.path.display()
                );
                true
            }
            Err(e) => {
                warn!("Failed to write {}: {}", self.path.display(), e);
                false
            }
        }
    }

    /// Back up the existing file, then atomically replace it
    pub fn save<S: AsRef<str>>(
        &self,
        ids: &[S],
        version_hint: Option<&str>,
    ) -> Result<PersistedActivation> {
        let activation = self.layout(ids, version_hint);
        let content = render(&activation)?;
        self.backup();
        write_atomic(&self.path, &content)?;
        Ok(activation)
    }

    /// Read the current file
    pub fn read(&self) -> Result<PersistedActivation> {
        read_activation_file(&self.path)
    }

    fn backup(&self) {
        if !self.path.is_file() {
            return;
        }
        let backup = self.backup_path();
        match fs::copy(&self.path, &backup) {
            Ok(_) => debug!("Backed up {} to {}", self.path.display(), backup.display()),
            Err(e) => warn!(
                "Could not back up {} to {}: {}",
                self.path.display(),
                backup.display(),
                e
            ),
        }
    }
}

/// Write an ordered list to `target` with the default policy
pub fn serialize(list: &ActivationList, target: &Path, version_hint: Option<&str>) -> bool {
    ActivationFile::new(target).serialize(list, version_hint)
}

/// Render the activation document
pub fn render(activation: &PersistedActivation) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))?;

    writer.write_event(Event::Start(BytesStart::new(VERSION_ELEMENT)))?;
    writer.write_event(Event::Text(BytesText::new(&activation.version)))?;
    writer.write_event(Event::End(BytesEnd::new(VERSION_ELEMENT)))?;

    write_list(&mut writer, ACTIVE_ELEMENT, &activation.active_ids)?;
    write_list(&mut writer, KNOWN_ELEMENT, &activation.known_category_ids)?;

    writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_list(writer: &mut Writer<Vec<u8>>, name: &str, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(name)))?;
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    for id in ids {
        writer.write_event(Event::Start(BytesStart::new(ITEM_ELEMENT)))?;
        writer.write_event(Event::Text(BytesText::new(id)))?;
        writer.write_event(Event::End(BytesEnd::new(ITEM_ELEMENT)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_atomic(target: &Path, content: &[u8]) -> Result<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    // Temp files are created owner-only; keep the replaced file's mode
    if let Ok(existing) = fs::metadata(target) {
        temp.as_file().set_permissions(existing.permissions())?;
    }
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|e| Error::Persist {
        path: target.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}

/// Read an activation file from disk
pub fn read_activation_file(path: &Path) -> Result<PersistedActivation> {
    let bytes = fs::read(path)?;
    parse_activation(&String::from_utf8_lossy(&bytes))
}

/// Parse activation file text
pub fn parse_activation(content: &str) -> Result<PersistedActivation> {
    let root = xml::parse_document(&xml::sanitize(content))?;
    if root.name != ROOT_ELEMENT {
        return Err(Error::Xml(format!(
            "expected <{}> root, found <{}>",
            ROOT_ELEMENT, root.name
        )));
    }

    let list = |name: &str| -> Vec<String> {
        root.child(name)
            .map(|parent| {
                let items: Vec<&str> = parent
                    .children_named(ITEM_ELEMENT)
                    .map(|li| li.text.as_str())
                    .collect();
                normalize_ids(&items)
            })
            .unwrap_or_default()
    };

    Ok(PersistedActivation {
        version: root.child_text(VERSION_ELEMENT).unwrap_or_default().to_string(),
        active_ids: list(ACTIVE_ELEMENT),
        known_category_ids: list(KNOWN_ELEMENT),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mods::ModRecord;
    use tempfile::TempDir;

    fn target(tmp: &TempDir) -> ActivationFile {
        ActivationFile::new(tmp.path().join(ACTIVATION_FILE_NAME))
    }

    #[test]
    fn test_normalize_ids() {
        assert_eq!(
            normalize_ids(&["B.Mod", " a.mod ", "b.mod", "", "A.MOD"]),
            vec!["b.mod", "a.mod"]
        );
    }

    #[test]
    fn test_category_round_trip() {
        let tmp = TempDir::new().unwrap();
        let file = target(&tmp);
        let permutations = [
            ["ludeon.rimworld", "extra.mod", "brrainz.harmony"],
            ["extra.mod", "brrainz.harmony", "ludeon.rimworld"],
            ["brrainz.harmony", "extra.mod", "Ludeon.RimWorld"],
        ];
        for ids in permutations {
            assert!(file.serialize_ids(&ids, None));
            let read = file.read().unwrap();
            assert_eq!(
                read.active_ids,
                vec!["brrainz.harmony", "ludeon.rimworld", "extra.mod"]
            );
        }
    }

    #[test]
    fn test_remaining_ids_keep_relative_order() {
        let tmp = TempDir::new().unwrap();
        let file = target(&tmp);
        assert!(file.serialize_ids(&["z.mod", "ludeon.rimworld", "extra.mod", "a.mod"], None));
        assert_eq!(
            file.read().unwrap().active_ids,
            vec!["ludeon.rimworld", "z.mod", "extra.mod", "a.mod"]
        );
    }

    #[test]
    fn test_serialize_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let file = target(&tmp);
        let ids = ["b.mod", "ludeon.rimworld.biotech", "ludeon.rimworld", "a.mod"];

        assert!(file.serialize_ids(&ids, Some("1.5")));
        let first = file.read().unwrap();
        let first_bytes = fs::read(file.path()).unwrap();

        assert!(file.serialize_ids(&first.active_ids, None));
        let second = file.read().unwrap();
        assert_eq!(first, second);
        assert_eq!(first_bytes, fs::read(file.path()).unwrap());
    }

    #[test]
    fn test_known_expansions_exclude_base() {
        let tmp = TempDir::new().unwrap();
        let file = target(&tmp);
        assert!(file.serialize_ids(
            &["ludeon.rimworld.ideology", "ludeon.rimworld", "ludeon.rimworld.royalty"],
            None
        ));
        let read = file.read().unwrap();
        assert_eq!(
            read.known_category_ids,
            vec!["ludeon.rimworld.royalty", "ludeon.rimworld.ideology"]
        );
        assert_eq!(read.active_ids[0], "ludeon.rimworld");
    }

    #[test]
    fn test_element_order() {
        let activation = PersistedActivation {
            version: "1.5".to_string(),
            active_ids: vec!["ludeon.rimworld".to_string()],
            known_category_ids: Vec::new(),
        };
        let text = String::from_utf8(render(&activation).unwrap()).unwrap();
        let version = text.find("<version>").unwrap();
        let active = text.find("<activeMods>").unwrap();
        let known = text.find("<knownExpansions").unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(version < active && active < known);
    }

    #[test]
    fn test_version_precedence() {
        let tmp = TempDir::new().unwrap();
        let file = target(&tmp);

        assert_eq!(file.resolve_version(None), FALLBACK_VERSION);
        assert!(file.serialize_ids(&["a.mod"], Some("1.4.3901 rev1")));
        assert_eq!(file.read().unwrap().version, "1.4.3901 rev1");

        assert!(file.serialize_ids(&["a.mod"], None));
        assert_eq!(file.read().unwrap().version, "1.4.3901 rev1");

        assert!(file.serialize_ids(&["a.mod"], Some("1.5.0")));
        assert_eq!(file.read().unwrap().version, "1.5.0");
    }

    #[test]
    fn test_unparseable_existing_file_uses_fallback() {
        let tmp = TempDir::new().unwrap();
        let file = target(&tmp);
        fs::write(file.path(), "not xml at all <").unwrap();
        assert_eq!(file.resolve_version(None), FALLBACK_VERSION);
    }

    #[test]
    fn test_backup_written_before_overwrite() {
        let tmp = TempDir::new().unwrap();
        let file = target(&tmp);
        assert!(file.serialize_ids(&["first.mod"], None));
        assert!(!file.backup_path().exists());

        assert!(file.serialize_ids(&["second.mod"], None));
        let backup = read_activation_file(&file.backup_path()).unwrap();
        assert_eq!(backup.active_ids, vec!["first.mod"]);
        assert_eq!(file.read().unwrap().active_ids, vec!["second.mod"]);
        assert!(file.backup_path().ends_with("ModsConfig.xml.backup"));
    }

    #[test]
    fn test_failed_backup_does_not_block_write() {
        let tmp = TempDir::new().unwrap();
        let file = target(&tmp);
        assert!(file.serialize_ids(&["old.mod"], None));
        fs::create_dir_all(file.backup_path().join("sub")).unwrap();

        assert!(file.serialize_ids(&["a.mod"], None));
        assert_eq!(file.read().unwrap().active_ids, vec!["a.mod"]);
        assert!(file.backup_path().is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_overwrite_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let file = target(&tmp);
        assert!(file.serialize_ids(&["old.mod"], None));
        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o644)).unwrap();

        assert!(file.serialize_ids(&["a.mod"], None));
        let mode = fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_serialize_missing_directory_returns_false() {
        let tmp = TempDir::new().unwrap();
        let file = ActivationFile::new(tmp.path().join("missing/dir").join(ACTIVATION_FILE_NAME));
        assert!(!file.serialize_ids(&["a.mod"], None));
        assert!(!file.path().exists());
    }

    #[test]
    fn test_reserved_characters_escaped() {
        let activation = PersistedActivation {
            version: "1.5 <beta> & \"rc\"".to_string(),
            active_ids: vec!["odd&id".to_string()],
            known_category_ids: Vec::new(),
        };
        let bytes = render(&activation).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("odd&amp;id"));
        assert!(text.contains("&lt;beta&gt;"));

        let read = parse_activation(&text).unwrap();
        assert_eq!(read.version, activation.version);
        assert_eq!(read.active_ids, vec!["odd&id"]);
    }

    #[test]
    fn test_serialize_activation_list() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(ACTIVATION_FILE_NAME);
        let list: ActivationList = ["Extra.Mod", "Ludeon.RimWorld"]
            .iter()
            .map(|id| ModRecord::new(id, format!("/mods/{}", id)))
            .collect();
        assert!(serialize(&list, &path, None));
        let read = read_activation_file(&path).unwrap();
        assert_eq!(read.active_ids, vec!["ludeon.rimworld", "extra.mod"]);
        assert_eq!(read.version, FALLBACK_VERSION);
    }

    #[test]
    fn test_parse_activation_rejects_other_roots() {
        assert!(parse_activation("<ModMetaData/>").is_err());
        let parsed = parse_activation(
            "<ModsConfigData><version>1.5</version>\
             <activeMods><li>Ludeon.RimWorld</li></activeMods></ModsConfigData>",
        )
        .unwrap();
        assert_eq!(parsed.active_ids, vec!["ludeon.rimworld"]);
        assert!(parsed.known_category_ids.is_empty());
    }
}
