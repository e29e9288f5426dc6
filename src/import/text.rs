// src/import/text.rs

//! Line-oriented modlists: package ids, workshop ids and workshop URLs

use super::{is_workshop_id, ImportFormat, ImportResult, ModlistParser, SNIFF_LINES};
use crate::error::Result;

/// Host that marks a line as a workshop page link
const WORKSHOP_HOST: &str = "steamcommunity.com";

/// Longest excerpt of a skipped line kept in a warning
const EXCERPT_LEN: usize = 50;

/// Parser for one-entry-per-line files
#[derive(Debug, Clone, Copy)]
pub struct TextParser {
    workshop_only: bool,
}

impl TextParser {
    /// Package ids, with workshop ids and URLs accepted alongside
    pub fn package_ids() -> Self {
        Self {
            workshop_only: false,
        }
    }

    /// Workshop ids and URLs only
    pub fn workshop_ids() -> Self {
        Self {
            workshop_only: true,
        }
    }

    /// Collect every recognizable entry, warning about the rest
    pub fn collect(&self, content: &str) -> ImportResult {
        let mut result = ImportResult::new(self.format());

        for line in significant_lines(content) {
            if let Some(id) = workshop_url_id(line) {
                result.push_workshop(id);
            } else if is_workshop_id(line) {
                result.push_workshop(line);
            } else if !self.workshop_only && line.contains('.') {
                result.push_package(line);
            } else {
                let kind = if self.workshop_only {
                    "workshop id"
                } else {
                    "line"
                };
                result.warn(format!("Skipped unrecognized {}: {}", kind, excerpt(line)));
            }
        }
        result
    }
}

impl ModlistParser for TextParser {
    fn format(&self) -> ImportFormat {
        if self.workshop_only {
            ImportFormat::WorkshopIds
        } else {
            ImportFormat::PlainText
        }
    }

    fn parse(&self, content: &str) -> Result<ImportResult> {
        self.collect(content).require_mods()
    }
}

/// Non-blank lines with comments removed
pub fn significant_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(|line| line.trim().trim_start_matches('\u{feff}'))
        .filter(|line| !line.starts_with('#') && !line.starts_with("//"))
        .map(|line| match line.find(" #") {
            Some(pos) => line[..pos].trim_end(),
            None => line,
        })
        .filter(|line| !line.is_empty())
}

/// Workshop ids when every sampled line is one, package ids otherwise
pub fn classify(content: &str) -> ImportFormat {
    let mut sampled = significant_lines(content).take(SNIFF_LINES).peekable();
    if sampled.peek().is_none() {
        return ImportFormat::PlainText;
    }
    if sampled.all(|line| is_workshop_id(line) || workshop_url_id(line).is_some()) {
        ImportFormat::WorkshopIds
    } else {
        ImportFormat::PlainText
    }
}

/// The numeric `id=` parameter of a workshop page URL
pub fn workshop_url_id(line: &str) -> Option<&str> {
    if !line.contains(WORKSHOP_HOST) {
        return None;
    }
    let start = line.find("id=")? + "id=".len();
    let rest = &line[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let id = &rest[..end];
    is_workshop_id(id).then_some(id)
}

fn excerpt(line: &str) -> String {
    line.chars().take(EXCERPT_LEN).collect()
}
