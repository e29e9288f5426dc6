// src/resolver/conflicts.rs

//! Conflict analysis over an activation list
//!
//! Every check is a pure function of the list and the options. None of them
//! depends on another's output, so they can run in any order.

use super::graph::{build_order_detailed, CyclePolicy};
use crate::activation::OrderingPolicy;
use crate::mods::{canonical_id, ActivationList, ModRecord};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

const REORDER_REMEDY: &str = "re-run the sorter";
const CYCLE_REMEDY: &str = "break the loop by removing one of the constraints";

/// Category of a reported problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Duplicate,
    MissingDependency,
    Incompatible,
    OrderViolation,
    Cycle,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::Duplicate => "duplicate",
            DiagnosticKind::MissingDependency => "missing_dependency",
            DiagnosticKind::Incompatible => "incompatible",
            DiagnosticKind::OrderViolation => "order_violation",
            DiagnosticKind::Cycle => "cycle",
        };
        f.write_str(label)
    }
}

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(label)
    }
}

/// One reported problem, built fresh on every analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Id of the mod the problem is reported against
    pub subject_a: String,
    /// The other mod involved, when there is one
    pub subject_b: Option<String>,
    pub message: String,
    pub remedy: String,
}

impl Diagnostic {
    fn new(
        kind: DiagnosticKind,
        severity: Severity,
        subject_a: impl Into<String>,
        subject_b: Option<String>,
        message: String,
        remedy: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            subject_a: subject_a.into(),
            subject_b,
            message,
            remedy: remedy.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.severity, self.kind, self.message, self.remedy
        )
    }
}

/// Knobs for [`analyze_with`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerOptions {
    /// Id prefixes owned by the base application; missing dependencies on
    /// them are warnings rather than errors
    pub reserved_prefixes: Vec<String>,
    pub cycle_policy: CyclePolicy,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self::from_policy(&OrderingPolicy::default())
    }
}

impl AnalyzerOptions {
    pub fn from_policy(policy: &OrderingPolicy) -> Self {
        Self {
            reserved_prefixes: policy
                .reserved_prefixes
                .iter()
                .map(|p| canonical_id(p))
                .filter(|p| !p.is_empty())
                .collect(),
            cycle_policy: CyclePolicy::default(),
        }
    }

    pub fn with_cycle_policy(mut self, cycle_policy: CyclePolicy) -> Self {
        self.cycle_policy = cycle_policy;
        self
    }

    fn is_reserved(&self, id: &str) -> bool {
        self.reserved_prefixes.iter().any(|p| id.starts_with(p.as_str()))
    }
}

/// Run every check with default options
pub fn analyze(list: &ActivationList) -> Vec<Diagnostic> {
    analyze_with(list, &AnalyzerOptions::default())
}

/// Run every check and concatenate the results
pub fn analyze_with(list: &ActivationList, options: &AnalyzerOptions) -> Vec<Diagnostic> {
    let mut diagnostics = check_duplicates(list);
    diagnostics.extend(check_missing_dependencies(list, options));
    diagnostics.extend(check_incompatibilities(list));
    diagnostics.extend(check_order(list));
    if options.cycle_policy == CyclePolicy::Diagnose {
        diagnostics.extend(check_cycles(list));
    }
    diagnostics
}

/// First occurrence of each id, in list order
fn first_occurrences(list: &ActivationList) -> Vec<(usize, &Arc<ModRecord>)> {
    let mut seen = HashSet::new();
    list.records()
        .iter()
        .enumerate()
        .filter(|(_, r)| seen.insert(r.canonical_id.as_str()))
        .collect()
}

/// One diagnostic for every repeat of an id already seen earlier in the list
pub fn check_duplicates(list: &ActivationList) -> Vec<Diagnostic> {
    let mut first: HashMap<&str, &ModRecord> = HashMap::new();
    let mut diagnostics = Vec::new();

    for record in list.iter() {
        match first.get(record.canonical_id.as_str()) {
            Some(original) => diagnostics.push(Diagnostic::new(
                DiagnosticKind::Duplicate,
                Severity::Error,
                &record.canonical_id,
                Some(original.canonical_id.clone()),
                format!(
                    "{} is active more than once: {} and {}",
                    record.canonical_id,
                    original.source_path.display(),
                    record.source_path.display()
                ),
                format!("deactivate the copy in {}", record.source_path.display()),
            )),
            None => {
                first.insert(&record.canonical_id, record);
            }
        }
    }
    diagnostics
}

/// One diagnostic per declared dependency that is not in the list
pub fn check_missing_dependencies(
    list: &ActivationList,
    options: &AnalyzerOptions,
) -> Vec<Diagnostic> {
    let active: HashSet<&str> = list.iter().map(|r| r.canonical_id.as_str()).collect();
    let mut diagnostics = Vec::new();

    for (_, record) in first_occurrences(list) {
        for dep in record.dependencies.iter() {
            if active.contains(dep) {
                continue;
            }
            let severity = if options.is_reserved(dep) {
                Severity::Warning
            } else {
                Severity::Error
            };
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::MissingDependency,
                severity,
                &record.canonical_id,
                Some(dep.to_string()),
                format!("{} requires {}, which is not active", record.display_name, dep),
                format!("activate or install {}", dep),
            ));
        }
    }
    diagnostics
}

/// One diagnostic per unordered pair of active, mutually exclusive mods
pub fn check_incompatibilities(list: &ActivationList) -> Vec<Diagnostic> {
    let active: HashMap<&str, &Arc<ModRecord>> = first_occurrences(list)
        .into_iter()
        .map(|(_, r)| (r.canonical_id.as_str(), r))
        .collect();
    let mut reported: HashSet<(String, String)> = HashSet::new();
    let mut diagnostics = Vec::new();

    for (_, record) in first_occurrences(list) {
        for other_id in record.incompatible_with.iter() {
            if other_id == record.canonical_id {
                continue;
            }
            let Some(other) = active.get(other_id) else {
                continue;
            };
            let key = if record.canonical_id.as_str() < other_id {
                (record.canonical_id.clone(), other_id.to_string())
            } else {
                (other_id.to_string(), record.canonical_id.clone())
            };
            if !reported.insert(key) {
                continue;
            }
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::Incompatible,
                Severity::Error,
                &record.canonical_id,
                Some(other_id.to_string()),
                format!(
                    "{} is incompatible with {}",
                    record.display_name, other.display_name
                ),
                format!("deactivate {} or {}", record.canonical_id, other_id),
            ));
        }
    }
    diagnostics
}

/// One diagnostic per ordering constraint the current list breaks
pub fn check_order(list: &ActivationList) -> Vec<Diagnostic> {
    let occurrences = first_occurrences(list);
    let position: HashMap<&str, usize> = occurrences
        .iter()
        .map(|(i, r)| (r.canonical_id.as_str(), *i))
        .collect();
    let mut reported: HashSet<(String, String)> = HashSet::new();
    let mut diagnostics = Vec::new();

    for &(_, record) in &occurrences {
        let id = record.canonical_id.as_str();
        // (must load first, must load second)
        let after = record.load_after.iter().map(move |t| (t, id));
        let before = record.load_before.iter().map(move |t| (id, t));

        for (earlier, later) in after.chain(before) {
            if earlier == later {
                continue;
            }
            let (Some(&e), Some(&l)) = (position.get(earlier), position.get(later)) else {
                continue;
            };
            if e < l || !reported.insert((earlier.to_string(), later.to_string())) {
                continue;
            }
            let other = if earlier == id { later } else { earlier };
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::OrderViolation,
                Severity::Warning,
                id,
                Some(other.to_string()),
                format!(
                    "{} must load before {} but is at position {} (after {})",
                    earlier,
                    later,
                    e + 1,
                    l + 1
                ),
                REORDER_REMEDY,
            ));
        }
    }
    diagnostics
}

/// A single diagnostic listing the mods a constraint loop leaves unordered
pub fn check_cycles(list: &ActivationList) -> Vec<Diagnostic> {
    let outcome = build_order_detailed(list);
    let Some(first) = outcome.cyclic_ids.first() else {
        return Vec::new();
    };
    vec![Diagnostic::new(
        DiagnosticKind::Cycle,
        Severity::Error,
        first.clone(),
        outcome.cyclic_ids.get(1).cloned(),
        format!(
            "load order constraints form a loop between: {}",
            outcome.cyclic_ids.join(", ")
        ),
        CYCLE_REMEDY,
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> ModRecord {
        ModRecord::new(id, format!("/mods/{}", id))
    }

    fn list(records: Vec<ModRecord>) -> ActivationList {
        records.into_iter().collect()
    }

    fn kinds(diagnostics: &[Diagnostic], kind: DiagnosticKind) -> Vec<&Diagnostic> {
        diagnostics.iter().filter(|d| d.kind == kind).collect()
    }

    #[test]
    fn test_duplicate_detection() {
        let mut copy = record("mod.A");
        copy.source_path = "/other/mod.A".into();
        let list = list(vec![record("mod.a"), copy, record("mod.b")]);

        let diagnostics = analyze(&list);
        let duplicates = kinds(&diagnostics, DiagnosticKind::Duplicate);
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].subject_a, "mod.a");
        assert_eq!(duplicates[0].subject_b.as_deref(), Some("mod.a"));
        assert_eq!(duplicates[0].severity, Severity::Error);
        assert!(duplicates[0].message.contains("/other/mod.A"));
    }

    #[test]
    fn test_triple_duplicate_reports_each_repeat() {
        let list = list(vec![record("x"), record("x"), record("x")]);
        assert_eq!(check_duplicates(&list).len(), 2);
    }

    #[test]
    fn test_missing_dependency() {
        let mut needy = record("needy.mod");
        needy.dependencies.insert("Absent.Mod");
        let list = list(vec![needy, record("other.mod")]);

        let diagnostics = analyze(&list);
        let missing = kinds(&diagnostics, DiagnosticKind::MissingDependency);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].subject_a, "needy.mod");
        assert_eq!(missing[0].subject_b.as_deref(), Some("absent.mod"));
        assert_eq!(missing[0].severity, Severity::Error);
    }

    #[test]
    fn test_missing_reserved_dependency_is_warning() {
        let mut needy = record("needy.mod");
        needy.dependencies.insert("Ludeon.RimWorld.Biotech");
        let diagnostics =
            check_missing_dependencies(&list(vec![needy]), &AnalyzerOptions::default());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn test_satisfied_dependency() {
        let mut needy = record("needy.mod");
        needy.dependencies.insert("brrainz.harmony");
        let list = list(vec![record("brrainz.harmony"), needy]);
        assert!(check_missing_dependencies(&list, &AnalyzerOptions::default()).is_empty());
    }

    #[test]
    fn test_incompatible_pair_reported_once() {
        let mut a = record("a.mod");
        a.incompatible_with.insert("b.mod");
        let mut b = record("b.mod");
        b.incompatible_with.insert("a.mod");
        b.incompatible_with.insert("b.mod");
        b.incompatible_with.insert("inactive.mod");

        let diagnostics = check_incompatibilities(&list(vec![b, a]));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].subject_a, "b.mod");
        assert_eq!(diagnostics[0].subject_b.as_deref(), Some("a.mod"));
    }

    #[test]
    fn test_order_violation_uses_current_positions() {
        let mut a = record("a.mod");
        a.load_after.insert("b.mod");
        let mut b = record("b.mod");
        b.load_before.insert("a.mod");

        let violated = check_order(&list(vec![a.clone(), b.clone()]));
        assert_eq!(violated.len(), 1);
        assert_eq!(violated[0].kind, DiagnosticKind::OrderViolation);
        assert_eq!(violated[0].severity, Severity::Warning);
        assert_eq!(violated[0].remedy, "re-run the sorter");

        assert!(check_order(&list(vec![b, a])).is_empty());
    }

    #[test]
    fn test_order_ignores_inactive_targets() {
        let mut a = record("a.mod");
        a.load_after.insert("gone.mod");
        a.load_before.insert("also.gone");
        assert!(check_order(&list(vec![a])).is_empty());
    }

    #[test]
    fn test_cycle_diagnostic_follows_policy() {
        let mut a = record("a.mod");
        a.load_after.insert("b.mod");
        let mut b = record("b.mod");
        b.load_after.insert("a.mod");
        let list = list(vec![a, b]);

        let diagnostics = analyze(&list);
        let cycles = kinds(&diagnostics, DiagnosticKind::Cycle);
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].is_error());
        assert!(cycles[0].message.contains("a.mod, b.mod"));

        let options = AnalyzerOptions::default().with_cycle_policy(CyclePolicy::Fallback);
        let diagnostics = analyze_with(&list, &options);
        assert!(kinds(&diagnostics, DiagnosticKind::Cycle).is_empty());
    }

    #[test]
    fn test_clean_list_has_no_diagnostics() {
        let mut a = record("a.mod");
        a.dependencies.insert("b.mod");
        a.load_after.insert("b.mod");
        assert!(analyze(&list(vec![record("b.mod"), a])).is_empty());
        assert!(analyze(&ActivationList::new()).is_empty());
    }

    #[test]
    fn test_diagnostic_serializes() {
        let mut a = record("a.mod");
        a.dependencies.insert("b.mod");
        let diagnostics = analyze(&list(vec![a]));
        let json = serde_json::to_value(&diagnostics[0]).unwrap();
        assert_eq!(json["kind"], "missing_dependency");
        assert_eq!(json["severity"], "error");
    }
}
