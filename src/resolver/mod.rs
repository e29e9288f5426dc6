// src/resolver/mod.rs

//! Load order resolution and conflict analysis
//!
//! The sorter ([`build_order`]) and the analyzer ([`analyze`]) both work on
//! an immutable [`ActivationList`](crate::mods::ActivationList) snapshot and
//! can be called independently of each other.

mod conflicts;
mod graph;

pub use conflicts::{
    analyze, analyze_with, check_cycles, check_duplicates, check_incompatibilities,
    check_missing_dependencies, check_order, AnalyzerOptions, Diagnostic, DiagnosticKind,
    Severity,
};
pub use graph::{build_order, build_order_detailed, CyclePolicy, SortOutcome};
