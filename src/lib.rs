// src/lib.rs

//! modloom: mod load-order manager
//!
//! Reads mod manifests, computes a load order that honors every declared
//! "load before" and "load after" constraint, reports conflicts, and writes
//! the game's activation file.
//!
//! # Architecture
//!
//! - Total entry points: parsing, sorting, analysis and serialization never
//!   return an error; degraded input produces degraded output
//! - Snapshots: a registry is rebuilt per scan, never patched in place
//! - Deterministic ordering: the load order depends only on the set of mods
//!   and their constraints, not on input order
//! - Atomic writes: the activation file is replaced by rename, with a backup
//!
//! The collaborator-facing surface is [`mods::parse`],
//! [`resolver::build_order`], [`resolver::analyze`] and
//! [`activation::serialize`].

pub mod activation;
mod error;
pub mod import;
pub mod mods;
pub mod registry;
pub mod resolver;
pub mod xml;

pub use activation::{ActivationFile, OrderingPolicy, PersistedActivation};
pub use error::{Error, Result};
pub use mods::{ActivationList, ModOrigin, ModRecord};
pub use registry::{ModRegistry, ScanRoot};
pub use resolver::{AnalyzerOptions, CyclePolicy, Diagnostic, DiagnosticKind, Severity};
