// src/activation/policy.rs

//! Category ordering policy for the activation file
//!
//! The application expects a few ids at fixed places in its activation list:
//! loader mods first, then the base game, then official expansions in
//! release order. Those rules live in an [`OrderingPolicy`] table rather than
//! in the ordering code, so they can be versioned and replaced with
//! `--policy <file.json>`.

use crate::error::{Error, Result};
use crate::mods::canonical_id;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Newest policy table layout this build understands
pub const POLICY_VERSION: u32 = 1;

/// Version written when neither the caller nor an existing file supplies one
pub const FALLBACK_VERSION: &str = "1.5.4104 rev435";

/// Slot an id occupies in the activation file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Must load before the base application
    TierZero,
    Base,
    Extension,
    Other,
}

/// Fixed ordering rules applied on top of the computed load order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingPolicy {
    pub policy_version: u32,
    /// Ids that load before everything else, in this order
    pub tier_zero: Vec<String>,
    /// The base application's own id
    pub base_id: String,
    /// Official extension ids, in this order
    pub extensions: Vec<String>,
    /// Id prefixes owned by the base application
    pub reserved_prefixes: Vec<String>,
    pub fallback_version: String,
}

impl Default for OrderingPolicy {
    fn default() -> Self {
        Self {
            policy_version: POLICY_VERSION,
            tier_zero: vec!["brrainz.harmony".to_string()],
            base_id: "ludeon.rimworld".to_string(),
            extensions: [
                "ludeon.rimworld.royalty",
                "ludeon.rimworld.ideology",
                "ludeon.rimworld.biotech",
                "ludeon.rimworld.anomaly",
                "ludeon.rimworld.odyssey",
            ]
            .iter()
            .map(|id| id.to_string())
            .collect(),
            reserved_prefixes: vec!["ludeon.rimworld".to_string()],
            fallback_version: FALLBACK_VERSION.to_string(),
        }
    }
}

impl OrderingPolicy {
    /// Load and validate a policy table from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let policy = Self::from_json(&content)?;
        debug!("Loaded ordering policy from {}", path.display());
        Ok(policy)
    }

    /// Parse and validate a policy table; ids are canonicalized
    pub fn from_json(content: &str) -> Result<Self> {
        let policy: OrderingPolicy = serde_json::from_str(content)?;
        let policy = policy.normalized();
        policy.validate()?;
        Ok(policy)
    }

    fn normalized(mut self) -> Self {
        let canon = |ids: &mut Vec<String>| {
            *ids = ids
                .iter()
                .map(|id| canonical_id(id))
                .filter(|id| !id.is_empty())
                .collect();
        };
        canon(&mut self.tier_zero);
        canon(&mut self.extensions);
        canon(&mut self.reserved_prefixes);
        self.base_id = canonical_id(&self.base_id);
        self.fallback_version = self.fallback_version.trim().to_string();
        self
    }

    /// Reject tables the ordering rules cannot apply consistently
    pub fn validate(&self) -> Result<()> {
        if self.policy_version == 0 || self.policy_version > POLICY_VERSION {
            return Err(Error::InvalidPolicy(format!(
                "unsupported policy_version {} (expected 1..={})",
                self.policy_version, POLICY_VERSION
            )));
        }
        if self.base_id.is_empty() {
            return Err(Error::InvalidPolicy("base_id is empty".to_string()));
        }
        if self.fallback_version.is_empty() {
            return Err(Error::InvalidPolicy("fallback_version is empty".to_string()));
        }
        if self.tier_zero.contains(&self.base_id) {
            return Err(Error::InvalidPolicy(format!(
                "base id {} is listed as a tier-zero id",
                self.base_id
            )));
        }

        let mut seen = HashSet::new();
        let all = self
            .tier_zero
            .iter()
            .chain(std::iter::once(&self.base_id))
            .chain(self.extensions.iter());
        for id in all {
            if !seen.insert(id.as_str()) {
                return Err(Error::InvalidPolicy(format!("{} is listed twice", id)));
            }
        }
        Ok(())
    }

    /// Slot of a canonical id under this policy
    pub fn category(&self, id: &str) -> Category {
        if self.tier_zero.iter().any(|t| t == id) {
            Category::TierZero
        } else if self.base_id == id {
            Category::Base
        } else if self.extensions.iter().any(|e| e == id) {
            Category::Extension
        } else {
            Category::Other
        }
    }

    /// Apply the four category buckets to normalized, distinct ids
    ///
    /// Returns the full activation order and the extension ids present.
    /// Ids outside the fixed categories keep their relative input order.
    pub fn arrange(&self, ids: &[String]) -> (Vec<String>, Vec<String>) {
        let present: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let pick = |table: &[String]| -> Vec<String> {
            table
                .iter()
                .filter(|id| present.contains(id.as_str()))
                .cloned()
                .collect()
        };

        let mut order = pick(&self.tier_zero);
        if present.contains(self.base_id.as_str()) {
            order.push(self.base_id.clone());
        }
        let extensions: Vec<String> = pick(&self.extensions)
            .into_iter()
            .filter(|id| *id != self.base_id)
            .collect();
        order.extend(extensions.iter().cloned());
        order.extend(
            ids.iter()
                .filter(|id| self.category(id) == Category::Other)
                .cloned(),
        );
        (order, extensions)
    }
}
