//! Ordered hook maps and hook-info normalization.
//!
//! # Responsibilities
//! - Store hooks by identifier in insertion order
//! - Override-by-name preserves the original position
//! - Carry explicit disable markers alongside live hooks
//! - Normalize hook config into counts/names for the summary
//!
//! # Design Decisions
//! - Backed by a Vec of entries: route hook maps are small, and the
//!   position-preserving override rule needs explicit ordering anyway
//! - A `None` slot disables an inherited hook for the subtree; it stays in
//!   the map so later merges can re-enable it in place

use std::collections::BTreeMap;

use serde::Serialize;

use crate::compiler::lifecycle::LifecycleStage;
use crate::pipeline::HookFn;

/// One hook slot: a live hook, or an explicit disable marker.
pub type HookSlot = Option<HookFn>;

/// Insertion-order-preserving map of hook identifier to hook slot.
#[derive(Clone, Default)]
pub struct HookMap {
    entries: Vec<(String, HookSlot)>,
}

impl HookMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or override a hook. Overriding an existing identifier keeps its
    /// position; new identifiers append at the end.
    pub fn insert(&mut self, name: impl Into<String>, slot: HookSlot) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = slot,
            None => self.entries.push((name, slot)),
        }
    }

    /// Builder-style insert of a live hook.
    pub fn with(mut self, name: impl Into<String>, hook: HookFn) -> Self {
        self.insert(name, Some(hook));
        self
    }

    /// Builder-style disable marker.
    pub fn without(mut self, name: impl Into<String>) -> Self {
        self.insert(name, None);
        self
    }

    pub fn get(&self, name: &str) -> Option<&HookSlot> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// All entries in insertion order, disable markers included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HookSlot)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s))
    }

    /// Active (non-disabled) hooks in insertion order.
    pub fn active(&self) -> impl Iterator<Item = (&str, &HookFn)> {
        self.entries
            .iter()
            .filter_map(|(n, s)| s.as_ref().map(|hook| (n.as_str(), hook)))
    }

    /// Flatten to the ordered list of live hooks used at registration time.
    pub fn flatten(&self) -> Vec<HookFn> {
        self.active().map(|(_, hook)| hook.clone()).collect()
    }

    /// Union of `self` and `child`: child entries override same-named parent
    /// entries in place, new child identifiers append. Neither input changes.
    pub fn merged_with(&self, child: &HookMap) -> HookMap {
        let mut merged = self.clone();
        for (name, slot) in &child.entries {
            merged.insert(name.clone(), slot.clone());
        }
        merged
    }
}

impl std::fmt::Debug for HookMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (name, slot) in &self.entries {
            map.entry(name, &slot.is_some());
        }
        map.finish()
    }
}

/// Per-stage hook maps for one tree position.
#[derive(Clone, Debug, Default)]
pub struct HookConfig {
    stages: BTreeMap<LifecycleStage, HookMap>,
}

impl HookConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self, stage: LifecycleStage) -> Option<&HookMap> {
        self.stages.get(&stage)
    }

    pub fn insert(&mut self, stage: LifecycleStage, name: impl Into<String>, slot: HookSlot) {
        self.stages.entry(stage).or_default().insert(name, slot);
    }

    pub fn with(mut self, stage: LifecycleStage, name: impl Into<String>, hook: HookFn) -> Self {
        self.insert(stage, name, Some(hook));
        self
    }

    pub fn without(mut self, stage: LifecycleStage, name: impl Into<String>) -> Self {
        self.insert(stage, name, None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages with at least one entry, in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (LifecycleStage, &HookMap)> {
        self.stages.iter().map(|(stage, map)| (*stage, map))
    }

    /// Stage-wise union merge; stages present in only one input are preserved.
    pub fn merged_with(&self, child: &HookConfig) -> HookConfig {
        let mut merged = self.clone();
        for (stage, child_map) in &child.stages {
            let map = match merged.stages.get(stage) {
                Some(parent_map) => parent_map.merged_with(child_map),
                None => child_map.clone(),
            };
            merged.stages.insert(*stage, map);
        }
        merged
    }
}

/// Active-hook counts and names for one stage, as reported by the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookInfo {
    pub count: usize,
    pub names: Vec<String>,
}

impl HookInfo {
    fn empty() -> Self {
        Self {
            count: 0,
            names: Vec::new(),
        }
    }
}

/// Summarize a hook config: for every stage, how many active hooks it carries
/// and their identifiers. Absent stages yield `{count: 0, names: []}`.
///
/// Observability only; registration never consults this.
pub fn normalize_hook_info(config: &HookConfig) -> BTreeMap<LifecycleStage, HookInfo> {
    let mut info = BTreeMap::new();
    for stage in LifecycleStage::ALL {
        let entry = match config.stage(stage) {
            Some(map) => HookInfo {
                count: map.active().count(),
                names: map.active().map(|(name, _)| name.to_string()).collect(),
            },
            None => HookInfo::empty(),
        };
        info.insert(stage, entry);
    }
    info
}
