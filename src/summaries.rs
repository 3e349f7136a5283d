//! Per-run method summaries shared across detectors.
//!
//! The table lives inside one [`crate::engine::AnalysisContext`] and is
//! dropped with it; constructing a fresh context is the reset between runs.
//! Entries are created on first mutable lookup and never removed.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::ir::CallSite;

/// Identity under which method facts are stored.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct MethodKey {
    pub class_name: String,
    pub name: String,
    pub descriptor: String,
}

impl MethodKey {
    pub fn new(
        class_name: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Key of a call target.
    pub fn of_call(call: &CallSite) -> Self {
        Self::new(call.owner.clone(), call.name.clone(), call.descriptor.clone())
    }
}

/// Facts accumulated for one method.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MethodSummary {
    pub can_return_null: bool,
}

/// Process-wide summary store for one analysis run.
#[derive(Clone, Debug, Default)]
pub struct SummaryTable {
    entries: BTreeMap<MethodKey, MethodSummary>,
}

impl SummaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary for a key, created lazily.
    pub fn summary_mut(&mut self, key: MethodKey) -> &mut MethodSummary {
        self.entries.entry(key).or_default()
    }

    /// Read-only lookup; absent keys allocate nothing.
    pub fn get(&self, key: &MethodKey) -> Option<&MethodSummary> {
        self.entries.get(key)
    }

    /// Whether a method is known to be able to return null.
    pub fn can_return_null(&self, key: &MethodKey) -> bool {
        self.entries
            .get(key)
            .map(|summary| summary.can_return_null)
            .unwrap_or(false)
    }

    /// Drop every summary, restoring the start-of-run state.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
