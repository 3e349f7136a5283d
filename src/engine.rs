//! Analysis driver: owns the class set, the shared summary table and the rule
//! schedule for one run.
//!
//! Collect-phase rules execute before report-phase rules so that summaries
//! written by a collector are visible to every reporter, regardless of
//! registration order. A run is single-threaded; the interior mutability on
//! the summary table exists so that reporting rules, which only hold a shared
//! reference to the context, can still record facts as they scan.

use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use anyhow::Result;
use tracing::debug;

use crate::ir::Class;
use crate::rules::{Finding, Rule, all_rules};
use crate::summaries::{MethodKey, SummaryTable};

/// Class-name prefixes treated as the platform: hierarchy walks stop at them
/// silently instead of reporting a missing class.
const PLATFORM_PREFIXES: [&str; 4] = ["java/", "javax/", "jdk/", "sun/"];

/// A named class that a hierarchy walk needed but the run did not contain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MissingClass(pub String);

impl fmt::Display for MissingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class not on the analysis path: {}", self.0)
    }
}

impl std::error::Error for MissingClass {}

/// Everything one analysis run reads and writes.
pub struct AnalysisContext {
    classes: Vec<Class>,
    class_index: BTreeMap<String, usize>,
    summaries: RefCell<SummaryTable>,
    missing_classes: RefCell<BTreeSet<String>>,
}

impl AnalysisContext {
    pub fn new(classes: Vec<Class>) -> Self {
        let class_index = classes
            .iter()
            .enumerate()
            .map(|(index, class)| (class.name.clone(), index))
            .collect();
        Self {
            classes,
            class_index,
            summaries: RefCell::new(SummaryTable::new()),
            missing_classes: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    /// Class by slashed binary name, when it is part of this run.
    pub fn class(&self, name: &str) -> Option<&Class> {
        self.class_index.get(name).map(|&index| &self.classes[index])
    }

    /// Whether `class` is or transitively implements `interface_name`.
    ///
    /// The walk covers superclasses and superinterfaces that are part of the
    /// run. Platform-prefixed names answer by name match alone; any other
    /// name that cannot be resolved aborts the walk with [`MissingClass`],
    /// since an unresolved ancestor could hide the answer.
    pub fn implements_interface(
        &self,
        class: &Class,
        interface_name: &str,
    ) -> Result<bool, MissingClass> {
        if class.name == interface_name {
            return Ok(true);
        }
        let mut queue: Vec<&str> = Vec::new();
        if let Some(super_name) = &class.super_name {
            queue.push(super_name);
        }
        for implemented in &class.interfaces {
            queue.push(implemented);
        }
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        seen.insert(&class.name);

        while let Some(name) = queue.pop() {
            if name == interface_name {
                return Ok(true);
            }
            if !seen.insert(name) {
                continue;
            }
            if is_platform_class(name) {
                continue;
            }
            let Some(current) = self.class(name) else {
                return Err(MissingClass(name.to_string()));
            };
            if let Some(super_name) = &current.super_name {
                queue.push(super_name);
            }
            for implemented in &current.interfaces {
                queue.push(implemented);
            }
        }
        Ok(false)
    }

    /// Record a class a rule needed but could not resolve.
    pub fn report_missing_class(&self, missing: &MissingClass) {
        self.missing_classes.borrow_mut().insert(missing.0.clone());
    }

    /// Whether the summary table knows `key` can return null.
    pub fn can_return_null(&self, key: &MethodKey) -> bool {
        self.summaries.borrow().can_return_null(key)
    }

    /// Record that `key` can return null.
    pub fn mark_can_return_null(&self, key: MethodKey) {
        self.summaries.borrow_mut().summary_mut(key).can_return_null = true;
    }

    /// Missing classes recorded so far, deduplicated and sorted.
    pub fn missing_classes(&self) -> Vec<String> {
        self.missing_classes.borrow().iter().cloned().collect()
    }

    pub fn summaries(&self) -> Ref<'_, SummaryTable> {
        self.summaries.borrow()
    }

    /// Consume the context, keeping the accumulated summaries.
    pub fn into_summaries(self) -> SummaryTable {
        self.summaries.into_inner()
    }
}

fn is_platform_class(name: &str) -> bool {
    PLATFORM_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Result of one engine run.
#[derive(Clone, Debug, Default)]
pub struct EngineOutput {
    pub findings: Vec<Finding>,
    /// Classes some rule needed but the run did not contain, deduplicated.
    pub missing_classes: Vec<String>,
}

/// Runs every registered rule over a context, collectors first.
pub struct Engine {
    rules: Vec<Box<dyn Rule + Sync>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        let mut rules = all_rules();
        rules.sort_by_key(|rule| {
            let meta = rule.metadata();
            (meta.phase, meta.id)
        });
        Self { rules }
    }

    pub fn rules(&self) -> &[Box<dyn Rule + Sync>] {
        &self.rules
    }

    pub fn analyze(&self, context: &AnalysisContext) -> Result<EngineOutput> {
        let mut findings = Vec::new();
        for rule in &self.rules {
            let meta = rule.metadata();
            debug!(rule = meta.id, "running rule");
            let mut produced = rule.run(context)?;
            debug!(rule = meta.id, findings = produced.len(), "rule finished");
            findings.append(&mut produced);
        }
        findings.sort_by(|a, b| {
            (a.rule_id, &a.class_name, &a.method_name, a.source_line).cmp(&(
                b.rule_id,
                &b.class_name,
                &b.method_name,
                b.source_line,
            ))
        });
        let missing_classes = context.missing_classes();
        Ok(EngineOutput {
            findings,
            missing_classes,
        })
    }
}
