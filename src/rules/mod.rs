use anyhow::Result;
use serde::Serialize;

use crate::engine::AnalysisContext;

pub mod comparator_returns;
pub mod nullable_collect;
pub mod tostring_field;

/// Metadata describing an analysis rule.
#[derive(Clone, Debug)]
pub struct RuleMetadata {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub phase: RulePhase,
}

/// Execution phase: collectors populate shared summaries and must run before
/// any reporting rule can consume them.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum RulePhase {
    Collect,
    Report,
}

/// Confidence attached to a finding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub enum Severity {
    Normal,
    Low,
}

/// Structured finding emitted by a rule; rendering is the host's concern.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Finding {
    pub rule_id: &'static str,
    pub severity: Severity,
    pub class_name: String,
    pub method_name: String,
    pub descriptor: String,
    pub source_file: Option<String>,
    pub source_line: Option<u32>,
}

/// Rule interface for analysis execution.
pub trait Rule {
    fn metadata(&self) -> RuleMetadata;
    fn run(&self, context: &AnalysisContext) -> Result<Vec<Finding>>;
}

/// Wrapper struct for rule factory functions to enable inventory collection.
pub struct RuleFactory(pub fn() -> Box<dyn Rule + Sync>);

inventory::collect!(RuleFactory);

/// Macro to register a rule implementation.
///
/// Usage: `register_rule!(RuleName);`
#[macro_export]
macro_rules! register_rule {
    ($rule_type:ty) => {
        inventory::submit! {
            $crate::rules::RuleFactory(|| Box::new(<$rule_type>::default()))
        }
    };
}

/// Returns all registered rules as boxed trait objects.
pub fn all_rules() -> Vec<Box<dyn Rule + Sync>> {
    inventory::iter::<RuleFactory>
        .into_iter()
        .map(|factory| (factory.0)())
        .collect()
}
