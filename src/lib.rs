//! Heuristic pattern detectors for decoded JVM method bytecode.
//!
//! The crate replays each method's instruction stream over a symbolic operand
//! stack ([`dataflow::SymbolicStack`]), tracking per-slot provenance tags,
//! known constants and call-result attribution, and classifies methods with a
//! set of [`rules`]. The host supplies fully decoded instructions ([`ir`]);
//! class-file parsing, JAR walking and report formatting stay on the host
//! side. Findings come back as structured [`rules::Finding`] values and can be
//! rendered to SARIF with [`sarif::build_sarif`].
//!
//! A run is strictly single-threaded: one [`engine::AnalysisContext`] per run,
//! one class at a time, one method at a time.

pub mod dataflow;
pub mod descriptor;
pub mod engine;
pub mod ir;
pub mod logging;
pub mod opcodes;
pub mod rules;
pub mod sarif;
pub mod summaries;

pub use engine::{AnalysisContext, Engine, EngineOutput, MissingClass};
pub use rules::{Finding, Severity};
pub use summaries::{MethodKey, MethodSummary, SummaryTable};
