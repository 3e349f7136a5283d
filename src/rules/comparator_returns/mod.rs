//! Flags comparison methods whose return values cannot satisfy the contract.
//!
//! `compareTo` and `compare` must be able to answer negative, zero and
//! positive, and an unconditionally returned non-zero answer breaks the
//! reflexivity requirement outright. Return values are recovered from the
//! symbolic stack; reachability of each `ireturn` comes from the forward
//! branch tracker.

use anyhow::Result;
use tracing::trace;

use crate::dataflow::{BranchTracker, StackValue, SymbolicStack};
use crate::descriptor::method_param_count;
use crate::engine::AnalysisContext;
use crate::ir::{Class, InstructionKind, Method};
use crate::opcodes;
use crate::rules::{Finding, Rule, RuleMetadata, RulePhase, Severity};

const UNSUPPORTED_OPERATION: &str = "Ljava/lang/UnsupportedOperationException;";

/// An interface and the comparison method it prescribes.
struct CompareSpec {
    interface: &'static str,
    method_name: &'static str,
    argument_count: usize,
    return_suffix: &'static str,
}

/// The comparison contracts this rule knows about, checked in order; the
/// first interface a class implements wins.
fn builtin_specs() -> [CompareSpec; 2] {
    [
        CompareSpec {
            interface: "java/lang/Comparable",
            method_name: "compareTo",
            argument_count: 1,
            return_suffix: ")I",
        },
        CompareSpec {
            interface: "java/util/Comparator",
            method_name: "compare",
            argument_count: 2,
            return_suffix: ")I",
        },
    ]
}

/// What one method scan concluded.
enum ScanOutcome {
    Completed(ReturnShape),
    /// The method does something the linear model cannot follow; no verdict.
    Indeterminate,
}

/// Signs seen across every `ireturn`, plus whether any non-zero return was
/// reachable only by fall-through.
#[derive(Clone, Copy, Debug, Default)]
struct ReturnShape {
    seen_negative: bool,
    seen_zero: bool,
    seen_positive: bool,
    seen_unconditional_non_zero: bool,
}

/// Reports comparison methods with a suspicious return-value shape.
#[derive(Default)]
pub(crate) struct ComparatorReturnsRule;

crate::register_rule!(ComparatorReturnsRule);

impl Rule for ComparatorReturnsRule {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "SUSPICIOUS_COMPARATOR_RETURNS",
            name: "Suspicious comparator return values",
            description: "A compareTo or compare implementation that cannot return all of negative, zero and positive, or that returns non-zero unconditionally, violates the comparison contract",
            phase: RulePhase::Report,
        }
    }

    fn run(&self, context: &AnalysisContext) -> Result<Vec<Finding>> {
        let specs = builtin_specs();
        let mut findings = Vec::new();
        for class in context.classes() {
            let spec = match matching_spec(context, class, &specs) {
                Ok(Some(spec)) => spec,
                Ok(None) => continue,
                Err(missing) => {
                    trace!(class = %class.name, missing = %missing.0, "hierarchy incomplete, skipping");
                    context.report_missing_class(&missing);
                    continue;
                }
            };
            for method in &class.methods {
                if !is_comparison_method(method, spec) {
                    continue;
                }
                match scan_method(method) {
                    ScanOutcome::Indeterminate => {}
                    ScanOutcome::Completed(shape) => {
                        if let Some(severity) = verdict(method, shape) {
                            findings.push(Finding {
                                rule_id: "SUSPICIOUS_COMPARATOR_RETURNS",
                                severity,
                                class_name: class.name.clone(),
                                method_name: method.name.clone(),
                                descriptor: method.descriptor.clone(),
                                source_file: class.source_file.clone(),
                                source_line: method.line_for_offset(0),
                            });
                        }
                    }
                }
            }
        }
        Ok(findings)
    }
}

fn matching_spec<'a>(
    context: &AnalysisContext,
    class: &Class,
    specs: &'a [CompareSpec],
) -> Result<Option<&'a CompareSpec>, crate::engine::MissingClass> {
    for spec in specs {
        if context.implements_interface(class, spec.interface)? {
            return Ok(Some(spec));
        }
    }
    Ok(None)
}

fn is_comparison_method(method: &Method, spec: &CompareSpec) -> bool {
    if method.access.is_synthetic || method.access.is_bridge {
        return false;
    }
    method.name == spec.method_name
        && method.descriptor.ends_with(spec.return_suffix)
        && method_param_count(&method.descriptor)
            .map(|count| count == spec.argument_count)
            .unwrap_or(false)
}

/// Linear scan of one comparison method, recovering the sign of every
/// `ireturn` and its reachability.
fn scan_method(method: &Method) -> ScanOutcome {
    let mut stack: SymbolicStack = SymbolicStack::new();
    let mut tracker = BranchTracker::new();
    let mut shape = ReturnShape::default();

    for inst in &method.instructions {
        match &inst.kind {
            InstructionKind::Branch(target) => match inst.opcode {
                opcodes::GOTO | opcodes::GOTO_W => {
                    // A goto with operands pending is ternary plumbing the
                    // linear model cannot follow.
                    if stack.depth() > 0 {
                        return ScanOutcome::Indeterminate;
                    }
                    if *target > inst.offset {
                        tracker.observe_branch(*target);
                    }
                }
                _ => {
                    if *target > inst.offset {
                        tracker.observe_branch(*target);
                    }
                }
            },
            InstructionKind::Switch(targets) => {
                tracker.observe_switch_default(targets.default_target);
            }
            _ => match inst.opcode {
                opcodes::IRETURN => {
                    let Some(value) = stack.peek(0).and_then(StackValue::int_constant) else {
                        return ScanOutcome::Indeterminate;
                    };
                    if value < 0 {
                        shape.seen_negative = true;
                    } else if value > 0 {
                        shape.seen_positive = true;
                    } else {
                        shape.seen_zero = true;
                    }
                    if value != 0 && tracker.is_unconditional(inst.offset) {
                        shape.seen_unconditional_non_zero = true;
                    }
                }
                opcodes::ATHROW => {
                    // Throwing UnsupportedOperationException is the accepted
                    // way to stub a comparison out; leave the method alone.
                    let is_unsupported = stack
                        .peek(0)
                        .and_then(|value| value.signature.as_deref())
                        .is_some_and(|signature| signature == UNSUPPORTED_OPERATION);
                    if is_unsupported {
                        return ScanOutcome::Indeterminate;
                    }
                }
                _ => {}
            },
        }
        if stack.replay(inst).is_err() {
            return ScanOutcome::Indeterminate;
        }
    }
    ScanOutcome::Completed(shape)
}

/// Contract check over the collected shape. A lone `return 0` stub short
/// enough to be nothing but the constant is tolerated.
fn verdict(method: &Method, shape: ReturnShape) -> Option<Severity> {
    let seen_all = shape.seen_negative && shape.seen_zero && shape.seen_positive;
    let beyond_stub =
        !shape.seen_zero || shape.seen_unconditional_non_zero || method.code_len > 2;
    if beyond_stub && (!seen_all || shape.seen_unconditional_non_zero) {
        Some(if seen_all { Severity::Low } else { Severity::Normal })
    } else {
        None
    }
}
