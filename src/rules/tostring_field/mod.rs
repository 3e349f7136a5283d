//! Flags fields assigned from `toString()` output.
//!
//! A field holding a rendered string impersonates the object it was rendered
//! from: the original data is gone and the class ends up parsing its own
//! presentation. Provenance is carried as a per-slot tag through builder
//! chains, locals and duplication, and checked at every `putfield`.

use anyhow::Result;

use crate::dataflow::SymbolicStack;
use crate::engine::AnalysisContext;
use crate::ir::{CallSite, InstructionKind, Method};
use crate::opcodes;
use crate::rules::{Finding, Rule, RuleMetadata, RulePhase, Severity};

const JAVA_LANG_STRING: &str = "Ljava/lang/String;";

/// Tag carried by values whose content came out of `toString()`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Provenance {
    ToStringDerived,
}

/// Reports fields that store `toString()` results.
#[derive(Default)]
pub(crate) struct ToStringFieldRule;

crate::register_rule!(ToStringFieldRule);

impl Rule for ToStringFieldRule {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "TOSTRING_STORED_IN_FIELD",
            name: "toString result stored in field",
            description: "Storing toString() output in a field keeps a rendered representation instead of the object itself; keep the object and render on demand",
            phase: RulePhase::Report,
        }
    }

    fn run(&self, context: &AnalysisContext) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for class in context.classes() {
            for method in &class.methods {
                if method.access.is_synthetic || method.access.is_bridge {
                    continue;
                }
                scan_method(class.name.as_str(), class.source_file.as_deref(), method, &mut findings);
            }
        }
        Ok(findings)
    }
}

fn is_builder(owner: &str) -> bool {
    owner == "java/lang/StringBuilder" || owner == "java/lang/StringBuffer"
}

fn is_to_string(call: &CallSite) -> bool {
    call.name == "toString" && call.descriptor == "()Ljava/lang/String;"
}

fn is_builder_append(call: &CallSite) -> bool {
    is_builder(&call.owner)
        && call.name == "append"
        && (call.descriptor.ends_with(")Ljava/lang/StringBuilder;")
            || call.descriptor.ends_with(")Ljava/lang/StringBuffer;"))
}

/// Linear scan of one method. Each instruction is inspected against the stack
/// state just before its effect, then replayed; the tag computed during
/// inspection is applied to the replayed result. A replay fault stops the
/// scan, keeping any findings already made.
fn scan_method(
    class_name: &str,
    source_file: Option<&str>,
    method: &Method,
    findings: &mut Vec<Finding>,
) {
    let mut stack: SymbolicStack<Provenance> = SymbolicStack::new();
    for inst in &method.instructions {
        let mut result_tag = None;
        match &inst.kind {
            InstructionKind::Invoke(call) if is_to_string(call) => {
                if is_builder(&call.owner) {
                    // toString on a builder hands the builder's provenance on.
                    result_tag = stack.peek(0).and_then(|receiver| receiver.tag);
                } else {
                    result_tag = Some(Provenance::ToStringDerived);
                }
            }
            InstructionKind::Invoke(call) if is_builder_append(call) => {
                let argument_tag = stack.peek(0).and_then(|argument| argument.tag);
                let argument_is_string = stack
                    .peek(0)
                    .and_then(|argument| argument.signature.as_deref())
                    .is_some_and(|signature| signature == JAVA_LANG_STRING);
                if argument_tag.is_some() {
                    result_tag = argument_tag;
                } else if !argument_is_string {
                    // Appending a non-String goes through the argument's
                    // toString under the covers; the builder is tainted.
                    if let Some(receiver) = stack.peek_mut(1) {
                        receiver.tag = Some(Provenance::ToStringDerived);
                    }
                    result_tag = Some(Provenance::ToStringDerived);
                } else {
                    result_tag = stack.peek(1).and_then(|receiver| receiver.tag);
                }
            }
            InstructionKind::Field(_) if inst.opcode == opcodes::PUTFIELD => {
                if stack.peek(0).is_some_and(|value| value.tag.is_some()) {
                    findings.push(Finding {
                        rule_id: "TOSTRING_STORED_IN_FIELD",
                        severity: Severity::Normal,
                        class_name: class_name.to_string(),
                        method_name: method.name.clone(),
                        descriptor: method.descriptor.clone(),
                        source_file: source_file.map(str::to_string),
                        source_line: method.line_for_offset(inst.offset),
                    });
                }
            }
            _ => {}
        }
        if stack.replay(inst).is_err() {
            return;
        }
        if let Some(tag) = result_tag {
            stack.set_top_tag(tag);
        }
    }
}
