//! Collector that marks methods able to return null in the shared summary
//! table. It reports nothing itself; reporting rules consult the table.

use anyhow::Result;
use tracing::trace;

use crate::dataflow::SymbolicStack;
use crate::engine::AnalysisContext;
use crate::ir::{Method, Nullness};
use crate::opcodes;
use crate::rules::{Finding, Rule, RuleMetadata, RulePhase};
use crate::summaries::MethodKey;

/// Collects which methods can return a null reference.
#[derive(Default)]
pub(crate) struct NullableCollectRule;

crate::register_rule!(NullableCollectRule);

impl Rule for NullableCollectRule {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "COLLECT_NULLABLE_RETURNS",
            name: "Collect nullable returns",
            description: "Records methods that can return null, either by annotation or by returning a null literal or a nullable call result, for other rules to consume",
            phase: RulePhase::Collect,
        }
    }

    fn run(&self, context: &AnalysisContext) -> Result<Vec<Finding>> {
        for class in context.classes() {
            for method in &class.methods {
                if !returns_reference(&method.descriptor) {
                    continue;
                }
                let key = MethodKey::new(
                    class.name.clone(),
                    method.name.clone(),
                    method.descriptor.clone(),
                );
                if method.nullness == Nullness::Nullable {
                    trace!(method = %key.name, class = %key.class_name, "nullable by annotation");
                    context.mark_can_return_null(key);
                    continue;
                }
                if method_returns_null(context, method) {
                    trace!(method = %key.name, class = %key.class_name, "nullable by body scan");
                    context.mark_can_return_null(key);
                }
            }
        }
        Ok(Vec::new())
    }
}

/// Whether the method returns a reference type at all.
fn returns_reference(descriptor: &str) -> bool {
    match descriptor.rfind(')') {
        Some(index) => matches!(descriptor.as_bytes().get(index + 1), Some(b'L' | b'[')),
        None => false,
    }
}

/// Linear scan: does any `areturn` provably carry null, or the result of a
/// call already summarized as nullable? Replay faults abort the scan of this
/// method without marking it.
fn method_returns_null(context: &AnalysisContext, method: &Method) -> bool {
    let mut stack: SymbolicStack = SymbolicStack::new();
    for inst in &method.instructions {
        if inst.opcode == opcodes::ARETURN {
            if let Some(top) = stack.peek(0) {
                if top.is_null() {
                    return true;
                }
                if let Some(callee) = &top.returned_by {
                    if context.can_return_null(callee) {
                        return true;
                    }
                }
            }
        }
        if stack.replay(inst).is_err() {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AnalysisContext;
    use crate::ir::{
        CallKind, CallSite, Class, Instruction, InstructionKind, Method, MethodAccess, Nullness,
    };

    fn inst(offset: u32, opcode: u8, kind: InstructionKind) -> Instruction {
        Instruction { offset, opcode, kind }
    }

    fn method(name: &str, descriptor: &str, nullness: Nullness, instructions: Vec<Instruction>) -> Method {
        let code_len = instructions.last().map(|i| i.offset + 1).unwrap_or(0);
        Method {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access: MethodAccess::default(),
            nullness,
            instructions,
            code_len,
            line_numbers: Vec::new(),
        }
    }

    fn class_with_methods(name: &str, methods: Vec<Method>) -> Class {
        Class {
            name: name.to_string(),
            source_file: None,
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            methods,
        }
    }

    fn run_collector(context: &AnalysisContext) {
        let findings = NullableCollectRule.run(context).unwrap();
        assert!(findings.is_empty(), "collector must not report");
    }

    #[test]
    fn annotation_marks_without_scanning_the_body() {
        let context = AnalysisContext::new(vec![class_with_methods(
            "com/example/ClassA",
            vec![method(
                "methodOne",
                "()Ljava/lang/String;",
                Nullness::Nullable,
                Vec::new(),
            )],
        )]);
        run_collector(&context);
        assert!(context.can_return_null(&MethodKey::new(
            "com/example/ClassA",
            "methodOne",
            "()Ljava/lang/String;"
        )));
    }

    #[test]
    fn returning_the_null_literal_marks_the_method() {
        let instructions = vec![
            inst(0, opcodes::ACONST_NULL, InstructionKind::Other(opcodes::ACONST_NULL)),
            inst(1, opcodes::ARETURN, InstructionKind::Other(opcodes::ARETURN)),
        ];
        let context = AnalysisContext::new(vec![class_with_methods(
            "com/example/ClassA",
            vec![method("methodOne", "()Ljava/lang/String;", Nullness::Unknown, instructions)],
        )]);
        run_collector(&context);
        assert!(context.can_return_null(&MethodKey::new(
            "com/example/ClassA",
            "methodOne",
            "()Ljava/lang/String;"
        )));
    }

    #[test]
    fn nullability_propagates_from_callee_to_caller() {
        let callee_body = vec![
            inst(0, opcodes::ACONST_NULL, InstructionKind::Other(opcodes::ACONST_NULL)),
            inst(1, opcodes::ARETURN, InstructionKind::Other(opcodes::ARETURN)),
        ];
        let caller_body = vec![
            inst(
                0,
                opcodes::INVOKESTATIC,
                InstructionKind::Invoke(CallSite {
                    owner: "com/example/ClassA".to_string(),
                    name: "callee".to_string(),
                    descriptor: "()Ljava/lang/String;".to_string(),
                    kind: CallKind::Static,
                }),
            ),
            inst(3, opcodes::ARETURN, InstructionKind::Other(opcodes::ARETURN)),
        ];
        let context = AnalysisContext::new(vec![class_with_methods(
            "com/example/ClassA",
            vec![
                method("callee", "()Ljava/lang/String;", Nullness::Unknown, callee_body),
                method("caller", "()Ljava/lang/String;", Nullness::Unknown, caller_body),
            ],
        )]);
        run_collector(&context);
        assert!(context.can_return_null(&MethodKey::new(
            "com/example/ClassA",
            "caller",
            "()Ljava/lang/String;"
        )));
    }

    #[test]
    fn non_null_returns_leave_the_method_unmarked() {
        let instructions = vec![
            inst(0, opcodes::LDC, InstructionKind::ConstString),
            inst(2, opcodes::ARETURN, InstructionKind::Other(opcodes::ARETURN)),
        ];
        let context = AnalysisContext::new(vec![class_with_methods(
            "com/example/ClassA",
            vec![method("methodOne", "()Ljava/lang/String;", Nullness::Unknown, instructions)],
        )]);
        run_collector(&context);
        assert!(!context.can_return_null(&MethodKey::new(
            "com/example/ClassA",
            "methodOne",
            "()Ljava/lang/String;"
        )));
    }

    #[test]
    fn primitive_returning_methods_are_skipped() {
        let context = AnalysisContext::new(vec![class_with_methods(
            "com/example/ClassA",
            vec![method("size", "()I", Nullness::Nullable, Vec::new())],
        )]);
        run_collector(&context);
        assert!(context.summaries().is_empty());
    }
}
