//! End-to-end engine runs over hand-built classes.

use stacklint::engine::{AnalysisContext, Engine};
use stacklint::ir::{
    CallKind, CallSite, Class, FieldAccess, Instruction, InstructionKind, LineNumber, Method,
    MethodAccess, Nullness,
};
use stacklint::opcodes;
use stacklint::rules::Severity;
use stacklint::sarif::build_sarif;
use stacklint::summaries::MethodKey;

fn inst(offset: u32, opcode: u8, kind: InstructionKind) -> Instruction {
    Instruction { offset, opcode, kind }
}

fn method(name: &str, descriptor: &str, instructions: Vec<Instruction>) -> Method {
    let code_len = instructions.last().map(|i| i.offset + 1).unwrap_or(0);
    Method {
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        access: MethodAccess::default(),
        nullness: Nullness::Unknown,
        instructions,
        code_len,
        line_numbers: vec![LineNumber { start_pc: 0, line: 10 }],
    }
}

/// A Comparable whose compareTo always answers 1.
fn broken_comparable() -> Class {
    let body = vec![
        inst(0, opcodes::ICONST_1, InstructionKind::ConstInt(1)),
        inst(1, opcodes::IRETURN, InstructionKind::Other(opcodes::IRETURN)),
    ];
    Class {
        name: "com/example/AlwaysGreater".to_string(),
        source_file: Some("AlwaysGreater.java".to_string()),
        super_name: Some("java/lang/Object".to_string()),
        interfaces: vec!["java/lang/Comparable".to_string()],
        methods: vec![method("compareTo", "(Lcom/example/AlwaysGreater;)I", body)],
    }
}

/// A class that renders another object into a String field.
fn renders_to_field() -> Class {
    let body = vec![
        inst(0, opcodes::ALOAD_0, InstructionKind::Local(0)),
        inst(1, opcodes::ALOAD_1, InstructionKind::Local(1)),
        inst(
            2,
            opcodes::INVOKEVIRTUAL,
            InstructionKind::Invoke(CallSite {
                owner: "java/lang/Object".to_string(),
                name: "toString".to_string(),
                descriptor: "()Ljava/lang/String;".to_string(),
                kind: CallKind::Virtual,
            }),
        ),
        inst(
            5,
            opcodes::PUTFIELD,
            InstructionKind::Field(FieldAccess {
                owner: "com/example/Renderer".to_string(),
                name: "rendered".to_string(),
                descriptor: "Ljava/lang/String;".to_string(),
            }),
        ),
        inst(8, opcodes::RETURN, InstructionKind::Other(opcodes::RETURN)),
    ];
    Class {
        name: "com/example/Renderer".to_string(),
        source_file: Some("Renderer.java".to_string()),
        super_name: Some("java/lang/Object".to_string()),
        interfaces: Vec::new(),
        methods: vec![method("remember", "(Ljava/lang/Object;)V", body)],
    }
}

/// Two methods where nullability flows from callee to caller.
fn nullable_pair() -> Class {
    let callee = vec![
        inst(0, opcodes::ACONST_NULL, InstructionKind::Other(opcodes::ACONST_NULL)),
        inst(1, opcodes::ARETURN, InstructionKind::Other(opcodes::ARETURN)),
    ];
    let caller = vec![
        inst(
            0,
            opcodes::INVOKESTATIC,
            InstructionKind::Invoke(CallSite {
                owner: "com/example/Sources".to_string(),
                name: "find".to_string(),
                descriptor: "()Ljava/lang/String;".to_string(),
                kind: CallKind::Static,
            }),
        ),
        inst(3, opcodes::ARETURN, InstructionKind::Other(opcodes::ARETURN)),
    ];
    Class {
        name: "com/example/Sources".to_string(),
        source_file: Some("Sources.java".to_string()),
        super_name: Some("java/lang/Object".to_string()),
        interfaces: Vec::new(),
        methods: vec![
            method("find", "()Ljava/lang/String;", callee),
            method("lookup", "()Ljava/lang/String;", caller),
        ],
    }
}

fn fixture_classes() -> Vec<Class> {
    vec![broken_comparable(), renders_to_field(), nullable_pair()]
}

#[test]
fn full_run_reports_both_detectors_and_fills_summaries() {
    let engine = Engine::new();
    let context = AnalysisContext::new(fixture_classes());
    let output = engine.analyze(&context).expect("analysis");

    let rule_ids: Vec<&str> = output.findings.iter().map(|f| f.rule_id).collect();
    assert_eq!(
        rule_ids,
        vec!["SUSPICIOUS_COMPARATOR_RETURNS", "TOSTRING_STORED_IN_FIELD"]
    );
    assert!(output.missing_classes.is_empty());

    let comparator = &output.findings[0];
    assert_eq!(comparator.class_name, "com/example/AlwaysGreater");
    assert_eq!(comparator.severity, Severity::Normal);
    assert_eq!(comparator.source_line, Some(10));

    assert!(context.can_return_null(&MethodKey::new(
        "com/example/Sources",
        "find",
        "()Ljava/lang/String;"
    )));
    assert!(context.can_return_null(&MethodKey::new(
        "com/example/Sources",
        "lookup",
        "()Ljava/lang/String;"
    )));
}

#[test]
fn fresh_contexts_give_identical_results() {
    let engine = Engine::new();
    let first = engine
        .analyze(&AnalysisContext::new(fixture_classes()))
        .expect("first run");
    let second = engine
        .analyze(&AnalysisContext::new(fixture_classes()))
        .expect("second run");
    assert_eq!(first.findings, second.findings);
    assert_eq!(first.missing_classes, second.missing_classes);
}

#[test]
fn unresolved_hierarchy_is_surfaced_not_fatal() {
    let mut class = broken_comparable();
    class.super_name = Some("com/example/NotOnPath".to_string());
    class.interfaces.clear();
    let engine = Engine::new();
    let context = AnalysisContext::new(vec![class]);
    let output = engine.analyze(&context).expect("analysis");

    assert!(output.findings.is_empty());
    assert_eq!(output.missing_classes, vec!["com/example/NotOnPath".to_string()]);
}

#[test]
fn sarif_document_lists_rules_and_findings() {
    let engine = Engine::new();
    let context = AnalysisContext::new(fixture_classes());
    let output = engine.analyze(&context).expect("analysis");

    let metadata: Vec<_> = engine.rules().iter().map(|rule| rule.metadata()).collect();
    let sarif = build_sarif(&metadata, &output);
    let value = serde_json::to_value(&sarif).expect("serialize SARIF");

    assert_eq!(value["version"], "2.1.0");
    let results = value["runs"][0]["results"].as_array().expect("results");
    assert_eq!(results.len(), 2);
    assert_eq!(
        value["runs"][0]["results"][1]["locations"][0]["physicalLocation"]["artifactLocation"]
            ["uri"],
        "Renderer.java"
    );
    let rules = value["runs"][0]["tool"]["driver"]["rules"]
        .as_array()
        .expect("rules");
    assert_eq!(rules.len(), 3);
}
