//! Catch guard integration tests.
//!
//! These drive [`RulePipeline`] through the public API only:
//! 1. Build a method body with handler regions
//! 2. Rewrite it with the default rules
//! 3. Check the inserted runtime checks, the recorded warnings and the stack accounting

use sandscope::{
    assembly::{Instruction, Label, MemberRef, Opcode},
    config::SandboxConfig,
    metadata::{AccessFlags, Member},
    rules::{
        ClassSource, MethodSource, RewrittenClass, RulePipeline, Severity, DISALLOWED_CATCH_TYPES,
    },
    runtime::{check_catch, CatchCheck, CHECK_CATCH_DESCRIPTOR, CHECK_CATCH_NAME},
    Error, Result,
};

const OWNER: &str = "com/example/Task";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn member(name: &str) -> Member {
    Member::new(OWNER, name, "()V", AccessFlags::PUBLIC)
}

fn check_call() -> Instruction {
    Instruction::invoke(
        Opcode::Invokestatic,
        MemberRef::new(
            "sandbox/RuntimeCostAccounter",
            CHECK_CATCH_NAME,
            CHECK_CATCH_DESCRIPTOR,
        ),
    )
}

/// `try { this.work(); } catch (type_name e) { return; }`
fn guarded(type_name: &str) -> Vec<Instruction> {
    vec![
        Instruction::try_catch(Label(0), Label(1), Label(2), Some(type_name)),
        Instruction::Label(Label(0)),
        Instruction::local(Opcode::Aload, 0),
        Instruction::invoke(Opcode::Invokevirtual, MemberRef::new(OWNER, "work", "()V")),
        Instruction::Label(Label(1)),
        Instruction::op(Opcode::Return),
        Instruction::Label(Label(2)),
        Instruction::local(Opcode::Astore, 1),
        Instruction::op(Opcode::Return),
    ]
}

fn rewrite(pipeline: &RulePipeline, methods: Vec<MethodSource>) -> Result<RewrittenClass> {
    pipeline.rewrite_class(ClassSource::new(OWNER, methods))
}

#[test]
fn test_error_handler_scenario() -> Result<()> {
    init_logging();
    let pipeline = RulePipeline::default();

    let handler_body = vec![
        Instruction::local(Opcode::Astore, 1),
        Instruction::op(Opcode::Return),
    ];
    let mut input = vec![
        Instruction::try_catch(Label(0), Label(0), Label(1), Some("java/lang/Error")),
        Instruction::Label(Label(1)),
    ];
    input.extend(handler_body.clone());

    let class = rewrite(&pipeline, vec![MethodSource::new(member("run"), input.clone())])?;
    let code = &class.methods[0].instructions;

    let mut expected = vec![
        input[0].clone(),
        Instruction::Label(Label(1)),
        Instruction::op(Opcode::Dup),
        check_call(),
    ];
    expected.extend(handler_body);
    assert_eq!(code, &expected);

    let warnings: Vec<_> = class.messages.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("java.lang.Error"));
    assert_eq!(warnings[0].rule.as_deref(), Some("CatchGuardRule"));
    Ok(())
}

#[test]
fn test_every_disallowed_type_is_guarded() -> Result<()> {
    let pipeline = RulePipeline::default();

    for type_name in DISALLOWED_CATCH_TYPES {
        let class = rewrite(&pipeline, vec![MethodSource::new(member("run"), guarded(type_name))])?;
        let method = &class.methods[0];

        let position = method
            .instructions
            .iter()
            .position(|i| *i == Instruction::Label(Label(2)))
            .unwrap();
        assert_eq!(method.instructions[position + 1].opcode(), Some(Opcode::Dup));
        assert_eq!(method.instructions[position + 2], check_call());
        assert_eq!(method.max_stack, 2, "{type_name}");
        assert_eq!(method.extra_stack, 1, "{type_name}");
        assert_eq!(class.messages.warnings().count(), 1, "{type_name}");
    }
    Ok(())
}

#[test]
fn test_allowed_types_untouched() -> Result<()> {
    let pipeline = RulePipeline::default();

    for type_name in [
        "java/lang/Exception",
        "java/lang/RuntimeException",
        "java/lang/IllegalStateException",
        "java/lang/AssertionError",
    ] {
        let input = guarded(type_name);
        let class = rewrite(&pipeline, vec![MethodSource::new(member("run"), input.clone())])?;
        assert_eq!(class.methods[0].instructions, input, "{type_name}");
        assert_eq!(class.methods[0].extra_stack, 0);
        assert!(class.messages.is_empty());
    }
    Ok(())
}

#[test]
fn test_shared_handler_instrumented_once() -> Result<()> {
    let pipeline = RulePipeline::default();
    let input = vec![
        Instruction::try_catch(Label(0), Label(1), Label(2), Some("java/lang/Error")),
        Instruction::try_catch(Label(0), Label(1), Label(2), Some("java/lang/Throwable")),
        Instruction::try_catch(Label(0), Label(1), Label(2), Some("java/lang/Exception")),
        Instruction::Label(Label(0)),
        Instruction::op(Opcode::Nop),
        Instruction::Label(Label(1)),
        Instruction::op(Opcode::Return),
        Instruction::Label(Label(2)),
        Instruction::op(Opcode::Athrow),
    ];

    let class = rewrite(&pipeline, vec![MethodSource::new(member("run"), input)])?;
    let checks = class.methods[0]
        .instructions
        .iter()
        .filter(|i| **i == check_call())
        .count();
    assert_eq!(checks, 1);
    assert_eq!(class.messages.warnings().count(), 2);
    Ok(())
}

#[test]
fn test_catch_any_not_guarded() -> Result<()> {
    let pipeline = RulePipeline::default();
    let input = vec![
        Instruction::try_catch(Label(0), Label(1), Label(2), None),
        Instruction::Label(Label(0)),
        Instruction::op(Opcode::Nop),
        Instruction::Label(Label(1)),
        Instruction::op(Opcode::Return),
        Instruction::Label(Label(2)),
        Instruction::op(Opcode::Athrow),
    ];

    let class = rewrite(&pipeline, vec![MethodSource::new(member("run"), input.clone())])?;
    assert_eq!(class.methods[0].instructions, input);
    assert!(class.messages.is_empty());
    Ok(())
}

#[test]
fn test_reused_labels_do_not_cross_methods() -> Result<()> {
    let pipeline = RulePipeline::default();
    let plain = vec![
        Instruction::Label(Label(2)),
        Instruction::op(Opcode::Return),
    ];

    let class = rewrite(
        &pipeline,
        vec![
            MethodSource::new(member("guarded"), guarded("java/lang/Throwable")),
            MethodSource::new(member("plain"), plain.clone()),
        ],
    )?;
    assert_eq!(class.methods[1].instructions, plain);
    Ok(())
}

#[test]
fn test_unreached_handler_fails() {
    let pipeline = RulePipeline::with_default_rules(SandboxConfig::sequential());
    let input = vec![
        Instruction::try_catch(Label(0), Label(1), Label(9), Some("java/lang/Error")),
        Instruction::op(Opcode::Return),
    ];

    let result = rewrite(&pipeline, vec![MethodSource::new(member("run"), input)]);
    match result {
        Err(Error::UnresolvedHandler { method, label }) => {
            assert_eq!(method, "com/example/Task.run()V");
            assert_eq!(label, Label(9));
        }
        other => panic!("expected an unresolved handler, got {other:?}"),
    }
}

#[test]
fn test_parallel_matches_sequential() -> Result<()> {
    let methods: Vec<_> = ["java/lang/Error", "java/lang/Exception", "java/lang/Throwable"]
        .iter()
        .cycle()
        .take(24)
        .enumerate()
        .map(|(i, type_name)| MethodSource::new(member(&format!("m{i}")), guarded(type_name)))
        .collect();

    let parallel = rewrite(&RulePipeline::default(), methods.clone())?;
    let sequential = rewrite(
        &RulePipeline::with_default_rules(SandboxConfig::sequential()),
        methods,
    )?;

    assert_eq!(parallel.methods.len(), sequential.methods.len());
    for (p, s) in parallel.methods.iter().zip(&sequential.methods) {
        assert_eq!(p.member.member_name, s.member.member_name);
        assert_eq!(p.instructions, s.instructions);
        assert_eq!(p.max_stack, s.max_stack);
    }
    assert_eq!(parallel.messages.len(), sequential.messages.len());
    assert_eq!(parallel.messages.len(), 16);
    Ok(())
}

#[test]
fn test_minimum_severity_filters_messages() -> Result<()> {
    let methods = vec![MethodSource::new(member("run"), guarded("java/lang/Error"))];

    let verbose = rewrite(
        &RulePipeline::with_default_rules(SandboxConfig::verbose()),
        methods.clone(),
    )?;
    assert_eq!(verbose.messages.filter_severity(Severity::Trace).count(), 1);
    assert_eq!(verbose.messages.warnings().count(), 1);

    let quiet = rewrite(
        &RulePipeline::with_default_rules(SandboxConfig {
            minimum_severity: Severity::Error,
            ..SandboxConfig::default()
        }),
        methods,
    )?;
    assert!(quiet.messages.is_empty());
    assert_eq!(quiet.methods[0].extra_stack, 1);
    Ok(())
}

#[test]
fn test_runtime_check_decisions() {
    let overflow = [
        "java/lang/StackOverflowError",
        "java/lang/VirtualMachineError",
        "java/lang/Error",
        "java/lang/Throwable",
    ];
    assert_eq!(
        check_catch(&overflow),
        CatchCheck::Rethrow("java/lang/VirtualMachineError")
    );

    let state = [
        "java/lang/IllegalStateException",
        "java/lang/RuntimeException",
        "java/lang/Exception",
        "java/lang/Throwable",
    ];
    assert_eq!(check_catch(&state), CatchCheck::Allow);
}

fn check_count(code: &[Instruction]) -> usize {
    code.iter().filter(|i| **i == check_call()).count()
}

#[test]
fn test_line_label_before_branch_target() -> Result<()> {
    // try { take(c ? 1 : 2); } catch (Error e) { }
    let input = vec![
        Instruction::try_catch(Label(10), Label(11), Label(12), Some("java/lang/Error")),
        Instruction::Label(Label(10)),
        Instruction::local(Opcode::Aload, 0),
        Instruction::local(Opcode::Iload, 1),
        Instruction::jump(Opcode::Ifeq, Label(1)),
        Instruction::op(Opcode::Iconst1),
        Instruction::jump(Opcode::Goto, Label(2)),
        Instruction::Label(Label(5)),
        Instruction::LineNumber {
            line: 7,
            start: Label(5),
        },
        Instruction::Label(Label(1)),
        Instruction::op(Opcode::Iconst2),
        Instruction::Label(Label(2)),
        Instruction::invoke(Opcode::Invokevirtual, MemberRef::new(OWNER, "take", "(I)V")),
        Instruction::Label(Label(11)),
        Instruction::op(Opcode::Return),
        Instruction::Label(Label(12)),
        Instruction::local(Opcode::Astore, 2),
        Instruction::op(Opcode::Return),
    ];

    let class = rewrite(
        &RulePipeline::default(),
        vec![MethodSource::new(member("run"), input.clone())],
    )?;
    let method = &class.methods[0];
    assert_eq!(method.instructions.len(), input.len() + 2);
    assert_eq!(method.instructions[16], Instruction::op(Opcode::Dup));
    assert_eq!(check_count(&method.instructions), 1);
    assert_eq!(method.max_stack, 2);
    assert_eq!(method.extra_stack, 0);
    assert_eq!(class.messages.warnings().count(), 1);
    Ok(())
}

#[test]
fn test_dead_code_filler_after_goto() -> Result<()> {
    // NOP ... ATHROW left behind where a compiler removed unreachable code
    let input = vec![
        Instruction::try_catch(Label(0), Label(1), Label(3), Some("java/lang/Throwable")),
        Instruction::Label(Label(0)),
        Instruction::jump(Opcode::Goto, Label(2)),
        Instruction::Label(Label(4)),
        Instruction::op(Opcode::Nop),
        Instruction::op(Opcode::Athrow),
        Instruction::Label(Label(2)),
        Instruction::Label(Label(1)),
        Instruction::op(Opcode::Return),
        Instruction::Label(Label(3)),
        Instruction::op(Opcode::Athrow),
    ];

    let class = rewrite(
        &RulePipeline::with_default_rules(SandboxConfig::sequential()),
        vec![MethodSource::new(member("run"), input.clone())],
    )?;
    let method = &class.methods[0];
    assert_eq!(method.instructions.len(), input.len() + 2);
    assert_eq!(check_count(&method.instructions), 1);
    assert_eq!(method.instructions[11], check_call());
    assert_eq!(method.max_stack, 2);
    Ok(())
}
