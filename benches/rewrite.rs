//! Benchmarks for the rule pipeline.
//!
//! Measures rewriting of synthetic classes:
//! - Methods with guarded and unguarded handlers
//! - Native declarations
//! - Parallel versus sequential class rewriting

extern crate sandscope;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sandscope::{
    assembly::{Instruction, Label, MemberRef, Opcode},
    config::SandboxConfig,
    metadata::{AccessFlags, Member},
    rules::{ClassSource, MethodSource, RulePipeline},
};
use std::hint::black_box;

const OWNER: &str = "com/example/Bench";

/// A method with `handlers` sequential try/catch blocks, alternating guarded and plain types.
fn handler_method(index: usize, handlers: u32) -> MethodSource {
    let mut code = Vec::new();
    for h in 0..handlers {
        let base = h * 4;
        let type_name = if h % 2 == 0 {
            "java/lang/Throwable"
        } else {
            "java/lang/Exception"
        };
        code.push(Instruction::try_catch(
            Label(base),
            Label(base + 1),
            Label(base + 2),
            Some(type_name),
        ));
    }
    for h in 0..handlers {
        let base = h * 4;
        code.extend([
            Instruction::Label(Label(base)),
            Instruction::local(Opcode::Aload, 0),
            Instruction::invoke(Opcode::Invokevirtual, MemberRef::new(OWNER, "step", "()V")),
            Instruction::Label(Label(base + 1)),
            Instruction::jump(Opcode::Goto, Label(base + 3)),
            Instruction::Label(Label(base + 2)),
            Instruction::local(Opcode::Astore, 1),
            Instruction::Label(Label(base + 3)),
        ]);
    }
    code.push(Instruction::op(Opcode::Return));

    let member = Member::new(OWNER, format!("m{index}"), "()V", AccessFlags::PUBLIC);
    MethodSource::new(member, code)
}

fn native_method(index: usize) -> MethodSource {
    MethodSource::declaration(Member::new(
        OWNER,
        format!("n{index}"),
        "(I)J",
        AccessFlags::PUBLIC | AccessFlags::NATIVE,
    ))
}

fn class(methods: usize, handlers: u32) -> ClassSource {
    let methods = (0..methods)
        .map(|i| {
            if i % 8 == 7 {
                native_method(i)
            } else {
                handler_method(i, handlers)
            }
        })
        .collect();
    ClassSource::new(OWNER, methods)
}

fn bench_rewrite_method(c: &mut Criterion) {
    let pipeline = RulePipeline::with_default_rules(SandboxConfig::sequential());
    let mut group = c.benchmark_group("rewrite_method");

    for handlers in [1, 16, 128] {
        let source = handler_method(0, handlers);
        group.throughput(Throughput::Elements(source.instructions.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(handlers), &source, |b, source| {
            b.iter(|| {
                let ctx = pipeline.context();
                let method = pipeline.rewrite_method(&ctx, black_box(source)).unwrap();
                black_box(method)
            });
        });
    }
    group.finish();
}

fn bench_rewrite_class(c: &mut Criterion) {
    let source = class(256, 8);
    let mut group = c.benchmark_group("rewrite_class");
    group.throughput(Throughput::Elements(source.methods.len() as u64));

    for (name, config) in [
        ("parallel", SandboxConfig::default()),
        ("sequential", SandboxConfig::sequential()),
    ] {
        let pipeline = RulePipeline::with_default_rules(config);
        group.bench_function(name, |b| {
            b.iter(|| {
                let rewritten = pipeline.rewrite_class(black_box(source.clone())).unwrap();
                black_box(rewritten)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rewrite_method, bench_rewrite_class);
criterion_main!(benches);
