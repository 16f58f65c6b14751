//! Benchmarks for trampoline generation and invocation.
//!
//! Measures the cost of:
//! - Calling `backup` directly and through `callBackup`
//! - Calling `hook` with an empty chain (bypass) and with a populated chain
//! - Generating and loading a unit

extern crate hookgen;

use criterion::{criterion_group, criterion_main, Criterion};
use hookgen::prelude::*;
use std::{hint::black_box, sync::Arc};

fn add_descriptor() -> MethodDescriptor {
    MethodDescriptor::method("app.Calculator", "add")
        .with_flags(MemberFlags::STATIC)
        .params([TypeTag::INT, TypeTag::INT])
        .returns(TypeTag::INT)
}

fn generator() -> TrampolineGenerator {
    TrampolineGenerator::with_config(TrampolineConfig::new().with_hooks_switch(HooksSwitch::new()))
}

fn add_trampoline(chain: Arc<CallbackChainInfo>) -> Trampoline {
    let trampoline = generator()
        .start(add_descriptor(), chain, None, "/tmp/hooks")
        .unwrap();
    trampoline
        .bind_backup(|args| {
            let a = args[0].as_i32().unwrap_or_default();
            let b = args[1].as_i32().unwrap_or_default();
            Ok(Value::Int(a + b))
        })
        .unwrap();
    trampoline
}

/// Benchmark the bound original, called through `backup` and `callBackup`.
fn bench_backup(c: &mut Criterion) {
    let trampoline = add_trampoline(Arc::new(CallbackChainInfo::new()));
    let args = [Value::Int(2), Value::Int(3)];

    c.bench_function("backup_direct", |b| {
        b.iter(|| black_box(trampoline.backup_method().invoke(black_box(&args)).unwrap()));
    });
    c.bench_function("call_backup", |b| {
        b.iter(|| {
            black_box(
                trampoline
                    .call_backup_method()
                    .invoke(black_box(&args))
                    .unwrap(),
            )
        });
    });
}

/// Benchmark `hook` with no callbacks, which takes the bypass path.
fn bench_hook_empty_chain(c: &mut Criterion) {
    let trampoline = add_trampoline(Arc::new(CallbackChainInfo::new()));
    let args = [Value::Int(2), Value::Int(3)];

    c.bench_function("hook_empty_chain", |b| {
        b.iter(|| black_box(trampoline.hook_method().invoke(black_box(&args)).unwrap()));
    });
}

/// Benchmark `hook` with three no-op callbacks, one of them rewriting an argument.
fn bench_hook_three_callbacks(c: &mut Criterion) {
    let chain = Arc::new(CallbackChainInfo::new());
    chain.register(
        ClosureCallback::new("noop-before").before(|_| Ok(())),
        HookPriority::HIGH,
    );
    chain.register(
        ClosureCallback::new("noop-after").after(|_| Ok(())),
        HookPriority::NORMAL,
    );
    chain.register(
        ClosureCallback::new("rewrite").before(|record| {
            let first = record.arg(0).and_then(|v| v.as_i32()).unwrap_or_default();
            record.set_arg(0, Value::Int(first + 1).boxed())
        }),
        HookPriority::LOW,
    );
    let trampoline = add_trampoline(chain);
    let args = [Value::Int(2), Value::Int(3)];

    c.bench_function("hook_three_callbacks", |b| {
        b.iter(|| black_box(trampoline.hook_method().invoke(black_box(&args)).unwrap()));
    });
}

/// Benchmark a complete generate, load and setup cycle.
fn bench_generation(c: &mut Criterion) {
    let generator = generator();
    let chain = Arc::new(CallbackChainInfo::new());
    let target = Arc::new(add_descriptor());

    c.bench_function("generate_unit", |b| {
        b.iter(|| {
            let trampoline = generator
                .start(Arc::clone(&target), Arc::clone(&chain), None, "/tmp/hooks")
                .unwrap();
            generator.loader().unload(trampoline.name());
            black_box(trampoline)
        });
    });
}

criterion_group!(
    benches,
    bench_backup,
    bench_hook_empty_chain,
    bench_hook_three_callbacks,
    bench_generation
);
criterion_main!(benches);
