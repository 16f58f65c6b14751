//! Concurrency tests for generation and invocation.
//!
//! Trampolines are shared between threads; every invocation gets its own record, so
//! concurrent calls must neither observe each other's arguments nor lose callbacks.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use hookgen::{prelude::*, Result};
use rayon::prelude::*;

fn generator() -> TrampolineGenerator {
    TrampolineGenerator::with_config(TrampolineConfig::new().with_hooks_switch(HooksSwitch::new()))
}

fn add_descriptor() -> MethodDescriptor {
    MethodDescriptor::method("app.Calculator", "add")
        .with_flags(MemberFlags::STATIC)
        .params([TypeTag::INT, TypeTag::INT])
        .returns(TypeTag::INT)
}

fn add_trampoline(generator: &TrampolineGenerator, chain: Arc<CallbackChainInfo>) -> Result<Trampoline> {
    let trampoline = generator.start(add_descriptor(), chain, None, "/tmp/hooks")?;
    trampoline.bind_backup(|args| {
        let a = args[0].as_i32().unwrap_or_default();
        let b = args[1].as_i32().unwrap_or_default();
        Ok(Value::Int(a + b))
    })?;
    Ok(trampoline)
}

fn counting(name: &str, counter: &Arc<AtomicUsize>) -> ClosureCallback {
    let before = Arc::clone(counter);
    let after = Arc::clone(counter);
    ClosureCallback::new(name)
        .before(move |_| {
            before.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .after(move |_| {
            after.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
}

#[test]
fn test_parallel_invocations_keep_records_apart() -> Result<()> {
    let counter = Arc::new(AtomicUsize::new(0));
    let chain = Arc::new(CallbackChainInfo::new());
    chain.register(counting("counter", &counter), HookPriority::NORMAL);
    chain.register(
        ClosureCallback::new("negate").before(|record| {
            let first = record.arg(0).and_then(|v| v.as_i32()).unwrap_or_default();
            record.set_arg(0, Value::Int(-first).boxed())
        }),
        HookPriority::LOW,
    );
    let trampoline = add_trampoline(&generator(), chain)?;

    thread::scope(|scope| {
        for worker in 0..8 {
            let trampoline = &trampoline;
            scope.spawn(move || {
                for i in 0..250 {
                    let result = trampoline
                        .hook_method()
                        .invoke(&[Value::Int(i), Value::Int(worker)])
                        .unwrap();
                    assert_eq!(result, Value::Int(worker - i));
                }
            });
        }
    });

    assert_eq!(counter.load(Ordering::Relaxed), 8 * 250 * 2);
    Ok(())
}

#[test]
fn test_parallel_generation_yields_unique_units() {
    let generator = generator();
    let chain = Arc::new(CallbackChainInfo::new());

    let names: Vec<String> = (0..64)
        .into_par_iter()
        .map(|_| {
            let trampoline = add_trampoline(&generator, Arc::clone(&chain)).unwrap();
            assert_eq!(
                trampoline
                    .hook_method()
                    .invoke(&[Value::Int(40), Value::Int(2)])
                    .unwrap(),
                Value::Int(42)
            );
            trampoline.name().to_string()
        })
        .collect();

    let unique: HashSet<&String> = names.iter().collect();
    assert_eq!(unique.len(), 64);
    assert_eq!(generator.loader().len(), 64);
}

#[test]
fn test_chain_updates_during_invocation() -> Result<()> {
    let counter = Arc::new(AtomicUsize::new(0));
    let chain = Arc::new(CallbackChainInfo::new());
    let trampoline = add_trampoline(&generator(), Arc::clone(&chain))?;

    thread::scope(|scope| {
        let registrar = {
            let chain = Arc::clone(&chain);
            let counter = Arc::clone(&counter);
            scope.spawn(move || {
                for round in 0..200 {
                    let handle = chain.register(
                        counting(&format!("transient-{round}"), &counter),
                        HookPriority(round % 7),
                    );
                    assert!(chain.unregister(handle));
                }
            })
        };

        for _ in 0..4 {
            let trampoline = &trampoline;
            scope.spawn(move || {
                for i in 0..500 {
                    let result = trampoline
                        .hook_method()
                        .invoke(&[Value::Int(i), Value::Int(1)])
                        .unwrap();
                    assert_eq!(result, Value::Int(i + 1));
                }
            });
        }

        registrar.join().unwrap();
    });

    assert!(chain.is_empty());
    // A snapshot taken before an unregistration still runs both phases
    assert_eq!(counter.load(Ordering::Relaxed) % 2, 0);
    Ok(())
}

#[test]
fn test_switch_toggling_during_invocation() -> Result<()> {
    let switch = HooksSwitch::new();
    let generator =
        TrampolineGenerator::with_config(TrampolineConfig::new().with_hooks_switch(switch.clone()));
    let counter = Arc::new(AtomicUsize::new(0));
    let chain = Arc::new(CallbackChainInfo::new());
    chain.register(counting("counter", &counter), HookPriority::NORMAL);
    let trampoline = add_trampoline(&generator, chain)?;

    thread::scope(|scope| {
        scope.spawn(|| {
            for round in 0..100 {
                if round % 2 == 0 {
                    switch.disable();
                } else {
                    switch.enable();
                }
            }
            switch.enable();
        });

        for _ in 0..4 {
            scope.spawn(|| {
                for i in 0..500 {
                    let result = trampoline
                        .hook_method()
                        .invoke(&[Value::Int(i), Value::Int(i)])
                        .unwrap();
                    assert_eq!(result, Value::Int(2 * i));
                }
            });
        }
    });

    assert!(!switch.is_disabled());
    assert_eq!(counter.load(Ordering::Relaxed) % 2, 0);
    Ok(())
}
