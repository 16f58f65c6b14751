//! Shared helpers for unit tests.

use std::sync::{Arc, Mutex};

use crate::{
    config::TrampolineConfig,
    emitter::{next_unit_name, TrampolineBuilder},
    metadata::{MemberFlags, MethodDescriptor, TypeTag},
    runtime::{HookCallback, HooksSwitch, InvocationRecord, LoadedUnit, Throwable, UnitLoader},
};

/// `static int app.Calculator.add(int, int)`
pub fn static_add() -> MethodDescriptor {
    MethodDescriptor::method("app.Calculator", "add")
        .with_flags(MemberFlags::STATIC)
        .params([TypeTag::INT, TypeTag::INT])
        .returns(TypeTag::INT)
}

/// `void app.Logger.writeLog(String)`
pub fn instance_write_log() -> MethodDescriptor {
    MethodDescriptor::method("app.Logger", "writeLog").param(TypeTag::Str)
}

/// A loaded, not set up unit for [`static_add`] with a private hooks switch.
pub fn static_unit() -> Arc<LoadedUnit> {
    let definition = TrampolineBuilder::new(static_add(), next_unit_name("TestUnit"))
        .build()
        .expect("static add is hookable");
    let config = TrampolineConfig::new()
        .with_hooks_switch(HooksSwitch::new())
        .with_step_limit(10_000);
    UnitLoader::new()
        .generate_and_load(definition, None, "test-out", config)
        .expect("fresh loader accepts the unit")
}

/// Appends `<name>.<phase>` to a shared log and optionally fails a phase.
pub struct Recorder {
    pub name: String,
    pub log: Arc<Mutex<Vec<String>>>,
    pub fail_before: bool,
    pub fail_after: bool,
}

impl Recorder {
    pub fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            fail_before: false,
            fail_after: false,
        }
    }

    fn push(&self, phase: &str) {
        self.log.lock().unwrap().push(format!("{}.{phase}", self.name));
    }
}

impl HookCallback for Recorder {
    fn before_hooked_method(&self, _record: &mut InvocationRecord) -> Result<(), Throwable> {
        self.push("before");
        if self.fail_before {
            return Err(Throwable::illegal_state(format!("{} before", self.name)));
        }
        Ok(())
    }

    fn after_hooked_method(&self, _record: &mut InvocationRecord) -> Result<(), Throwable> {
        self.push("after");
        if self.fail_after {
            return Err(Throwable::illegal_state(format!("{} after", self.name)));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
