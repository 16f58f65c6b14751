//! The public generation facade.
//!
//! [`TrampolineGenerator::start`] takes a hook target and its callback chain and returns a
//! ready-to-call [`Trampoline`]: the unit has been named, generated, loaded and set up.

use std::{path::Path, sync::Arc};

use crate::{
    config::TrampolineConfig,
    diagnostics::DiagnosticCategory,
    emitter::trampoline::{next_unit_name, TrampolineBuilder},
    ir::instruction::EntryPointKind,
    metadata::{
        member::MethodDescriptor,
        signature::{resolve, ResolvedSignature},
    },
    runtime::{
        callback::CallbackChainInfo,
        loader::{EntryPoint, LoadContext, LoadedUnit, UnitLoader},
        member::Member,
        throwable::Throwable,
        value::{Object, ObjectRef, Value},
    },
    Error, Result,
};

/// Generates, loads and sets up trampolines.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use hookgen::prelude::*;
///
/// let add = MethodDescriptor::method("app.Calculator", "add")
///     .with_flags(MemberFlags::STATIC)
///     .params([TypeTag::INT, TypeTag::INT])
///     .returns(TypeTag::INT);
///
/// let chain = Arc::new(CallbackChainInfo::new());
/// let trampoline = TrampolineGenerator::new().start(add, chain, None, "/tmp/hooks")?;
/// trampoline.bind_backup(|args| {
///     Ok(Value::Int(args[0].as_i32().unwrap_or(0) + args[1].as_i32().unwrap_or(0)))
/// })?;
///
/// let sum = trampoline.hook_method().invoke(&[Value::Int(2), Value::Int(3)])?;
/// assert_eq!(sum, Value::Int(5));
/// # Ok::<(), hookgen::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct TrampolineGenerator {
    config: TrampolineConfig,
    loader: Arc<UnitLoader>,
}

impl Default for TrampolineGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrampolineGenerator {
    /// Creates a generator with the default configuration and its own loader.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TrampolineConfig::default())
    }

    /// Creates a generator with a custom configuration.
    #[must_use]
    pub fn with_config(config: TrampolineConfig) -> Self {
        Self {
            config,
            loader: Arc::new(UnitLoader::new()),
        }
    }

    /// Uses a shared loader instead of a private one.
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<UnitLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// The generator's configuration.
    #[must_use]
    pub fn config(&self) -> &TrampolineConfig {
        &self.config
    }

    /// The loader units are registered with.
    #[must_use]
    pub fn loader(&self) -> &Arc<UnitLoader> {
        &self.loader
    }

    /// Generates a trampoline for `target`.
    ///
    /// # Arguments
    ///
    /// * `target` - The member to hook
    /// * `chain` - Its callback chain, consulted on every hook invocation
    /// * `context` - The requested load context; `None` and [`LoadContext::Boot`] fall back
    ///   to the loader's own context
    /// * `dir` - The artifact directory of the request, which must not be empty
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTarget`] for an empty `dir` and
    /// [`Error::UnsupportedTarget`] for members without a concrete body. No unit name is
    /// consumed and nothing is registered when either check fails.
    pub fn start(
        &self,
        target: impl Into<Arc<MethodDescriptor>>,
        chain: Arc<CallbackChainInfo>,
        context: Option<LoadContext>,
        dir: impl AsRef<Path>,
    ) -> Result<Trampoline> {
        self.start_member(Member::new(target), chain, context, dir)
    }

    /// Like [`start`](Self::start), with a member handle that may carry a capability to
    /// invoke the original implementation.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub fn start_member(
        &self,
        member: Member,
        chain: Arc<CallbackChainInfo>,
        context: Option<LoadContext>,
        dir: impl AsRef<Path>,
    ) -> Result<Trampoline> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(Error::InvalidTarget(
                "artifact directory path is empty".to_string(),
            ));
        }
        let target = Arc::clone(member.descriptor());
        // Rejected targets must not consume a unit name
        resolve(&target)?;

        let name = next_unit_name(&self.config.class_name_prefix);
        let definition = TrampolineBuilder::new(Arc::clone(&target), name).build()?;

        let unit = self
            .loader
            .generate_and_load(definition, context, dir, self.config.clone())?;
        let trampoline = Trampoline::new(unit);

        let member = Value::Object(ObjectRef::new(Object::Member(member)));
        let chain = Value::Object(ObjectRef::new(Object::ChainInfo(chain)));
        trampoline.setup_method().invoke(&[member, chain])?;

        tracing::debug!(unit = trampoline.name(), %target, "trampoline ready");
        self.config.diagnostics.info(
            DiagnosticCategory::Generation,
            format!("generated {} for {target}", trampoline.name()),
        );
        Ok(trampoline)
    }
}

/// The four entry points of a loaded, set-up unit.
#[derive(Debug, Clone)]
pub struct Trampoline {
    setup: EntryPoint,
    backup: EntryPoint,
    hook: EntryPoint,
    call_backup: EntryPoint,
}

impl Trampoline {
    fn new(unit: Arc<LoadedUnit>) -> Self {
        Self {
            setup: EntryPoint::new(Arc::clone(&unit), EntryPointKind::Setup),
            backup: EntryPoint::new(Arc::clone(&unit), EntryPointKind::Backup),
            hook: EntryPoint::new(Arc::clone(&unit), EntryPointKind::Hook),
            call_backup: EntryPoint::new(unit, EntryPointKind::CallBackup),
        }
    }

    /// `setup(member, info)`. Already invoked by the generator.
    #[must_use]
    pub fn setup_method(&self) -> &EntryPoint {
        &self.setup
    }

    /// `backup(...)`: the placeholder, or the bound original.
    #[must_use]
    pub fn backup_method(&self) -> &EntryPoint {
        &self.backup
    }

    /// `hook(...)`: runs the callback chain around `backup`.
    #[must_use]
    pub fn hook_method(&self) -> &EntryPoint {
        &self.hook
    }

    /// `callBackup(...)`: forwards to `backup`.
    #[must_use]
    pub fn call_backup_method(&self) -> &EntryPoint {
        &self.call_backup
    }

    /// The entry point of the given kind.
    #[must_use]
    pub fn entry_point(&self, kind: EntryPointKind) -> &EntryPoint {
        match kind {
            EntryPointKind::Setup => &self.setup,
            EntryPointKind::Backup => &self.backup,
            EntryPointKind::Hook => &self.hook,
            EntryPointKind::CallBackup => &self.call_backup,
        }
    }

    /// The loaded unit.
    #[must_use]
    pub fn unit(&self) -> &Arc<LoadedUnit> {
        self.hook.unit()
    }

    /// Unique name of the unit.
    #[must_use]
    pub fn name(&self) -> &str {
        self.unit().name()
    }

    /// The calling convention of `backup`, `hook` and `callBackup`.
    #[must_use]
    pub fn signature(&self) -> &ResolvedSignature {
        self.unit().signature()
    }

    /// Routes `backup` to the original implementation.
    ///
    /// This is where a patching layer attaches the displaced original body. Calls of
    /// `backup`, including those made by `hook` and `callBackup`, run `original` from then on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackupAlreadyBound`] if an original is already bound.
    pub fn bind_backup<F>(&self, original: F) -> Result<()>
    where
        F: Fn(&[Value]) -> std::result::Result<Value, Throwable> + Send + Sync + 'static,
    {
        self.unit().bind_backup(original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::{
        metadata::{member::MemberFlags, types::TypeTag},
        runtime::{callback::HookPriority, switches::HooksSwitch},
        test::{instance_write_log, static_add, Recorder},
    };

    fn generator() -> TrampolineGenerator {
        TrampolineGenerator::with_config(
            TrampolineConfig::new().with_hooks_switch(HooksSwitch::new()),
        )
    }

    #[test]
    fn setup_runs_once() -> Result<()> {
        let target = MethodDescriptor::method("app.Log", "write").param(TypeTag::Str);
        let chain = Arc::new(CallbackChainInfo::new());
        let trampoline = generator().start(target, Arc::clone(&chain), None, "out")?;

        assert!(trampoline.unit().is_initialized());
        let again = trampoline.setup_method().invoke(&[Value::Null, Value::Null]);
        assert!(matches!(again, Err(Error::FieldAlreadySet(_))));
        Ok(())
    }

    #[test]
    fn failed_requests_consume_nothing() {
        let generator = generator();
        let abstract_target =
            MethodDescriptor::method("app.Api", "call").with_flags(MemberFlags::ABSTRACT);
        let chain = Arc::new(CallbackChainInfo::new());

        assert!(matches!(
            generator.start(abstract_target.clone(), Arc::clone(&chain), None, ""),
            Err(Error::InvalidTarget(_))
        ));
        assert!(matches!(
            generator.start(abstract_target, chain, None, "out"),
            Err(Error::UnsupportedTarget(_))
        ));
        assert!(generator.loader().is_empty());
    }

    #[test]
    fn names_use_the_prefix() -> Result<()> {
        let generator = TrampolineGenerator::with_config(
            TrampolineConfig::new().with_class_name_prefix("Probe"),
        );
        let target = MethodDescriptor::constructor("app.Widget");
        let trampoline =
            generator.start(target, Arc::new(CallbackChainInfo::new()), None, "out")?;

        assert!(trampoline.name().starts_with("Probe"));
        assert_eq!(
            generator.loader().load_unit(trampoline.name())?.name(),
            trampoline.name()
        );
        assert_eq!(
            trampoline.entry_point(EntryPointKind::Hook).kind(),
            EntryPointKind::Hook
        );
        Ok(())
    }

    #[test]
    fn priority_orders_the_chain() -> Result<()> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = Arc::new(CallbackChainInfo::new());
        chain.register(Recorder::new("low", &log), HookPriority::LOW);
        chain.register(Recorder::new("high", &log), HookPriority::HIGH);

        let trampoline = generator().start(static_add(), chain, None, "out")?;
        trampoline
            .hook_method()
            .invoke(&[Value::Int(1), Value::Int(1)])?;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["high.before", "low.before", "low.after", "high.after"]
        );
        Ok(())
    }

    #[test]
    fn failing_callbacks_are_reported() -> Result<()> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = Arc::new(CallbackChainInfo::new());
        let mut broken = Recorder::new("broken", &log);
        broken.fail_before = true;
        broken.fail_after = true;
        chain.register(broken, HookPriority::NORMAL);

        let generator = generator();
        let trampoline = generator.start(instance_write_log(), chain, None, "out")?;
        let result = trampoline
            .hook_method()
            .invoke(&[Value::instance("app.Logger", ()), Value::string("hi")])?;

        assert_eq!(result, Value::Void);
        let reported = generator.config().diagnostics.by_unit(trampoline.name());
        assert_eq!(reported.len(), 2);
        assert!(reported[0].message.starts_with("before callback #0 (broken) failed"));
        assert!(reported[1].message.starts_with("after callback #0 (broken) failed"));
        Ok(())
    }
}
