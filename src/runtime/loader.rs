//! Loading of generated units and their entry points.
//!
//! [`UnitLoader`] turns a [`UnitDefinition`] into a [`LoadedUnit`]: the definition plus the
//! unit's runtime state (its two write-once static fields and the optional original bound
//! to `backup`). Loaded units are registered by name and can be looked up again with
//! [`UnitLoader::load_unit`].
//!
//! Callers reach a unit through [`EntryPoint`]s, which check arguments against the unit's
//! calling convention before handing them to the interpreter.

use std::{
    fmt,
    path::Path,
    sync::{Arc, OnceLock},
};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{
    config::TrampolineConfig,
    diagnostics::DiagnosticCategory,
    emitter::trampoline::UnitDefinition,
    ir::instruction::{EntryPointKind, StaticField},
    metadata::{signature::ResolvedSignature, types::TypeTag},
    runtime::{
        interpreter::{invoke_native, Interpreter},
        member::NativeMethod,
        throwable::Throwable,
        value::{Object, Value},
    },
    Error, Result,
};

/// Name of the context units fall back to when no usable context is requested.
pub const DEFAULT_LOAD_CONTEXT: &str = "hookgen";

/// The context a unit is loaded into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LoadContext {
    /// The bootstrap context. It cannot see generated units, so requests for it fall back
    /// to the loader's own context.
    Boot,
    /// A named context.
    Named(String),
}

impl fmt::Display for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadContext::Boot => write!(f, "<boot>"),
            LoadContext::Named(name) => write!(f, "{name}"),
        }
    }
}

/// A unit after loading.
pub struct LoadedUnit {
    definition: UnitDefinition,
    context: LoadContext,
    config: TrampolineConfig,
    method: OnceLock<Value>,
    hook_info: OnceLock<Value>,
    backup_override: OnceLock<NativeMethod>,
}

impl LoadedUnit {
    fn new(definition: UnitDefinition, context: LoadContext, config: TrampolineConfig) -> Self {
        Self {
            definition,
            context,
            config,
            method: OnceLock::new(),
            hook_info: OnceLock::new(),
            backup_override: OnceLock::new(),
        }
    }

    /// Unique name of the unit.
    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// The generated code.
    #[must_use]
    pub fn definition(&self) -> &UnitDefinition {
        &self.definition
    }

    /// The context the unit was loaded into.
    #[must_use]
    pub fn context(&self) -> &LoadContext {
        &self.context
    }

    /// Configuration the unit was generated with.
    #[must_use]
    pub fn config(&self) -> &TrampolineConfig {
        &self.config
    }

    /// The calling convention of `backup`, `hook` and `callBackup`.
    #[must_use]
    pub fn signature(&self) -> &ResolvedSignature {
        self.definition.signature()
    }

    /// Current value of a static field, `null` before `setup` ran.
    #[must_use]
    pub fn get_static(&self, field: StaticField) -> Value {
        self.static_cell(field).get().cloned().unwrap_or(Value::Null)
    }

    /// Returns `true` once `setup` stored both static fields.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.method.get().is_some() && self.hook_info.get().is_some()
    }

    pub(crate) fn put_static(&self, field: StaticField, value: Value) -> Result<()> {
        self.static_cell(field)
            .set(value)
            .map_err(|_| Error::FieldAlreadySet(field.to_string()))
    }

    fn static_cell(&self, field: StaticField) -> &OnceLock<Value> {
        match field {
            StaticField::Method => &self.method,
            StaticField::HookInfo => &self.hook_info,
        }
    }

    /// Routes calls of `backup` to `original` instead of the placeholder body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackupAlreadyBound`] if an original is already bound.
    pub fn bind_backup<F>(&self, original: F) -> Result<()>
    where
        F: Fn(&[Value]) -> std::result::Result<Value, Throwable> + Send + Sync + 'static,
    {
        let original: NativeMethod = Arc::new(original);
        self.backup_override
            .set(original)
            .map_err(|_| Error::BackupAlreadyBound(self.name().to_string()))?;
        tracing::debug!(unit = self.name(), "bound backup");
        Ok(())
    }

    /// Returns `true` if an original is bound to `backup`.
    #[must_use]
    pub fn is_backup_bound(&self) -> bool {
        self.backup_override.get().is_some()
    }

    /// Runs an entry point without checking the arguments.
    pub(crate) fn call(&self, kind: EntryPointKind, args: &[Value]) -> Result<Value> {
        if kind == EntryPointKind::Backup {
            if let Some(original) = self.backup_override.get() {
                return invoke_native(original, args);
            }
        }
        let body = self.definition.body(kind)?;
        Interpreter::new(self, body).run(args)
    }
}

impl fmt::Debug for LoadedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedUnit")
            .field("name", &self.name())
            .field("context", &self.context)
            .field("initialized", &self.is_initialized())
            .field("backup_bound", &self.is_backup_bound())
            .finish()
    }
}

/// A callable entry point of a loaded unit.
#[derive(Debug, Clone)]
pub struct EntryPoint {
    unit: Arc<LoadedUnit>,
    kind: EntryPointKind,
}

impl EntryPoint {
    /// Creates the entry point `kind` of `unit`.
    #[must_use]
    pub fn new(unit: Arc<LoadedUnit>, kind: EntryPointKind) -> Self {
        Self { unit, kind }
    }

    /// Which entry point this is.
    #[must_use]
    pub fn kind(&self) -> EntryPointKind {
        self.kind
    }

    /// The unit owning this entry point.
    #[must_use]
    pub fn unit(&self) -> &Arc<LoadedUnit> {
        &self.unit
    }

    /// Declared parameter types, receiver first for instance targets.
    #[must_use]
    pub fn parameter_types(&self) -> Vec<TypeTag> {
        match self.kind {
            EntryPointKind::Setup => vec![
                StaticField::Method.field_type(),
                StaticField::HookInfo.field_type(),
            ],
            _ => self.unit.signature().actual_parameter_types.clone(),
        }
    }

    /// Declared return type.
    #[must_use]
    pub fn return_type(&self) -> TypeTag {
        match self.kind {
            EntryPointKind::Setup => TypeTag::Void,
            _ => self.unit.signature().return_type.clone(),
        }
    }

    /// Invokes the entry point.
    ///
    /// A primitive parameter accepts a value of its kind or a box of it. A reference
    /// parameter accepts `null` and any assignable object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArityMismatch`] or [`Error::ArgumentType`] if the arguments do not
    /// fit the signature, [`Error::Thrown`] if the call raised a failure, and
    /// [`Error::FieldAlreadySet`] when `setup` runs a second time.
    pub fn invoke(&self, args: &[Value]) -> Result<Value> {
        let parameter_types = self.parameter_types();
        if args.len() != parameter_types.len() {
            return Err(Error::ArityMismatch {
                entry: self.kind.to_string(),
                expected: parameter_types.len(),
                actual: args.len(),
            });
        }

        let args = args
            .iter()
            .zip(&parameter_types)
            .enumerate()
            .map(|(index, (arg, expected))| self.coerce(index, arg, expected))
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!(unit = self.unit.name(), entry = %self.kind, "invoke");
        self.unit.call(self.kind, &args)
    }

    fn coerce(&self, index: usize, arg: &Value, expected: &TypeTag) -> Result<Value> {
        if arg.is_assignable_to(expected) {
            return Ok(arg.clone());
        }
        if let (TypeTag::Primitive(kind), Some(object)) = (expected, arg.as_object()) {
            if let Object::Boxed(inner) = object.get() {
                if inner.primitive_kind() == Some(*kind) {
                    return Ok(inner.clone());
                }
            }
        }
        Err(Error::ArgumentType {
            entry: self.kind.to_string(),
            index,
            expected: expected.to_string(),
            actual: arg.kind_name(),
        })
    }
}

/// Registry of loaded units.
///
/// # Examples
///
/// ```rust
/// use hookgen::config::TrampolineConfig;
/// use hookgen::emitter::TrampolineBuilder;
/// use hookgen::metadata::MethodDescriptor;
/// use hookgen::runtime::{LoadContext, UnitLoader};
///
/// let loader = UnitLoader::new();
/// let unit = TrampolineBuilder::new(MethodDescriptor::constructor("app.Widget"), "Unit7").build()?;
/// let loaded = loader.generate_and_load(unit, Some(LoadContext::Boot), "/tmp/hooks", TrampolineConfig::new())?;
///
/// assert_eq!(loaded.context(), loader.own_context());
/// assert!(loader.load_unit("Unit7").is_ok());
/// # Ok::<(), hookgen::Error>(())
/// ```
#[derive(Debug)]
pub struct UnitLoader {
    units: DashMap<String, Arc<LoadedUnit>>,
    own_context: LoadContext,
}

impl Default for UnitLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitLoader {
    /// Creates an empty loader whose own context is [`DEFAULT_LOAD_CONTEXT`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_context(DEFAULT_LOAD_CONTEXT)
    }

    /// Creates an empty loader with a named own context.
    #[must_use]
    pub fn with_context(name: impl Into<String>) -> Self {
        Self {
            units: DashMap::new(),
            own_context: LoadContext::Named(name.into()),
        }
    }

    /// The context used when a request names none, or names the boot context.
    #[must_use]
    pub fn own_context(&self) -> &LoadContext {
        &self.own_context
    }

    /// Resolves the context a requested unit is loaded into.
    #[must_use]
    pub fn resolve_context(&self, requested: Option<LoadContext>) -> LoadContext {
        match requested {
            None | Some(LoadContext::Boot) => self.own_context.clone(),
            Some(context) => context,
        }
    }

    /// Loads and registers a unit.
    ///
    /// `dir` names the artifact directory of the request. Units live in memory, so it is
    /// only validated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTarget`] if `dir` is empty and [`Error::DuplicateUnit`] if a
    /// unit with the same name is already loaded. Nothing is registered on failure.
    pub fn generate_and_load(
        &self,
        definition: UnitDefinition,
        context: Option<LoadContext>,
        dir: impl AsRef<Path>,
        config: TrampolineConfig,
    ) -> Result<Arc<LoadedUnit>> {
        if dir.as_ref().as_os_str().is_empty() {
            return Err(Error::InvalidTarget(
                "artifact directory path is empty".to_string(),
            ));
        }

        let context = self.resolve_context(context);
        let name = definition.name().to_string();
        match self.units.entry(name.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateUnit(name)),
            Entry::Vacant(slot) => {
                let unit = Arc::new(LoadedUnit::new(definition, context, config));
                slot.insert(Arc::clone(&unit));

                tracing::debug!(unit = %name, context = %unit.context, "loaded unit");
                unit.config.diagnostics.info(
                    DiagnosticCategory::Loader,
                    format!("loaded {name} into {}", unit.context),
                );
                Ok(unit)
            }
        }
    }

    /// Looks up a loaded unit by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnitNotFound`] if no unit with that name is loaded.
    pub fn load_unit(&self, name: &str) -> Result<Arc<LoadedUnit>> {
        self.units
            .get(name)
            .map(|unit| Arc::clone(unit.value()))
            .ok_or_else(|| Error::UnitNotFound(name.to_string()))
    }

    /// Removes a unit from the registry. Existing handles stay usable.
    pub fn unload(&self, name: &str) -> bool {
        self.units.remove(name).is_some()
    }

    /// Number of loaded units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if no unit is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Names of all loaded units, sorted.
    #[must_use]
    pub fn unit_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.units.iter().map(|unit| unit.key().clone()).collect();
        names.sort();
        names
    }
}
