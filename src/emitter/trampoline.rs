//! Declaration of generated units.
//!
//! [`TrampolineBuilder`] turns a [`MethodDescriptor`] into a [`UnitDefinition`]: a uniquely
//! named unit that owns two static fields and four entry points sharing one calling
//! convention. The hook body comes from [`CallbackChainEmitter`]; the remaining bodies are
//! small enough to be emitted here.
//!
//! # Generated Unit
//!
//! | Member | Kind | Purpose |
//! |--------|------|---------|
//! | `method` | static field | member handle of the target |
//! | `additionalHookInfo` | static field | callback chain of the target |
//! | `setup(member, info)` | entry point | stores both handles, exactly once |
//! | `backup(...)` | entry point | placeholder returning the type's default |
//! | `hook(...)` | entry point | runs the callback chain around `backup` |
//! | `callBackup(...)` | entry point | forwards to `backup` |

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::{
    emitter::{boxing::default_constant, chain::CallbackChainEmitter},
    ir::{
        body::MethodBody,
        code::CodeBuilder,
        instruction::{EntryPointKind, Instruction, StaticField},
    },
    metadata::{
        member::MethodDescriptor,
        signature::{resolve, ResolvedSignature},
        types::TypeTag,
    },
    Result,
};

/// Default prefix of generated unit names.
pub const DEFAULT_CLASS_NAME_PREFIX: &str = "EdHooker";

static UNIT_NAME_SUFFIX: AtomicU64 = AtomicU64::new(1);

/// Allocates the next unit name for `prefix`.
///
/// The numeric suffix comes from a process-wide counter that starts at 1 and is shared by
/// all prefixes, so two calls never return the same name.
pub fn next_unit_name(prefix: &str) -> String {
    let suffix = UNIT_NAME_SUFFIX.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}{suffix}")
}

/// A static field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Which field
    pub field: StaticField,
    /// Declared type
    pub field_type: TypeTag,
}

/// An entry point declaration with its body.
#[derive(Debug, Clone)]
pub struct MethodDefinition {
    /// Which entry point
    pub kind: EntryPointKind,
    /// The finalized body
    pub body: MethodBody,
}

/// A generated unit before it is loaded.
#[derive(Debug, Clone)]
pub struct UnitDefinition {
    name: String,
    target: Arc<MethodDescriptor>,
    signature: ResolvedSignature,
    fields: Vec<FieldDefinition>,
    methods: Vec<MethodDefinition>,
}

impl UnitDefinition {
    /// Unique name of the unit.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptor of the hook target.
    #[must_use]
    pub fn target(&self) -> &Arc<MethodDescriptor> {
        &self.target
    }

    /// The calling convention shared by `backup`, `hook` and `callBackup`.
    #[must_use]
    pub fn signature(&self) -> &ResolvedSignature {
        &self.signature
    }

    /// Static field declarations, in generation order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Entry point declarations, in generation order.
    #[must_use]
    pub fn methods(&self) -> &[MethodDefinition] {
        &self.methods
    }

    /// Body of an entry point.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the unit does not declare the entry point.
    pub fn body(&self, kind: EntryPointKind) -> Result<&MethodBody> {
        self.methods
            .iter()
            .find(|method| method.kind == kind)
            .map(|method| &method.body)
            .ok_or_else(|| malformed_error!("Unit '{}' declares no '{}'", self.name, kind))
    }
}

impl fmt::Display for UnitDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ".unit {} ; hooks {}", self.name, self.target)?;
        for field in &self.fields {
            writeln!(f, ".field static {}: {}", field.field, field.field_type)?;
        }
        for method in &self.methods {
            writeln!(f)?;
            write!(f, "{}", method.body)?;
        }
        Ok(())
    }
}

/// Builds the [`UnitDefinition`] for one hook target.
///
/// # Examples
///
/// ```rust
/// use hookgen::emitter::TrampolineBuilder;
/// use hookgen::ir::EntryPointKind;
/// use hookgen::metadata::{MethodDescriptor, TypeTag};
///
/// let target = MethodDescriptor::method("app.Log", "write").param(TypeTag::Str);
/// let unit = TrampolineBuilder::new(target, "EdHooker42").build()?;
///
/// assert_eq!(unit.name(), "EdHooker42");
/// assert_eq!(unit.fields().len(), 2);
/// assert_eq!(unit.methods().len(), 4);
/// assert_eq!(unit.body(EntryPointKind::Hook)?.param_count(), 2);
/// # Ok::<(), hookgen::Error>(())
/// ```
pub struct TrampolineBuilder {
    target: Arc<MethodDescriptor>,
    name: String,
}

impl TrampolineBuilder {
    /// Creates a builder for `target`, naming the unit `name`.
    pub fn new(target: impl Into<Arc<MethodDescriptor>>, name: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            name: name.into(),
        }
    }

    /// Resolves the target's signature and generates the unit.
    ///
    /// Generation order is fields, `setup`, `backup`, `hook`, `callBackup`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnsupportedTarget`] if the target cannot be hooked.
    pub fn build(self) -> Result<UnitDefinition> {
        let signature = resolve(&self.target)?;

        let fields = vec![
            FieldDefinition {
                field: StaticField::Method,
                field_type: StaticField::Method.field_type(),
            },
            FieldDefinition {
                field: StaticField::HookInfo,
                field_type: StaticField::HookInfo.field_type(),
            },
        ];

        let methods = vec![
            MethodDefinition {
                kind: EntryPointKind::Setup,
                body: emit_setup()?,
            },
            MethodDefinition {
                kind: EntryPointKind::Backup,
                body: emit_backup(&signature)?,
            },
            MethodDefinition {
                kind: EntryPointKind::Hook,
                body: CallbackChainEmitter::new(&signature).emit()?,
            },
            MethodDefinition {
                kind: EntryPointKind::CallBackup,
                body: emit_call_backup(&signature)?,
            },
        ];

        tracing::debug!(
            unit = %self.name,
            target = %self.target,
            is_static = signature.is_static,
            "generated unit"
        );

        Ok(UnitDefinition {
            name: self.name,
            target: self.target,
            signature,
            fields,
            methods,
        })
    }
}

fn emit_setup() -> Result<MethodBody> {
    let params = [
        StaticField::Method.field_type(),
        StaticField::HookInfo.field_type(),
    ];
    let mut code = CodeBuilder::new(EntryPointKind::Setup.to_string(), &params, TypeTag::Void);
    let member = code.param(0)?;
    let info = code.param(1)?;

    code.emit(Instruction::PutStatic {
        field: StaticField::Method,
        src: member,
    });
    code.emit(Instruction::PutStatic {
        field: StaticField::HookInfo,
        src: info,
    });
    code.emit(Instruction::ReturnVoid);
    code.finalize()
}

fn emit_backup(signature: &ResolvedSignature) -> Result<MethodBody> {
    let mut code = CodeBuilder::new(
        EntryPointKind::Backup.to_string(),
        &signature.parameter_types,
        signature.return_type.clone(),
    );

    match default_constant(&signature.return_type) {
        None => code.emit(Instruction::ReturnVoid),
        Some(value) => {
            let result = code.new_local(signature.return_type.clone())?;
            code.emit(Instruction::Const { dst: result, value });
            code.emit(Instruction::Return { src: result });
        }
    }
    code.finalize()
}

fn emit_call_backup(signature: &ResolvedSignature) -> Result<MethodBody> {
    let mut code = CodeBuilder::new(
        EntryPointKind::CallBackup.to_string(),
        &signature.parameter_types,
        signature.return_type.clone(),
    );
    let args = code.params()?;

    if signature.return_type.is_void() {
        code.emit(Instruction::InvokeStatic {
            dst: None,
            method: EntryPointKind::Backup,
            args,
        });
        code.emit(Instruction::ReturnVoid);
    } else {
        let result = code.new_local(signature.return_type.clone())?;
        code.emit(Instruction::InvokeStatic {
            dst: Some(result),
            method: EntryPointKind::Backup,
            args,
        });
        code.emit(Instruction::Return { src: result });
    }
    code.finalize()
}
