//! Finalized method bodies.

use std::fmt;

use crate::{
    ir::instruction::{Instruction, Label},
    metadata::types::TypeTag,
    Result,
};

/// A half-open instruction range `[start, end)` whose failures go to `handler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchRange {
    /// First covered instruction
    pub start: usize,
    /// One past the last covered instruction
    pub end: usize,
    /// Handler label
    pub handler: Label,
}

impl CatchRange {
    /// Returns `true` if the range covers `pc`.
    #[must_use]
    pub fn covers(&self, pc: usize) -> bool {
        (self.start..self.end).contains(&pc)
    }
}

/// A checked, label-resolved body produced by [`crate::ir::CodeBuilder::finalize`].
///
/// The `Display` implementation renders a readable listing, which is what
/// [`crate::emitter::UnitDefinition`] uses to dump generated units.
#[derive(Debug, Clone)]
pub struct MethodBody {
    name: String,
    param_count: usize,
    return_type: TypeTag,
    locals: Vec<TypeTag>,
    instructions: Vec<Instruction>,
    label_names: Vec<String>,
    label_targets: Vec<Option<usize>>,
    catches: Vec<CatchRange>,
}

impl MethodBody {
    pub(crate) fn new(
        name: String,
        param_count: usize,
        return_type: TypeTag,
        locals: Vec<TypeTag>,
        instructions: Vec<Instruction>,
        label_names: Vec<String>,
        label_targets: Vec<Option<usize>>,
        catches: Vec<CatchRange>,
    ) -> Self {
        Self {
            name,
            param_count,
            return_type,
            locals,
            instructions,
            label_names,
            label_targets,
            catches,
        }
    }

    /// Name of the body.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of parameters; they occupy the first locals.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Declared return type.
    #[must_use]
    pub fn return_type(&self) -> &TypeTag {
        &self.return_type
    }

    /// Declared types of all locals, parameters first.
    #[must_use]
    pub fn locals(&self) -> &[TypeTag] {
        &self.locals
    }

    /// The instructions.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The catch ranges, in instruction order.
    #[must_use]
    pub fn catches(&self) -> &[CatchRange] {
        &self.catches
    }

    /// Resolved offset of a label.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for labels that were never marked.
    pub fn target(&self, label: Label) -> Result<usize> {
        self.label_targets
            .get(label.index())
            .copied()
            .flatten()
            .ok_or_else(|| malformed_error!("Unresolved label {} in '{}'", label, self.name))
    }

    /// Handler label of the catch range covering `pc`, if any.
    #[must_use]
    pub fn handler_for(&self, pc: usize) -> Option<Label> {
        self.catches
            .iter()
            .find(|range| range.covers(pc))
            .map(|range| range.handler)
    }

    fn label_name(&self, label: Label) -> String {
        self.label_names
            .get(label.index())
            .map_or_else(|| label.to_string(), Clone::clone)
    }
}

impl fmt::Display for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".method {}(", self.name)?;
        for (i, param) in self.locals.iter().take(self.param_count).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "v{i}: {param}")?;
        }
        writeln!(f, ") -> {}", self.return_type)?;

        for (i, local) in self.locals.iter().enumerate().skip(self.param_count) {
            writeln!(f, "  .local v{i}: {local}")?;
        }

        for (pc, instruction) in self.instructions.iter().enumerate() {
            for (index, target) in self.label_targets.iter().enumerate() {
                if *target == Some(pc) {
                    writeln!(f, "  {}:", self.label_names[index])?;
                }
            }
            writeln!(f, "    {pc:04}: {instruction}")?;
        }

        for range in &self.catches {
            writeln!(
                f,
                "  .catch [{:04}, {:04}) -> {}",
                range.start,
                range.end,
                self.label_name(range.handler)
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ir::{
            code::CodeBuilder,
            instruction::{Constant, Instruction},
        },
        metadata::types::TypeTag,
        Result,
    };

    #[test]
    fn listing() -> Result<()> {
        let mut code = CodeBuilder::new("answer", &[TypeTag::Object], TypeTag::INT);
        let value = code.new_local(TypeTag::INT)?;
        let handler = code.new_label("on_failure");

        code.add_catch_clause(handler);
        code.emit(Instruction::Const {
            dst: value,
            value: Constant::Int(42),
        });
        code.remove_catch_clause()?;
        code.emit(Instruction::Return { src: value });
        code.mark(handler)?;
        code.emit(Instruction::Return { src: value });

        let listing = code.finalize()?.to_string();
        assert!(listing.starts_with(".method answer(v0: Object) -> int"));
        assert!(listing.contains(".local v1: int"));
        assert!(listing.contains("0000: const v1, 42"));
        assert!(listing.contains("on_failure:"));
        assert!(listing.contains(".catch [0000, 0001) -> on_failure"));
        Ok(())
    }
}
