//! Incremental construction of method bodies.
//!
//! [`CodeBuilder`] appends instructions, allocates typed locals and named labels, and keeps
//! a stack of active catch clauses. Every instruction records the innermost catch clause
//! that was active when it was emitted. [`CodeBuilder::finalize`] checks that the body is
//! well formed, resolves labels to instruction offsets and folds the per-instruction catch
//! information into [`CatchRange`]s.
//!
//! # Label Resolution
//!
//! ```rust
//! use hookgen::ir::{CodeBuilder, Comparison, Constant, Instruction};
//! use hookgen::metadata::TypeTag;
//!
//! let mut code = CodeBuilder::new("is_zero", &[TypeTag::INT], TypeTag::BOOLEAN);
//! let value = code.param(0)?;
//! let result = code.new_local(TypeTag::BOOLEAN)?;
//! let zero = code.new_label("zero");
//!
//! code.emit(Instruction::IfZero { cmp: Comparison::Eq, src: value, target: zero });
//! code.emit(Instruction::Const { dst: result, value: Constant::Boolean(false) });
//! code.emit(Instruction::Return { src: result });
//! code.mark(zero)?;
//! code.emit(Instruction::Const { dst: result, value: Constant::Boolean(true) });
//! code.emit(Instruction::Return { src: result });
//!
//! let body = code.finalize()?;
//! assert_eq!(body.target(zero)?, 3);
//! # Ok::<(), hookgen::Error>(())
//! ```

use crate::{
    ir::{
        body::{CatchRange, MethodBody},
        instruction::{Instruction, Label, Local},
    },
    metadata::types::TypeTag,
    Error, Result,
};

struct LabelSlot {
    name: String,
    position: Option<usize>,
}

/// Builder of a single [`MethodBody`].
pub struct CodeBuilder {
    name: String,
    param_count: usize,
    return_type: TypeTag,
    locals: Vec<TypeTag>,
    instructions: Vec<Instruction>,
    handlers: Vec<Option<Label>>,
    labels: Vec<LabelSlot>,
    catch_stack: Vec<Label>,
}

impl CodeBuilder {
    /// Creates a builder for a body with the given parameters and return type.
    ///
    /// Parameters occupy the first locals, in order.
    pub fn new(name: impl Into<String>, params: &[TypeTag], return_type: TypeTag) -> Self {
        Self {
            name: name.into(),
            param_count: params.len(),
            return_type,
            locals: params.to_vec(),
            instructions: Vec::new(),
            handlers: Vec::new(),
            labels: Vec::new(),
            catch_stack: Vec::new(),
        }
    }

    /// The local holding parameter `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the body has no such parameter.
    pub fn param(&self, index: usize) -> Result<Local> {
        if index >= self.param_count {
            return Err(malformed_error!(
                "'{}' has {} parameter(s), requested #{}",
                self.name,
                self.param_count,
                index
            ));
        }
        local_at(index)
    }

    /// All parameter locals, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the locals cannot be addressed.
    pub fn params(&self) -> Result<Vec<Local>> {
        (0..self.param_count).map(local_at).collect()
    }

    /// Allocates a new local of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the frame is full.
    pub fn new_local(&mut self, tag: TypeTag) -> Result<Local> {
        let local = local_at(self.locals.len())?;
        self.locals.push(tag);
        Ok(local)
    }

    /// The declared type of a local.
    #[must_use]
    pub fn local_type(&self, local: Local) -> Option<&TypeTag> {
        self.locals.get(local.index())
    }

    /// Declared return type of the body.
    #[must_use]
    pub fn return_type(&self) -> &TypeTag {
        &self.return_type
    }

    /// Allocates a new, unmarked label.
    pub fn new_label(&mut self, name: impl Into<String>) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(LabelSlot {
            name: name.into(),
            position: None,
        });
        label
    }

    /// Marks `label` at the current position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateLabel`] if the label was already marked, or
    /// [`Error::Malformed`] if it was not allocated by this builder.
    pub fn mark(&mut self, label: Label) -> Result<()> {
        let position = self.instructions.len();
        let Some(slot) = self.labels.get_mut(label.index()) else {
            return Err(malformed_error!("Unknown label {} in '{}'", label, self.name));
        };
        if slot.position.is_some() {
            return Err(Error::DuplicateLabel(slot.name.clone()));
        }
        slot.position = Some(position);
        Ok(())
    }

    /// Routes failures of subsequently emitted instructions to `handler`.
    ///
    /// Clauses nest; the innermost active clause wins.
    pub fn add_catch_clause(&mut self, handler: Label) {
        self.catch_stack.push(handler);
    }

    /// Ends the innermost catch clause.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no clause is active.
    pub fn remove_catch_clause(&mut self) -> Result<()> {
        match self.catch_stack.pop() {
            Some(_) => Ok(()),
            None => Err(malformed_error!(
                "No active catch clause to remove in '{}'",
                self.name
            )),
        }
    }

    /// Appends an instruction, covered by the innermost active catch clause.
    pub fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
        self.handlers.push(self.catch_stack.last().copied());
    }

    /// Offset of the next emitted instruction.
    #[must_use]
    pub fn current_position(&self) -> usize {
        self.instructions.len()
    }

    /// Checks and resolves the body.
    ///
    /// # Errors
    ///
    /// - [`Error::UndefinedLabel`] if a branch or catch clause targets an unmarked label
    /// - [`Error::Malformed`] if a catch clause is still active, a label is marked past the
    ///   last instruction, or the last instruction falls through
    pub fn finalize(self) -> Result<MethodBody> {
        if !self.catch_stack.is_empty() {
            return Err(malformed_error!(
                "{} catch clause(s) still active at the end of '{}'",
                self.catch_stack.len(),
                self.name
            ));
        }

        let length = self.instructions.len();
        match self.instructions.last() {
            Some(last) if last.is_terminator() => {}
            _ => {
                return Err(malformed_error!(
                    "'{}' does not end with a terminating instruction",
                    self.name
                ))
            }
        }

        let referenced = self
            .instructions
            .iter()
            .filter_map(Instruction::branch_target)
            .chain(self.handlers.iter().flatten().copied());
        for label in referenced {
            let slot = self
                .labels
                .get(label.index())
                .ok_or_else(|| malformed_error!("Unknown label {} in '{}'", label, self.name))?;
            match slot.position {
                None => return Err(Error::UndefinedLabel(slot.name.clone())),
                Some(position) if position >= length => {
                    return Err(malformed_error!(
                        "Label '{}' in '{}' points past the last instruction",
                        slot.name,
                        self.name
                    ))
                }
                Some(_) => {}
            }
        }

        let mut catches: Vec<CatchRange> = Vec::new();
        for (pc, handler) in self.handlers.iter().enumerate() {
            let Some(handler) = handler else { continue };
            match catches.last_mut() {
                Some(range) if range.handler == *handler && range.end == pc => range.end = pc + 1,
                _ => catches.push(CatchRange {
                    start: pc,
                    end: pc + 1,
                    handler: *handler,
                }),
            }
        }

        let (label_names, label_targets): (Vec<String>, Vec<Option<usize>>) = self
            .labels
            .into_iter()
            .map(|slot| (slot.name, slot.position))
            .unzip();

        Ok(MethodBody::new(
            self.name,
            self.param_count,
            self.return_type,
            self.locals,
            self.instructions,
            label_names,
            label_targets,
            catches,
        ))
    }
}

fn local_at(index: usize) -> Result<Local> {
    u16::try_from(index)
        .map(Local)
        .map_err(|_| malformed_error!("Local index {} exceeds the frame limit", index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instruction::Constant;

    #[test]
    fn duplicate_label() {
        let mut code = CodeBuilder::new("m", &[], TypeTag::Void);
        let label = code.new_label("again");
        code.mark(label).unwrap();
        assert!(matches!(code.mark(label), Err(Error::DuplicateLabel(name)) if name == "again"));
    }

    #[test]
    fn undefined_label() {
        let mut code = CodeBuilder::new("m", &[], TypeTag::Void);
        let label = code.new_label("nowhere");
        code.emit(Instruction::Goto { target: label });
        assert!(matches!(code.finalize(), Err(Error::UndefinedLabel(name)) if name == "nowhere"));
    }

    #[test]
    fn label_past_end() {
        let mut code = CodeBuilder::new("m", &[], TypeTag::Void);
        let label = code.new_label("end");
        code.emit(Instruction::Goto { target: label });
        code.mark(label).unwrap();
        assert!(matches!(code.finalize(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn fall_through_end() {
        let mut code = CodeBuilder::new("m", &[TypeTag::INT], TypeTag::Void);
        let p = code.param(0).unwrap();
        code.emit(Instruction::Move { dst: p, src: p });
        assert!(matches!(code.finalize(), Err(Error::Malformed { .. })));
        assert!(CodeBuilder::new("m", &[], TypeTag::Void).finalize().is_err());
    }

    #[test]
    fn unbalanced_catch() {
        let mut code = CodeBuilder::new("m", &[], TypeTag::Void);
        assert!(code.remove_catch_clause().is_err());
        let handler = code.new_label("handler");
        code.add_catch_clause(handler);
        code.emit(Instruction::ReturnVoid);
        assert!(code.finalize().is_err());
    }

    #[test]
    fn catch_ranges() -> Result<()> {
        let mut code = CodeBuilder::new("m", &[], TypeTag::INT);
        let value = code.new_local(TypeTag::INT)?;
        let handler = code.new_label("handler");

        code.emit(Instruction::Const {
            dst: value,
            value: Constant::Int(1),
        });
        code.add_catch_clause(handler);
        code.emit(Instruction::Move {
            dst: value,
            src: value,
        });
        code.emit(Instruction::Move {
            dst: value,
            src: value,
        });
        code.remove_catch_clause()?;
        code.emit(Instruction::Return { src: value });
        code.mark(handler)?;
        code.emit(Instruction::Return { src: value });

        let body = code.finalize()?;
        assert_eq!(body.catches().len(), 1);
        assert_eq!(body.catches()[0].start, 1);
        assert_eq!(body.catches()[0].end, 3);
        assert_eq!(body.handler_for(0), None);
        assert_eq!(body.handler_for(2), Some(handler));
        assert_eq!(body.target(handler)?, 4);
        Ok(())
    }

    #[test]
    fn params_and_locals() -> Result<()> {
        let mut code = CodeBuilder::new("m", &[TypeTag::Object, TypeTag::LONG], TypeTag::Void);
        assert_eq!(code.params()?, vec![Local(0), Local(1)]);
        assert!(code.param(2).is_err());
        let extra = code.new_local(TypeTag::Str)?;
        assert_eq!(extra, Local(2));
        assert_eq!(code.local_type(extra), Some(&TypeTag::Str));
        Ok(())
    }
}
