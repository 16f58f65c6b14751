//! Conversions between primitive and object representations.
//!
//! Callbacks only ever see objects: arguments are boxed into the record's argument array,
//! and results are stored on the record as objects. Generated code therefore boxes every
//! primitive on its way into the callback layer and narrows every object on its way out.
//! This module emits those conversions and implements their runtime semantics.
//!
//! # Runtime Semantics
//!
//! | Source | Target | Outcome |
//! |--------|--------|---------|
//! | primitive | boxed/reference | a new box of the same kind |
//! | box of kind `k` | primitive `k` | the boxed primitive |
//! | `null` | primitive | `NullReference` throwable |
//! | anything else | primitive | `InvalidCast` throwable |
//! | `null` | reference | `null` |
//! | object | reference | the object if assignable, else `InvalidCast` |

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    ir::{
        code::CodeBuilder,
        instruction::{Constant, Instruction, Local},
    },
    metadata::types::{PrimitiveKind, TypeTag},
    runtime::{
        throwable::Throwable,
        value::{Object, Value},
    },
    Result,
};

/// Maps a primitive type to its boxed type. Every other type maps to itself.
#[must_use]
pub fn boxed_type_of(tag: &TypeTag) -> TypeTag {
    tag.boxed()
}

/// Pre-allocated result locals of a hook body.
///
/// One local per primitive kind, one per boxed kind and one `Object`, so the emitter can
/// pick a correctly typed destination for any result without allocating per use.
#[derive(Debug, Clone)]
pub struct ResultLocals {
    primitives: [Local; PrimitiveKind::COUNT],
    boxed: [Local; PrimitiveKind::COUNT],
    object: Local,
}

impl ResultLocals {
    /// Allocates the result locals in `code`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the frame is full.
    pub fn allocate(code: &mut CodeBuilder) -> Result<Self> {
        let mut primitives = [Local(0); PrimitiveKind::COUNT];
        let mut boxed = [Local(0); PrimitiveKind::COUNT];
        for kind in PrimitiveKind::iter() {
            primitives[kind as usize] = code.new_local(TypeTag::Primitive(kind))?;
            boxed[kind as usize] = code.new_local(TypeTag::Boxed(kind))?;
        }
        let object = code.new_local(TypeTag::Object)?;

        Ok(Self {
            primitives,
            boxed,
            object,
        })
    }

    /// The local for values of type `tag`, `None` for `void`.
    #[must_use]
    pub fn for_type(&self, tag: &TypeTag) -> Option<Local> {
        match tag {
            TypeTag::Void => None,
            TypeTag::Primitive(kind) => Some(self.primitives[*kind as usize]),
            TypeTag::Boxed(kind) => Some(self.boxed[*kind as usize]),
            _ => Some(self.object),
        }
    }

    /// The `Object` local.
    #[must_use]
    pub fn object(&self) -> Local {
        self.object
    }
}

/// Emits `dst = box(src)` for a value of type `source`.
///
/// References are moved unchanged.
pub fn emit_box(code: &mut CodeBuilder, dst: Local, src: Local, source: &TypeTag) {
    if source.is_primitive() {
        code.emit(Instruction::Box { dst, src });
    } else {
        code.emit(Instruction::Move { dst, src });
    }
}

/// Emits `dst = (target) src` for an object `src`.
///
/// Primitive targets unbox, `Object` targets move, other references cast.
pub fn emit_unbox(code: &mut CodeBuilder, dst: Local, src: Local, target: &TypeTag) {
    match target {
        TypeTag::Primitive(_) => code.emit(Instruction::Unbox {
            dst,
            src,
            target: target.clone(),
        }),
        TypeTag::Object => code.emit(Instruction::Move { dst, src }),
        _ => code.emit(Instruction::Cast {
            dst,
            src,
            target: target.clone(),
        }),
    }
}

/// The immediate a placeholder body returns for `tag`, `None` for `void`.
#[must_use]
pub fn default_constant(tag: &TypeTag) -> Option<Constant> {
    Some(match tag {
        TypeTag::Void => return None,
        TypeTag::Primitive(kind) => match kind {
            PrimitiveKind::Boolean => Constant::Boolean(false),
            PrimitiveKind::Byte => Constant::Byte(0),
            PrimitiveKind::Char => Constant::Char(0),
            PrimitiveKind::Short => Constant::Short(0),
            PrimitiveKind::Int => Constant::Int(0),
            PrimitiveKind::Long => Constant::Long(0),
            PrimitiveKind::Float => Constant::Float(0.0),
            PrimitiveKind::Double => Constant::Double(0.0),
        },
        _ => Constant::Null,
    })
}

/// Runtime semantics of [`Instruction::Box`].
#[must_use]
pub fn box_value(value: &Value) -> Value {
    value.clone().boxed()
}

/// Runtime semantics of [`Instruction::Unbox`] and [`Instruction::Cast`].
///
/// # Errors
///
/// Returns a `NullReference` throwable when unboxing `null` into a primitive, and an
/// `InvalidCast` throwable when the value does not fit `target`.
pub fn unbox_value(value: &Value, target: &TypeTag) -> std::result::Result<Value, Throwable> {
    let TypeTag::Primitive(kind) = target else {
        return cast_value(value, target);
    };

    match value {
        Value::Null => Err(Throwable::null_reference(format!(
            "cannot unbox null to {kind}"
        ))),
        Value::Object(object) => match object.get() {
            Object::Boxed(inner) if inner.primitive_kind() == Some(*kind) => {
                Ok(inner.clone())
            }
            other => Err(Throwable::invalid_cast(format!(
                "{} cannot be unboxed to {kind}",
                other.class_name()
            ))),
        },
        primitive if primitive.primitive_kind() == Some(*kind) => Ok(primitive.clone()),
        other => Err(Throwable::invalid_cast(format!(
            "{} cannot be unboxed to {kind}",
            other.kind_name()
        ))),
    }
}

/// Runtime semantics of [`Instruction::Cast`].
///
/// # Errors
///
/// Returns an `InvalidCast` throwable when the value is not assignable to `target`.
pub fn cast_value(value: &Value, target: &TypeTag) -> std::result::Result<Value, Throwable> {
    if value.is_assignable_to(target) {
        Ok(value.clone())
    } else {
        Err(Throwable::invalid_cast(format!(
            "{} cannot be cast to {target}",
            value
                .as_object()
                .map_or_else(|| value.kind_name().to_string(), |o| o.class_name())
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::throwable::{INVALID_CAST_CLASS, NULL_REFERENCE_CLASS};

    #[test]
    fn primitive_round_trip_per_kind() {
        let samples = [
            Value::Boolean(true),
            Value::Byte(-3),
            Value::Char(0x41),
            Value::Short(-300),
            Value::Int(70_000),
            Value::Long(1 << 40),
            Value::Float(1.5),
            Value::Double(-2.25),
        ];
        for (kind, sample) in PrimitiveKind::iter().zip(samples) {
            let boxed = box_value(&sample);
            assert!(boxed.is_assignable_to(&TypeTag::Boxed(kind)));
            assert_eq!(unbox_value(&boxed, &TypeTag::Primitive(kind)), Ok(sample));
        }
    }

    #[test]
    fn null_into_primitive() {
        let err = unbox_value(&Value::Null, &TypeTag::INT).unwrap_err();
        assert!(err.is_instance_of(NULL_REFERENCE_CLASS));
        assert_eq!(unbox_value(&Value::Null, &TypeTag::Str), Ok(Value::Null));
    }

    #[test]
    fn wrong_kind() {
        let err = unbox_value(&Value::Long(1).boxed(), &TypeTag::INT).unwrap_err();
        assert!(err.is_instance_of(INVALID_CAST_CLASS));

        let err = cast_value(&Value::Int(1).boxed(), &TypeTag::Str).unwrap_err();
        assert!(err.is_instance_of(INVALID_CAST_CLASS));
        assert_eq!(err.message(), Some("Integer cannot be cast to String"));
    }

    #[test]
    fn references_pass_through() {
        let s = Value::string("x");
        assert_eq!(box_value(&s), s);
        assert_eq!(unbox_value(&s, &TypeTag::Object), Ok(s.clone()));
    }

    #[test]
    fn defaults() {
        assert_eq!(default_constant(&TypeTag::Void), None);
        assert_eq!(default_constant(&TypeTag::BOOLEAN), Some(Constant::Boolean(false)));
        assert_eq!(default_constant(&TypeTag::CHAR), Some(Constant::Char(0)));
        assert_eq!(default_constant(&TypeTag::DOUBLE), Some(Constant::Double(0.0)));
        assert_eq!(default_constant(&TypeTag::Str), Some(Constant::Null));
    }

    #[test]
    fn emitted_conversions() -> Result<()> {
        let mut code = CodeBuilder::new("m", &[], TypeTag::Void);
        let locals = ResultLocals::allocate(&mut code)?;
        assert_eq!(locals.for_type(&TypeTag::Void), None);
        assert_eq!(locals.for_type(&TypeTag::Str), Some(locals.object()));
        assert_eq!(
            code.local_type(locals.for_type(&TypeTag::LONG).unwrap()),
            Some(&TypeTag::LONG)
        );
        assert_eq!(
            boxed_type_of(&TypeTag::LONG),
            TypeTag::Boxed(PrimitiveKind::Long)
        );

        let int = locals.for_type(&TypeTag::INT).unwrap();
        let obj = locals.object();
        emit_box(&mut code, obj, int, &TypeTag::INT);
        emit_unbox(&mut code, int, obj, &TypeTag::INT);
        emit_unbox(&mut code, obj, obj, &TypeTag::Str);
        code.emit(Instruction::ReturnVoid);

        let body = code.finalize()?;
        assert!(matches!(body.instructions()[0], Instruction::Box { .. }));
        assert!(matches!(body.instructions()[1], Instruction::Unbox { .. }));
        assert!(matches!(body.instructions()[2], Instruction::Cast { .. }));
        Ok(())
    }
}
