//! The per-call invocation record shared by all callbacks of one hook invocation.
//!
//! A fresh [`InvocationRecord`] is allocated for every hook invocation that reaches the
//! callback chain. It carries the call's receiver and arguments into the callbacks, and the
//! outcome (result or failure) back out.
//!
//! # Setter Semantics
//!
//! [`InvocationRecord::set_result`] and [`InvocationRecord::set_throwable`] are mutually
//! exclusive and both request an early return: calling either from a before callback skips
//! the original method. Writing [`RecordField::ReturnEarly`] directly has no side effects.

use strum::{Display, EnumCount, EnumIter};

use crate::{
    runtime::{member::Member, throwable::Throwable, value::Value},
    Result,
};

/// Fields of an invocation record that generated code reads and writes directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "camelCase")]
pub enum RecordField {
    /// The member handle of the hooked target
    Method,
    /// The receiver, `null` for static targets
    ThisObject,
    /// The boxed argument array
    Args,
    /// Whether the original call is skipped
    ReturnEarly,
}

/// State of one hook invocation.
///
/// # Examples
///
/// ```rust
/// use hookgen::runtime::{InvocationRecord, Throwable, Value};
///
/// let mut record = InvocationRecord::new(Value::Null, Value::Null, vec![Value::Int(2).boxed()]);
/// assert_eq!(record.arg(0), Some(Value::Int(2).boxed()));
///
/// record.set_throwable(Throwable::illegal_state("denied"));
/// assert!(record.returns_early());
///
/// record.set_result(Value::Int(5).boxed());
/// assert!(!record.has_throwable());
/// assert_eq!(record.result(), &Value::Int(5).boxed());
/// ```
#[derive(Debug)]
pub struct InvocationRecord {
    method: Value,
    this_object: Value,
    args: Value,
    result: Value,
    throwable: Option<Throwable>,
    return_early: bool,
}

impl InvocationRecord {
    /// Creates a record for one invocation.
    ///
    /// # Arguments
    ///
    /// * `method` - The member handle of the target
    /// * `this_object` - The receiver, `null` for static targets
    /// * `args` - The boxed arguments
    pub fn new(method: Value, this_object: Value, args: Vec<Value>) -> Self {
        Self::with_args_array(method, this_object, Value::object_array(args))
    }

    pub(crate) fn with_args_array(method: Value, this_object: Value, args: Value) -> Self {
        Self {
            method,
            this_object,
            args,
            result: Value::Null,
            throwable: None,
            return_early: false,
        }
    }

    /// The member handle of the hooked target.
    #[must_use]
    pub fn member(&self) -> Option<&Member> {
        self.method.as_member()
    }

    /// The receiver, `null` for static targets.
    #[must_use]
    pub fn this_object(&self) -> &Value {
        &self.this_object
    }

    /// Replaces the receiver.
    ///
    /// The receiver passed to the original call is captured before the callbacks run, so a
    /// replacement is only visible to later callbacks.
    pub fn set_this_object(&mut self, this_object: Value) {
        self.this_object = this_object;
    }

    /// The shared argument array.
    #[must_use]
    pub fn args_array(&self) -> &Value {
        &self.args
    }

    /// A copy of the current arguments.
    #[must_use]
    pub fn args(&self) -> Vec<Value> {
        self.args
            .array_items()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    /// Number of arguments.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.args.array_items().map_or(0, |items| items.len())
    }

    /// The argument at `index`.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<Value> {
        self.args.array_items()?.get(index).cloned()
    }

    /// Replaces the argument at `index`. The replacement is forwarded to the original call.
    ///
    /// # Errors
    ///
    /// Returns an `IndexOutOfRange` throwable if `index` is not a valid argument position.
    pub fn set_arg(&mut self, index: usize, value: Value) -> std::result::Result<(), Throwable> {
        let Some(mut items) = self.args.array_items_mut() else {
            return Err(Throwable::illegal_state("argument array is unavailable"));
        };
        let length = items.len();
        match items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Throwable::index_out_of_range(
                i32::try_from(index).unwrap_or(i32::MAX),
                length,
            )),
        }
    }

    /// The current result.
    #[must_use]
    pub fn result(&self) -> &Value {
        &self.result
    }

    /// Sets the result, clears any failure and requests an early return.
    pub fn set_result(&mut self, result: Value) {
        self.result = result;
        self.throwable = None;
        self.return_early = true;
    }

    /// The current failure.
    #[must_use]
    pub fn throwable(&self) -> Option<&Throwable> {
        self.throwable.as_ref()
    }

    /// Sets the failure, clears the result and requests an early return.
    pub fn set_throwable(&mut self, throwable: Throwable) {
        self.result = Value::Null;
        self.throwable = Some(throwable);
        self.return_early = true;
    }

    /// Returns `true` if a failure is pending.
    #[must_use]
    pub fn has_throwable(&self) -> bool {
        self.throwable.is_some()
    }

    /// The outcome as seen by the caller: the pending failure, else the result.
    ///
    /// # Errors
    ///
    /// Returns the pending failure, if any.
    pub fn result_or_throwable(&self) -> std::result::Result<Value, Throwable> {
        match &self.throwable {
            Some(throwable) => Err(throwable.clone()),
            None => Ok(self.result.clone()),
        }
    }

    /// Returns `true` if the original call is skipped.
    #[must_use]
    pub fn returns_early(&self) -> bool {
        self.return_early
    }

    /// Plain write of the early-return flag.
    pub fn set_return_early(&mut self, return_early: bool) {
        self.return_early = return_early;
    }

    /// Reads a field.
    #[must_use]
    pub fn get_field(&self, field: RecordField) -> Value {
        match field {
            RecordField::Method => self.method.clone(),
            RecordField::ThisObject => self.this_object.clone(),
            RecordField::Args => self.args.clone(),
            RecordField::ReturnEarly => Value::Boolean(self.return_early),
        }
    }

    /// Writes a field without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `value` does not fit the field.
    pub fn put_field(&mut self, field: RecordField, value: Value) -> Result<()> {
        match field {
            RecordField::Method => self.method = value,
            RecordField::ThisObject => self.this_object = value,
            RecordField::Args => {
                if value.array_items().is_none() {
                    return Err(malformed_error!(
                        "field '{}' requires an array, got {}",
                        field,
                        value.kind_name()
                    ));
                }
                self.args = value;
            }
            RecordField::ReturnEarly => match value {
                Value::Boolean(flag) => self.return_early = flag,
                other => {
                    return Err(malformed_error!(
                        "field '{}' requires a boolean, got {}",
                        field,
                        other.kind_name()
                    ))
                }
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> InvocationRecord {
        InvocationRecord::new(
            Value::Null,
            Value::string("receiver"),
            vec![Value::Int(1).boxed(), Value::string("two")],
        )
    }

    #[test]
    fn setters_are_exclusive() {
        let mut record = record();
        assert!(!record.returns_early());

        record.set_result(Value::string("early"));
        assert!(record.returns_early());
        assert_eq!(record.result_or_throwable(), Ok(Value::string("early")));

        let failure = Throwable::illegal_state("no");
        record.set_throwable(failure.clone());
        assert_eq!(record.result(), &Value::Null);
        assert_eq!(record.result_or_throwable(), Err(failure));

        record.set_result(Value::Null);
        assert!(!record.has_throwable());
    }

    #[test]
    fn plain_field_writes() -> Result<()> {
        let mut record = record();
        record.set_result(Value::Int(3).boxed());
        record.put_field(RecordField::ReturnEarly, Value::Boolean(false))?;
        assert!(!record.returns_early());
        assert_eq!(record.result(), &Value::Int(3).boxed());

        assert!(record
            .put_field(RecordField::ReturnEarly, Value::Int(1))
            .is_err());
        assert!(record.put_field(RecordField::Args, Value::Null).is_err());
        assert_eq!(
            record.get_field(RecordField::ThisObject),
            Value::string("receiver")
        );
        Ok(())
    }

    #[test]
    fn argument_access() {
        let mut record = record();
        assert_eq!(record.arg_count(), 2);
        record.set_arg(1, Value::string("patched")).unwrap();
        assert_eq!(record.args()[1], Value::string("patched"));
        assert!(record.set_arg(5, Value::Null).is_err());
        assert_eq!(record.arg(5), None);
    }

    #[test]
    fn field_names() {
        assert_eq!(RecordField::ThisObject.to_string(), "thisObject");
        assert_eq!(RecordField::ReturnEarly.to_string(), "returnEarly");
    }
}
