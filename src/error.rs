use thiserror::Error;

use crate::runtime::Throwable;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors fall into two classes. Generation-time errors ([`Error::UnsupportedTarget`],
/// [`Error::InvalidTarget`], label and IR consistency errors) are raised synchronously to the
/// caller of a generation request and abort it entirely. Invocation-time errors come out of an
/// entry point call: [`Error::Thrown`] carries a failure that escaped the generated code (the
/// original method's failure, or one a callback placed on the record), everything else signals
/// a broken unit or a misuse of the entry point.
///
/// # Error Categories
///
/// ## Generation Errors
/// - [`Error::UnsupportedTarget`] - The member has no concrete body that could be backed up
/// - [`Error::InvalidTarget`] - The generation request itself is invalid
/// - [`Error::DuplicateLabel`] / [`Error::UndefinedLabel`] - Label bookkeeping failures
/// - [`Error::Malformed`] - The generated IR is internally inconsistent
///
/// ## Loading Errors
/// - [`Error::DuplicateUnit`] - A unit with the same name is already loaded
/// - [`Error::UnitNotFound`] - Lookup of an unknown unit name
///
/// ## Invocation Errors
/// - [`Error::Thrown`] - A failure propagated out of an entry point
/// - [`Error::ArityMismatch`] / [`Error::ArgumentType`] - The call does not match the signature
/// - [`Error::FieldAlreadySet`] - `setup` ran more than once
/// - [`Error::BackupAlreadyBound`] - The backup entry point was patched twice
/// - [`Error::StepLimit`] - The interpreter hit its step budget
/// - [`Error::LockError`] - A poisoned lock was encountered
///
/// # Examples
///
/// ```rust
/// use hookgen::Error;
///
/// fn describe(err: &Error) -> &'static str {
///     match err {
///         Error::UnsupportedTarget(_) => "cannot hook this member",
///         Error::InvalidTarget(_) => "bad request",
///         Error::Thrown(_) => "the hooked call failed",
///         _ => "internal failure",
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The target member cannot be hooked.
    ///
    /// Raised for interface members, abstract methods and members that are neither
    /// methods nor constructors. None of these have a concrete body to back up.
    #[error("Unsupported target - {0}")]
    UnsupportedTarget(String),

    /// The generation request is invalid.
    ///
    /// Raised when the artifact directory path is empty or another request parameter
    /// cannot be honoured.
    #[error("Invalid target - {0}")]
    InvalidTarget(String),

    /// The generated code is internally inconsistent.
    ///
    /// Indicates a defect in the emitted IR (a local read before it was written, an
    /// operand of the wrong kind, a body that falls off its end). The error includes the
    /// source location where the inconsistency was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of the inconsistency
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A label was marked twice in the same method body.
    #[error("Label '{0}' is already defined")]
    DuplicateLabel(String),

    /// A branch or catch clause references a label that was never marked.
    #[error("Label '{0}' is referenced but never defined")]
    UndefinedLabel(String),

    /// A failure escaped a generated entry point.
    ///
    /// This is the only way the original method's failure (or a failure set on the
    /// invocation record by a callback) reaches the caller of the hook entry point.
    #[error("Thrown - {0}")]
    Thrown(Throwable),

    /// An entry point was called with the wrong number of arguments.
    #[error("Entry point '{entry}' expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        /// Name of the called entry point
        entry: String,
        /// Number of declared parameters
        expected: usize,
        /// Number of supplied arguments
        actual: usize,
    },

    /// An argument is not convertible to the declared parameter type.
    #[error("Argument {index} of '{entry}' expects {expected}, got {actual}")]
    ArgumentType {
        /// Name of the called entry point
        entry: String,
        /// Zero-based argument position
        index: usize,
        /// The declared parameter type
        expected: String,
        /// Kind of the supplied value
        actual: &'static str,
    },

    /// A static field of a generated unit was written a second time.
    #[error("Static field '{0}' is already initialized")]
    FieldAlreadySet(String),

    /// The backup entry point of a unit was already bound to an original implementation.
    #[error("Backup of unit '{0}' is already bound")]
    BackupAlreadyBound(String),

    /// A unit with the same name is already loaded.
    #[error("Unit '{0}' is already loaded")]
    DuplicateUnit(String),

    /// No unit with the requested name is loaded.
    #[error("Unit '{0}' is not loaded")]
    UnitNotFound(String),

    /// The interpreter executed more instructions than allowed without making a call.
    ///
    /// Only malformed bodies that loop without calling a callback or the backup hit this.
    /// The associated value shows the step limit that was reached.
    #[error("Reached the maximum number of interpreted steps - {0}")]
    StepLimit(u64),

    /// Failed to lock target.
    ///
    /// This error occurs when a lock guarding an invocation record or an object array
    /// was poisoned by a panicking thread.
    #[error("Failed to lock target")]
    LockError,
}

impl Error {
    /// Returns the failure carried by [`Error::Thrown`], if any.
    #[must_use]
    pub fn thrown(&self) -> Option<&Throwable> {
        match self {
            Error::Thrown(throwable) => Some(throwable),
            _ => None,
        }
    }

    /// Returns `true` if this error is a catchable failure rather than a defect.
    #[must_use]
    pub fn is_thrown(&self) -> bool {
        matches!(self, Error::Thrown(_))
    }
}

impl From<Throwable> for Error {
    fn from(throwable: Throwable) -> Self {
        Error::Thrown(throwable)
    }
}
