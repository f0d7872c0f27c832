use thiserror::Error;

use crate::assembly::Label;

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
/// Validation never produces an error: rule findings are recorded in the
/// [`crate::rules::MessageLog`] instead. Errors are reserved for input that cannot be
/// transformed at all, such as a stream whose operand stack underflows or a handler
/// label that was declared but never placed.
///
/// # Error Categories
///
/// ## Instrumentation Errors
/// - [`Error::UnresolvedHandler`] - A guarded handler label never appeared in the stream
/// - [`Error::DuplicateLabel`] - The same label was placed twice in one method
///
/// ## Input Errors
/// - [`Error::Malformed`] - Inconsistent instruction stream (stack underflow, operand mismatch)
/// - [`Error::InvalidDescriptor`] - A method or field descriptor could not be parsed
///
/// # Examples
///
/// ```rust,no_run
/// use sandscope::{Error, rules::{ClassSource, RulePipeline}};
///
/// # fn load() -> ClassSource { unimplemented!() }
/// let pipeline = RulePipeline::default();
/// match pipeline.rewrite_class(load()) {
///     Ok(class) => println!("rewrote {} methods", class.methods.len()),
///     Err(Error::UnresolvedHandler { method, label }) => {
///         eprintln!("{method}: handler {label} is never placed");
///     }
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed stream: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The instruction stream is inconsistent and could not be rewritten.
    ///
    /// Raised by the [`crate::assembly::CodeEmitter`] on operand stack underflow,
    /// conflicting stack depths at a label, or an operand that does not fit its opcode.
    /// The error includes the source location where the problem was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
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

    /// A handler label was registered for a runtime catch check but the label
    /// itself never appeared in the method's instruction stream.
    ///
    /// Leaving such a handler uninstrumented would let untrusted code catch a
    /// fatal sandbox signal, so the whole method transformation fails.
    #[error("Handler label {label} of {method} was registered but never reached")]
    UnresolvedHandler {
        /// Qualified name of the method being rewritten
        method: String,
        /// The handler label that was never placed
        label: Label,
    },

    /// The same label was placed twice in one method body.
    #[error("Label {0} is placed more than once")]
    DuplicateLabel(Label),

    /// A method or field descriptor could not be parsed.
    #[error("Invalid descriptor - {0}")]
    InvalidDescriptor(String),

    /// Generic error for miscellaneous cases.
    #[error("{0}")]
    Error(String),
}
