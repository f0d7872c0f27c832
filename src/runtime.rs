//! Semantics of the runtime catch check.
//!
//! Code instrumented by [`crate::rules::CatchGuardRule`] calls
//! `checkCatch(Ljava/lang/Throwable;)V` on the configured instrumenter owner at the entry
//! of every guarded handler. [`check_catch`] is the reference decision that routine
//! implements: given the lineage of the caught object, should it be re-thrown?
//!
//! The static set of guarded handler types is wider than the set of types re-thrown here.
//! `java/lang/Throwable` and `java/lang/Error` are guarded because a handler for them can
//! receive a fatal signal, but an object whose lineage merely passes through them is
//! allowed.

use crate::metadata::names;

/// Name of the runtime routine invoked at guarded handler entries.
pub const CHECK_CATCH_NAME: &str = "checkCatch";
/// Descriptor of the runtime routine invoked at guarded handler entries.
pub const CHECK_CATCH_DESCRIPTOR: &str = "(Ljava/lang/Throwable;)V";

/// Types whose instances must never be observed by sandboxed handlers.
pub const FATAL_TYPES: [&str; 4] = [
    names::RULE_VIOLATION_EXCEPTION,
    names::THRESHOLD_VIOLATION_EXCEPTION,
    names::THREAD_DEATH,
    names::VIRTUAL_MACHINE_ERROR,
];

/// Outcome of the runtime catch check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchCheck<'a> {
    /// Re-throw; carries the fatal type found in the lineage
    Rethrow(&'a str),
    /// Let the handler run
    Allow,
}

/// Decides whether a caught object must be re-thrown.
///
/// `lineage` lists the runtime type of the object followed by its supertypes, in any
/// order.
///
/// ```rust
/// use sandscope::runtime::{check_catch, CatchCheck};
///
/// let overflow = [
///     "java/lang/StackOverflowError",
///     "java/lang/VirtualMachineError",
///     "java/lang/Error",
///     "java/lang/Throwable",
/// ];
/// assert_eq!(check_catch(&overflow), CatchCheck::Rethrow("java/lang/VirtualMachineError"));
///
/// let state = ["java/lang/IllegalStateException", "java/lang/RuntimeException"];
/// assert_eq!(check_catch(&state), CatchCheck::Allow);
/// ```
#[must_use]
pub fn check_catch<'a, S: AsRef<str>>(lineage: &'a [S]) -> CatchCheck<'a> {
    lineage
        .iter()
        .map(AsRef::as_ref)
        .find(|name| FATAL_TYPES.contains(name))
        .map_or(CatchCheck::Allow, CatchCheck::Rethrow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_overflow_rethrown() {
        let lineage = [
            names::STACK_OVERFLOW_ERROR,
            names::VIRTUAL_MACHINE_ERROR,
            names::ERROR,
            names::THROWABLE,
        ];
        assert_eq!(
            check_catch(&lineage),
            CatchCheck::Rethrow(names::VIRTUAL_MACHINE_ERROR)
        );
    }

    #[test]
    fn test_sandbox_signals_rethrown() {
        let lineage = vec![
            names::RULE_VIOLATION_EXCEPTION.to_string(),
            "java/lang/RuntimeException".to_string(),
        ];
        assert!(matches!(check_catch(&lineage), CatchCheck::Rethrow(_)));
        assert!(matches!(
            check_catch(&[names::THRESHOLD_VIOLATION_EXCEPTION]),
            CatchCheck::Rethrow(_)
        ));
        assert!(matches!(
            check_catch(&[names::THREAD_DEATH, names::ERROR]),
            CatchCheck::Rethrow(_)
        ));
    }

    #[test]
    fn test_ordinary_exceptions_allowed() {
        let lineage = [
            "java/lang/IllegalStateException",
            "java/lang/RuntimeException",
            "java/lang/Exception",
            names::THROWABLE,
        ];
        assert_eq!(check_catch(&lineage), CatchCheck::Allow);
        assert_eq!(check_catch(&[names::ERROR, names::THROWABLE]), CatchCheck::Allow);
        assert_eq!(check_catch::<&str>(&[]), CatchCheck::Allow);
    }

    #[test]
    fn test_fatal_types_are_guarded() {
        for name in FATAL_TYPES {
            assert!(crate::rules::is_disallowed_catch_type(name), "{name}");
        }
    }
}
