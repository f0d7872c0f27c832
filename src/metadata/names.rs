//! Well-known type names and display formatting.
//!
//! Type names are kept in internal form (`java/lang/Throwable`) everywhere in this crate.
//! [`ClassNameFormatter`] turns them into the dotted form users expect in messages, and
//! strips the sandbox package prefix so sandboxed copies of JDK types read like the
//! originals.

/// Root of the exception hierarchy
pub const THROWABLE: &str = "java/lang/Throwable";
/// Root of the error hierarchy
pub const ERROR: &str = "java/lang/Error";
/// Signal used to stop a thread
pub const THREAD_DEATH: &str = "java/lang/ThreadDeath";
/// Supertype of fatal virtual machine failures
pub const VIRTUAL_MACHINE_ERROR: &str = "java/lang/VirtualMachineError";
/// Call stack exhaustion
pub const STACK_OVERFLOW_ERROR: &str = "java/lang/StackOverflowError";
/// Heap exhaustion
pub const OUT_OF_MEMORY_ERROR: &str = "java/lang/OutOfMemoryError";
/// Signal raised when sandboxed code breaks a rule
pub const RULE_VIOLATION_EXCEPTION: &str =
    "sandbox/net/corda/djvm/rules/RuleViolationException";
/// Signal raised when sandboxed code exceeds a resource threshold
pub const THRESHOLD_VIOLATION_EXCEPTION: &str =
    "sandbox/net/corda/djvm/costing/ThresholdViolationException";
/// Owner of the only native method the sandbox keeps
pub const REFLECT_ARRAY: &str = "java/lang/reflect/Array";
/// Name of instance initialisers
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Converts internal type names to display names.
///
/// ```rust
/// use sandscope::metadata::ClassNameFormatter;
///
/// let formatter = ClassNameFormatter::new("sandbox/");
/// assert_eq!(formatter.format("java/lang/Error"), "java.lang.Error");
/// assert_eq!(formatter.format("sandbox/java/util/List"), "java.util.List");
/// assert_eq!(formatter.format("[[Ljava/lang/String;"), "java.lang.String[][]");
/// assert_eq!(formatter.format("[I"), "int[]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNameFormatter {
    prefix: String,
}

impl ClassNameFormatter {
    /// Creates a formatter that strips `prefix` from sandboxed names.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The stripped prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Formats an internal type name or array descriptor for display.
    #[must_use]
    pub fn format(&self, name: &str) -> String {
        let dims = name.bytes().take_while(|&b| b == b'[').count();
        if dims == 0 {
            return self.format_class(name);
        }

        let element = &name[dims..];
        let base = match element {
            "Z" => "boolean".to_string(),
            "B" => "byte".to_string(),
            "C" => "char".to_string(),
            "S" => "short".to_string(),
            "I" => "int".to_string(),
            "J" => "long".to_string(),
            "F" => "float".to_string(),
            "D" => "double".to_string(),
            _ => {
                let class = element
                    .strip_prefix('L')
                    .and_then(|e| e.strip_suffix(';'))
                    .unwrap_or(element);
                self.format_class(class)
            }
        };
        format!("{base}{}", "[]".repeat(dims))
    }

    fn format_class(&self, name: &str) -> String {
        let name = if self.prefix.is_empty() {
            name
        } else {
            name.strip_prefix(self.prefix.as_str()).unwrap_or(name)
        };
        name.replace('/', ".")
    }
}

impl Default for ClassNameFormatter {
    fn default() -> Self {
        Self::new("sandbox/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names() {
        let formatter = ClassNameFormatter::default();
        assert_eq!(formatter.format(THROWABLE), "java.lang.Throwable");
        assert_eq!(formatter.format("Simple"), "Simple");
    }

    #[test]
    fn test_sandbox_prefix_stripped() {
        let formatter = ClassNameFormatter::default();
        assert_eq!(
            formatter.format(RULE_VIOLATION_EXCEPTION),
            "net.corda.djvm.rules.RuleViolationException"
        );
        assert_eq!(
            formatter.format(THRESHOLD_VIOLATION_EXCEPTION),
            "net.corda.djvm.costing.ThresholdViolationException"
        );
        assert_eq!(
            formatter.format("sandbox/java/lang/Object"),
            "java.lang.Object"
        );
    }

    #[test]
    fn test_prefix_only_at_start() {
        let formatter = ClassNameFormatter::default();
        assert_eq!(formatter.format("com/sandbox/Thing"), "com.sandbox.Thing");
    }

    #[test]
    fn test_empty_prefix() {
        let formatter = ClassNameFormatter::new("");
        assert_eq!(formatter.format("sandbox/A"), "sandbox.A");
    }

    #[test]
    fn test_arrays() {
        let formatter = ClassNameFormatter::default();
        assert_eq!(formatter.format("[J"), "long[]");
        assert_eq!(formatter.format("[[Z"), "boolean[][]");
        assert_eq!(
            formatter.format("[Lsandbox/java/lang/String;"),
            "java.lang.String[]"
        );
    }
}
