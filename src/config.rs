//! Configuration for the rule pipeline.
//!
//! [`SandboxConfig`] carries the names the emitted code depends on and the knobs of the
//! driver: which sandbox-internal owner implements the runtime checks, which package
//! prefix marks sandboxed types, and whether classes are rewritten in parallel.

use crate::{metadata::names, rules::Severity};

/// Configuration for a [`crate::rules::RulePipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Messages below this severity are dropped (default: [`Severity::Warning`]).
    pub minimum_severity: Severity,

    /// Owner type of the runtime check routines invoked from emitted code
    /// (default: `sandbox/RuntimeCostAccounter`).
    pub instrumenter_owner: String,

    /// Package prefix of sandboxed types, stripped from display names (default: `sandbox/`).
    pub sandbox_prefix: String,

    /// The only owner whose `registerNatives()V` is kept as a no-op
    /// (default: `java/lang/reflect/Array`).
    pub allowed_native_owner: String,

    /// Rewrite the methods of a class on the rayon thread pool (default: true).
    pub parallel: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            minimum_severity: Severity::Warning,
            instrumenter_owner: "sandbox/RuntimeCostAccounter".to_string(),
            sandbox_prefix: "sandbox/".to_string(),
            allowed_native_owner: names::REFLECT_ARRAY.to_string(),
            parallel: true,
        }
    }
}

impl SandboxConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that rewrites methods one after another.
    ///
    /// Errors are then reported for the first failing method in declaration order.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Creates a configuration that keeps every message, including traces.
    #[must_use]
    pub fn verbose() -> Self {
        Self {
            minimum_severity: Severity::Trace,
            ..Self::default()
        }
    }

    /// Returns true if a message of `severity` is kept.
    #[must_use]
    pub fn records(&self, severity: Severity) -> bool {
        severity >= self.minimum_severity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SandboxConfig::default();
        assert_eq!(config.minimum_severity, Severity::Warning);
        assert_eq!(config.instrumenter_owner, "sandbox/RuntimeCostAccounter");
        assert_eq!(config.allowed_native_owner, "java/lang/reflect/Array");
        assert!(config.parallel);
    }

    #[test]
    fn test_presets() {
        assert!(!SandboxConfig::sequential().parallel);
        assert_eq!(SandboxConfig::verbose().minimum_severity, Severity::Trace);
        assert_eq!(SandboxConfig::new(), SandboxConfig::default());
    }

    #[test]
    fn test_records() {
        let config = SandboxConfig::default();
        assert!(config.records(Severity::Error));
        assert!(config.records(Severity::Warning));
        assert!(!config.records(Severity::Informational));
        assert!(SandboxConfig::verbose().records(Severity::Trace));
    }
}
