//! Guard against catching the sandbox's fatal signals.
//!
//! Sandboxed code must not be able to intercept the signals the sandbox uses to stop it:
//! rule and threshold violations, stack and heap exhaustion, and the supertypes those
//! can be caught as. [`CatchGuardRule`] works in two layers:
//!
//! - **Validation** warns for every handler region whose declared type is one of
//!   [`DISALLOWED_CATCH_TYPES`].
//! - **Emission** inserts `DUP; INVOKESTATIC checkCatch(Ljava/lang/Throwable;)V` at the
//!   entry label of every such handler, so the live exception is re-checked and re-thrown
//!   before any handler code runs.
//!
//! Matching is by exact declared name. A handler for `java/lang/Throwable` may receive
//! anything at runtime, which is why the runtime check cannot be dropped even when the
//! static match looks sufficient.
//!
//! ```rust
//! use sandscope::{
//!     assembly::{Instruction, Label, Opcode},
//!     metadata::{AccessFlags, Member},
//!     rules::{ClassSource, MethodSource, RulePipeline},
//!     config::SandboxConfig,
//! };
//!
//! let member = Member::new("com/example/Task", "run", "()V", AccessFlags::PUBLIC);
//! let instructions = vec![
//!     Instruction::try_catch(Label(0), Label(1), Label(2), Some("java/lang/Error")),
//!     Instruction::Label(Label(0)),
//!     Instruction::op(Opcode::Return),
//!     Instruction::Label(Label(1)),
//!     Instruction::Label(Label(2)),
//!     Instruction::op(Opcode::Athrow),
//! ];
//!
//! let pipeline = RulePipeline::with_default_rules(SandboxConfig::default());
//! let class = pipeline.rewrite_class(ClassSource::new(
//!     "com/example/Task",
//!     vec![MethodSource::new(member, instructions)],
//! ))?;
//!
//! let code = &class.methods[0].instructions;
//! assert_eq!(code[5].opcode(), Some(Opcode::Dup));
//! assert_eq!(code[6].opcode(), Some(Opcode::Invokestatic));
//! assert_eq!(class.messages.warnings().count(), 1);
//! # Ok::<(), sandscope::Error>(())
//! ```

use std::collections::{BTreeSet, HashSet};

use crate::{
    assembly::{Instruction, Label},
    metadata::names,
    rules::{Emitter, EmitterContext, InstructionRule, RuleContext},
    runtime::{CHECK_CATCH_DESCRIPTOR, CHECK_CATCH_NAME},
    Error, Result,
};

/// Exception types whose handlers must be instrumented, in internal form.
pub const DISALLOWED_CATCH_TYPES: [&str; 8] = [
    names::RULE_VIOLATION_EXCEPTION,
    names::THRESHOLD_VIOLATION_EXCEPTION,
    // The JVM is failing
    names::STACK_OVERFLOW_ERROR,
    names::OUT_OF_MEMORY_ERROR,
    // Immediate supertypes of the above
    names::VIRTUAL_MACHINE_ERROR,
    names::THREAD_DEATH,
    // Roots the fatal signals can be caught as
    names::THROWABLE,
    names::ERROR,
];

/// Returns true if a handler declared for `type_name` must be instrumented.
#[must_use]
pub fn is_disallowed_catch_type(type_name: &str) -> bool {
    DISALLOWED_CATCH_TYPES.contains(&type_name)
}

fn disallowed_handler(instruction: &Instruction) -> Option<(&str, Label)> {
    match instruction {
        Instruction::TryCatch(block) => block
            .type_name
            .as_deref()
            .filter(|name| is_disallowed_catch_type(name))
            .map(|name| (name, block.handler)),
        _ => None,
    }
}

/// Per-method registry of handler labels awaiting instrumentation.
///
/// Lives in [`EmitterContext::scratch`], so every method starts with an empty registry.
#[derive(Debug, Default)]
pub struct HandlerLabels {
    pending: BTreeSet<Label>,
    instrumented: HashSet<Label>,
}

impl HandlerLabels {
    /// Registers a handler label. Returns false if it was already known.
    pub fn register(&mut self, label: Label) -> bool {
        if self.instrumented.contains(&label) {
            return false;
        }
        self.pending.insert(label)
    }

    /// Marks `label` as instrumented. Returns true if it was pending.
    pub fn resolve(&mut self, label: Label) -> bool {
        if self.pending.remove(&label) {
            self.instrumented.insert(label);
            true
        } else {
            false
        }
    }

    /// Returns true if `label` awaits instrumentation.
    #[must_use]
    pub fn is_pending(&self, label: Label) -> bool {
        self.pending.contains(&label)
    }

    /// The lowest label still pending.
    #[must_use]
    pub fn first_pending(&self) -> Option<Label> {
        self.pending.iter().next().copied()
    }

    /// Number of handlers instrumented so far.
    #[must_use]
    pub fn instrumented(&self) -> usize {
        self.instrumented.len()
    }
}

/// Rule that instruments handlers of disallowed exception types.
#[derive(Debug, Default, Clone, Copy)]
pub struct CatchGuardRule;

impl CatchGuardRule {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl InstructionRule for CatchGuardRule {
    fn name(&self) -> &'static str {
        "CatchGuardRule"
    }

    fn validate(&self, ctx: &mut RuleContext<'_>, instruction: &Instruction) {
        if let Some((type_name, _)) = disallowed_handler(instruction) {
            let formatted = ctx.format_class_name(type_name);
            ctx.warn(format!(
                "Injected runtime check for catch-block for type {formatted}"
            ));
        }
    }
}

impl Emitter for CatchGuardRule {
    fn name(&self) -> &'static str {
        "CatchGuardRule"
    }

    fn emit(&self, ctx: &mut EmitterContext<'_>, instruction: &Instruction) -> Result<()> {
        if let Some((_, handler)) = disallowed_handler(instruction) {
            ctx.scratch::<HandlerLabels>()?.register(handler);
            return Ok(());
        }

        let Some(label) = instruction.label() else {
            return Ok(());
        };
        if !ctx.scratch::<HandlerLabels>()?.resolve(label) {
            return Ok(());
        }

        log::trace!(
            "{}: runtime catch check at handler {}",
            ctx.member().qualified_name(),
            label
        );
        ctx.duplicate()?;
        ctx.invoke_instrumenter(CHECK_CATCH_NAME, CHECK_CATCH_DESCRIPTOR)?;
        ctx.trace(format!("Inserted catch check at {label}"));
        Ok(())
    }

    fn finish(&self, ctx: &mut EmitterContext<'_>) -> Result<()> {
        match ctx.scratch::<HandlerLabels>()?.first_pending() {
            Some(label) => Err(Error::UnresolvedHandler {
                method: ctx.member().qualified_name(),
                label,
            }),
            None => Ok(()),
        }
    }
}
