//! Rule traits.
//!
//! A safety rule visits a unit of code, optionally flags a violation, and optionally
//! rewrites the code. The three traits split that into the capabilities the
//! [`crate::rules::RulePipeline`] drives at different stages:
//!
//! 1. [`MemberDefinitionProvider`] rewrites a method declaration before any code exists
//! 2. [`InstructionRule`] inspects each instruction and records messages
//! 3. [`Emitter`] inspects each instruction again and writes code into the sink
//!
//! All rules must be thread-safe (Send + Sync) because the pipeline rewrites the methods
//! of a class in parallel. Rules hold no per-method state: anything a rule needs to
//! remember between instructions lives in [`EmitterContext::scratch`].

use crate::{
    assembly::Instruction,
    metadata::Member,
    rules::{AnalysisContext, EmitterContext, RuleContext},
    Result,
};

/// Validation capability: inspects one instruction and records findings.
pub trait InstructionRule: Send + Sync {
    /// Unique name for messages and logging.
    fn name(&self) -> &'static str;

    /// Inspects `instruction`, recording messages through `ctx`.
    ///
    /// Validation never fails. Whether findings escalate to failures is decided by
    /// whoever reads the [`crate::rules::MessageLog`].
    fn validate(&self, ctx: &mut RuleContext<'_>, instruction: &Instruction);
}

/// Emission capability: inspects one instruction and writes code into the sink.
pub trait Emitter: Send + Sync {
    /// Unique name for messages and logging.
    fn name(&self) -> &'static str;

    /// Emits code for `instruction`.
    ///
    /// Code emitted for a marker (label, line number, handler declaration) lands after
    /// the marker; code emitted for an executable instruction lands before it. Call
    /// [`EmitterContext::prevent_default`] to drop the original instruction.
    ///
    /// # Errors
    ///
    /// Returns an error if the emitted code is inconsistent with the stream.
    fn emit(&self, ctx: &mut EmitterContext<'_>, instruction: &Instruction) -> Result<()>;

    /// Called once after the last instruction of a method.
    ///
    /// # Errors
    ///
    /// Returns an error if the method cannot be completed, e.g. state registered
    /// for a label that never appeared.
    fn finish(&self, _ctx: &mut EmitterContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Definition capability: rewrites a method declaration.
pub trait MemberDefinitionProvider: Send + Sync {
    /// Unique name for logging.
    fn name(&self) -> &'static str;

    /// Returns the rewritten member, or `member` unchanged.
    fn define(&self, ctx: &AnalysisContext, member: Member) -> Member;
}
