//! Contexts handed to rules.
//!
//! - [`AnalysisContext`] is shared by every method of one run: configuration, type-name
//!   formatting and the [`MessageLog`].
//! - [`RuleContext`] wraps it for validation of one instruction and knows the location
//!   and the reporting rule, so messages are attributed without the rule's help.
//! - [`EmitterContext`] owns the [`CodeEmitter`] of one method together with typed
//!   per-method scratch state. A fresh one is created for every method, so nothing a rule
//!   stores there can leak into the next method.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use crate::{
    assembly::{CodeEmitter, Instruction},
    config::SandboxConfig,
    metadata::{ClassNameFormatter, Member},
    rules::{MessageBuilder, MessageLog, Severity, SourceLocation},
    Error, Result,
};

/// State shared by all methods of one pipeline run.
#[derive(Debug)]
pub struct AnalysisContext {
    config: SandboxConfig,
    formatter: ClassNameFormatter,
    messages: MessageLog,
}

impl AnalysisContext {
    /// Creates a context with an empty message log.
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            formatter: ClassNameFormatter::new(config.sandbox_prefix.clone()),
            messages: MessageLog::with_minimum_severity(config.minimum_severity),
            config,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// The type-name formatter.
    #[must_use]
    pub fn formatter(&self) -> &ClassNameFormatter {
        &self.formatter
    }

    /// Messages recorded so far.
    #[must_use]
    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    /// Formats an internal type name for display.
    #[must_use]
    pub fn format_class_name(&self, name: &str) -> String {
        self.formatter.format(name)
    }

    /// Consumes the context, returning its messages.
    #[must_use]
    pub fn into_messages(self) -> MessageLog {
        self.messages
    }
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

fn location_of(member: &Member, index: Option<usize>) -> SourceLocation {
    SourceLocation {
        class_name: member.class_name.clone(),
        member_name: member.member_name.clone(),
        signature: member.signature.clone(),
        instruction: index,
    }
}

/// Context for validating one instruction.
pub struct RuleContext<'a> {
    analysis: &'a AnalysisContext,
    member: &'a Member,
    index: Option<usize>,
    rule: &'static str,
}

impl<'a> RuleContext<'a> {
    /// Creates a context for validating `member`.
    #[must_use]
    pub fn new(analysis: &'a AnalysisContext, member: &'a Member) -> Self {
        Self {
            analysis,
            member,
            index: None,
            rule: "",
        }
    }

    pub(crate) fn enter(&mut self, index: usize, rule: &'static str) {
        self.index = Some(index);
        self.rule = rule;
    }

    /// The member being validated.
    #[must_use]
    pub fn member(&self) -> &Member {
        self.member
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        self.analysis.config()
    }

    /// Index of the instruction being validated.
    #[must_use]
    pub fn instruction_index(&self) -> Option<usize> {
        self.index
    }

    /// Location of the instruction being validated.
    #[must_use]
    pub fn location(&self) -> SourceLocation {
        location_of(self.member, self.index)
    }

    /// Formats an internal type name for display.
    #[must_use]
    pub fn format_class_name(&self, name: &str) -> String {
        self.analysis.format_class_name(name)
    }

    /// Starts a message attributed to the current instruction and rule.
    pub fn record(&self, severity: Severity) -> MessageBuilder<'a> {
        let builder = self.analysis.messages().record(severity).at(self.location());
        if self.rule.is_empty() {
            builder
        } else {
            builder.rule(self.rule)
        }
    }

    /// Starts an error message.
    pub fn error(&self, message: impl Into<String>) -> MessageBuilder<'a> {
        self.record(Severity::Error).message(message)
    }

    /// Starts a warning message.
    pub fn warn(&self, message: impl Into<String>) -> MessageBuilder<'a> {
        self.record(Severity::Warning).message(message)
    }

    /// Starts an informational message.
    pub fn inform(&self, message: impl Into<String>) -> MessageBuilder<'a> {
        self.record(Severity::Informational).message(message)
    }

    /// Starts a trace message.
    pub fn trace(&self, message: impl Into<String>) -> MessageBuilder<'a> {
        self.record(Severity::Trace).message(message)
    }
}

/// Context for emitting the rewritten body of one method.
pub struct EmitterContext<'a> {
    analysis: &'a AnalysisContext,
    member: &'a Member,
    emitter: CodeEmitter,
    scratch: HashMap<TypeId, Box<dyn Any + Send>>,
    index: Option<usize>,
    rule: &'static str,
    default_prevented: bool,
}

impl<'a> EmitterContext<'a> {
    /// Creates a context whose emitter hands out labels starting at `label_base`.
    #[must_use]
    pub fn new(analysis: &'a AnalysisContext, member: &'a Member, label_base: u64) -> Self {
        Self {
            analysis,
            member,
            emitter: CodeEmitter::with_label_base(label_base),
            scratch: HashMap::new(),
            index: None,
            rule: "",
            default_prevented: false,
        }
    }

    pub(crate) fn enter(&mut self, index: Option<usize>, rule: &'static str) {
        self.index = index;
        self.rule = rule;
    }

    pub(crate) fn take_default_prevented(&mut self) -> bool {
        std::mem::take(&mut self.default_prevented)
    }

    /// The member being rewritten.
    #[must_use]
    pub fn member(&self) -> &Member {
        self.member
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        self.analysis.config()
    }

    /// Index of the original instruction being processed.
    #[must_use]
    pub fn instruction_index(&self) -> Option<usize> {
        self.index
    }

    /// Location of the original instruction being processed.
    #[must_use]
    pub fn location(&self) -> SourceLocation {
        location_of(self.member, self.index)
    }

    /// Formats an internal type name for display.
    #[must_use]
    pub fn format_class_name(&self, name: &str) -> String {
        self.analysis.format_class_name(name)
    }

    /// Starts a trace message attributed to the current instruction and rule.
    pub fn trace(&self, message: impl Into<String>) -> MessageBuilder<'a> {
        let builder = self
            .analysis
            .messages()
            .record(Severity::Trace)
            .at(self.location())
            .message(message);
        if self.rule.is_empty() {
            builder
        } else {
            builder.rule(self.rule)
        }
    }

    /// The code sink.
    pub fn emitter(&mut self) -> &mut CodeEmitter {
        &mut self.emitter
    }

    /// Emits a `DUP` of the top stack value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the stack is empty.
    pub fn duplicate(&mut self) -> Result<()> {
        self.emitter.dup()?;
        Ok(())
    }

    /// Emits an `INVOKESTATIC` of a runtime routine on the configured instrumenter owner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] for a bad descriptor and [`Error::Malformed`]
    /// if the arguments are not on the stack.
    pub fn invoke_instrumenter(&mut self, name: &str, descriptor: &str) -> Result<()> {
        let owner = &self.analysis.config().instrumenter_owner;
        self.emitter.invoke_static(owner, name, descriptor)?;
        Ok(())
    }

    /// Drops the original instruction currently being processed from the output.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Returns the per-method scratch value of type `T`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Error`] if the stored slot does not hold a `T`, which cannot happen
    /// through this API.
    pub fn scratch<T: Default + Send + 'static>(&mut self) -> Result<&mut T> {
        self.scratch
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()) as Box<dyn Any + Send>)
            .downcast_mut::<T>()
            .ok_or_else(|| {
                Error::Error(format!(
                    "Scratch slot for {} holds another type",
                    std::any::type_name::<T>()
                ))
            })
    }

    pub(crate) fn pass_through(&mut self, instruction: &Instruction) -> Result<()> {
        self.emitter.instruction(instruction)?;
        Ok(())
    }

    pub(crate) fn finalize(self) -> (Vec<Instruction>, u16) {
        self.emitter.finalize()
    }
}
