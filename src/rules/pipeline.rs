//! Driver composing rules over methods and classes.
//!
//! [`RulePipeline`] runs the registered rules in three stages per method:
//!
//! 1. **Definition**: every [`MemberDefinitionProvider`] rewrites the declaration
//! 2. **Validation**: every [`InstructionRule`] sees every instruction, recording messages
//! 3. **Emission**: every [`Emitter`] sees every instruction, producing the new stream
//!
//! After emission the body writers of the defined member run into a fresh emitter, which
//! is how stubbed native methods get their code.
//!
//! Each method gets its own [`EmitterContext`], so per-method state never crosses method
//! boundaries. The methods of a class are independent of one another and are rewritten
//! in parallel using rayon unless [`SandboxConfig::parallel`] is off.

use rayon::prelude::*;

use crate::{
    assembly::{CodeEmitter, Instruction},
    config::SandboxConfig,
    metadata::Member,
    rules::{
        AnalysisContext, CatchGuardRule, Emitter, EmitterContext, InstructionRule,
        MemberDefinitionProvider, MessageLog, NativeStubRule, RuleContext,
    },
    Result,
};

/// A method as handed over by the frontend.
#[derive(Debug, Clone)]
pub struct MethodSource {
    /// The declaration
    pub member: Member,
    /// The original code, empty for native and abstract methods
    pub instructions: Vec<Instruction>,
}

impl MethodSource {
    /// Creates a method with code.
    #[must_use]
    pub fn new(member: Member, instructions: Vec<Instruction>) -> Self {
        Self {
            member,
            instructions,
        }
    }

    /// Creates a method without code.
    #[must_use]
    pub fn declaration(member: Member) -> Self {
        Self::new(member, Vec::new())
    }
}

/// A class as handed over by the frontend.
#[derive(Debug, Clone)]
pub struct ClassSource {
    /// Class name in internal form
    pub name: String,
    /// Declared methods, in declaration order
    pub methods: Vec<MethodSource>,
}

impl ClassSource {
    /// Creates a class from its methods.
    pub fn new(name: impl Into<String>, methods: Vec<MethodSource>) -> Self {
        Self {
            name: name.into(),
            methods,
        }
    }
}

/// Instructions produced by an emitter together with their peak stack depth.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedCode {
    /// The instructions
    pub instructions: Vec<Instruction>,
    /// Peak operand stack depth in slots
    pub max_stack: u16,
}

/// Result of rewriting one method.
#[derive(Debug, Clone)]
pub struct RewrittenMethod {
    /// The declaration after all definition providers ran
    pub member: Member,
    /// The rewritten code
    pub instructions: Vec<Instruction>,
    /// Peak stack depth of the rewritten code
    pub max_stack: u16,
    /// Stack slots needed beyond those of the original code
    pub extra_stack: u16,
    /// Code produced by the member's body writers, if it has any
    pub body: Option<EmittedCode>,
}

/// Result of rewriting a class.
#[derive(Debug)]
pub struct RewrittenClass {
    /// Class name in internal form
    pub name: String,
    /// Rewritten methods, in declaration order
    pub methods: Vec<RewrittenMethod>,
    /// Messages recorded while validating the class
    pub messages: MessageLog,
}

/// Runs rules over methods and classes.
///
/// # Examples
///
/// ```rust
/// use sandscope::{
///     config::SandboxConfig,
///     metadata::{AccessFlags, Member},
///     rules::{ClassSource, MethodSource, RulePipeline},
/// };
///
/// let pipeline = RulePipeline::with_default_rules(SandboxConfig::sequential());
/// let native = Member::new(
///     "com/example/Widget",
///     "foo",
///     "()V",
///     AccessFlags::PUBLIC | AccessFlags::NATIVE,
/// );
/// let class = pipeline.rewrite_class(ClassSource::new(
///     "com/example/Widget",
///     vec![MethodSource::declaration(native)],
/// ))?;
///
/// let method = &class.methods[0];
/// assert!(!method.member.is_native());
/// assert!(method.body.is_some());
/// # Ok::<(), sandscope::Error>(())
/// ```
pub struct RulePipeline {
    config: SandboxConfig,
    validators: Vec<Box<dyn InstructionRule>>,
    emitters: Vec<Box<dyn Emitter>>,
    providers: Vec<Box<dyn MemberDefinitionProvider>>,
}

impl Default for RulePipeline {
    fn default() -> Self {
        Self::with_default_rules(SandboxConfig::default())
    }
}

impl RulePipeline {
    /// Creates a pipeline without rules.
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            validators: Vec::new(),
            emitters: Vec::new(),
            providers: Vec::new(),
        }
    }

    /// Creates a pipeline with the catch guard and native stub rules.
    #[must_use]
    pub fn with_default_rules(config: SandboxConfig) -> Self {
        let mut pipeline = Self::new(config);
        pipeline.add_validator(Box::new(CatchGuardRule));
        pipeline.add_emitter(Box::new(CatchGuardRule));
        pipeline.add_provider(Box::new(NativeStubRule));
        pipeline
    }

    /// Appends a validation rule.
    pub fn add_validator(&mut self, rule: Box<dyn InstructionRule>) -> &mut Self {
        self.validators.push(rule);
        self
    }

    /// Appends an emission rule.
    pub fn add_emitter(&mut self, rule: Box<dyn Emitter>) -> &mut Self {
        self.emitters.push(rule);
        self
    }

    /// Appends a definition provider.
    pub fn add_provider(&mut self, rule: Box<dyn MemberDefinitionProvider>) -> &mut Self {
        self.providers.push(rule);
        self
    }

    /// The pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Names of the registered rules, by stage.
    #[must_use]
    pub fn rule_names(&self) -> (Vec<&'static str>, Vec<&'static str>, Vec<&'static str>) {
        (
            self.providers.iter().map(|r| r.name()).collect(),
            self.validators.iter().map(|r| r.name()).collect(),
            self.emitters.iter().map(|r| r.name()).collect(),
        )
    }

    /// Creates a fresh context for one run.
    #[must_use]
    pub fn context(&self) -> AnalysisContext {
        AnalysisContext::new(self.config.clone())
    }

    /// Applies every definition provider in order.
    #[must_use]
    pub fn define_member(&self, ctx: &AnalysisContext, member: Member) -> Member {
        self.providers
            .iter()
            .fold(member, |member, provider| provider.define(ctx, member))
    }

    /// Runs every validator over every instruction, recording messages in `ctx`.
    pub fn validate_method(
        &self,
        ctx: &AnalysisContext,
        member: &Member,
        instructions: &[Instruction],
    ) {
        let mut rule_ctx = RuleContext::new(ctx, member);
        for (index, instruction) in instructions.iter().enumerate() {
            for rule in &self.validators {
                rule_ctx.enter(index, rule.name());
                rule.validate(&mut rule_ctx, instruction);
            }
        }
    }

    /// Runs every emitter over every instruction and returns the new stream.
    ///
    /// Markers are written before the code emitted for them, executable instructions
    /// after it. An emitter can drop an executable instruction with
    /// [`EmitterContext::prevent_default`]; markers are always kept.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an emitter, or by the stack tracking of the
    /// underlying [`CodeEmitter`].
    pub fn emit_method(
        &self,
        ctx: &AnalysisContext,
        member: &Member,
        instructions: &[Instruction],
    ) -> Result<EmittedCode> {
        let label_base = instructions
            .iter()
            .flat_map(Instruction::labels)
            .map(|label| u64::from(label.0) + 1)
            .max()
            .unwrap_or(0);
        let mut emit_ctx = EmitterContext::new(ctx, member, label_base);

        for (index, instruction) in instructions.iter().enumerate() {
            let marker = instruction.is_marker();
            if marker {
                emit_ctx.pass_through(instruction)?;
            }

            for rule in &self.emitters {
                emit_ctx.enter(Some(index), rule.name());
                rule.emit(&mut emit_ctx, instruction)?;
            }

            let prevented = emit_ctx.take_default_prevented();
            if !marker && !prevented {
                emit_ctx.pass_through(instruction)?;
            }
        }

        for rule in &self.emitters {
            emit_ctx.enter(None, rule.name());
            rule.finish(&mut emit_ctx)?;
        }

        let (instructions, max_stack) = emit_ctx.finalize();
        Ok(EmittedCode {
            instructions,
            max_stack,
        })
    }

    /// Defines, validates and emits one method, then runs its body writers.
    ///
    /// # Errors
    ///
    /// Returns an error if emission or a body writer fails.
    pub fn rewrite_method(
        &self,
        ctx: &AnalysisContext,
        source: &MethodSource,
    ) -> Result<RewrittenMethod> {
        let member = self.define_member(ctx, source.member.clone());
        self.validate_method(ctx, &member, &source.instructions);
        let emitted = self.emit_method(ctx, &member, &source.instructions)?;

        let original_max_stack = if emitted.instructions == source.instructions {
            emitted.max_stack
        } else {
            original_max_stack(&source.instructions)?
        };

        let body = member
            .write_body()?
            .map(|(instructions, max_stack)| EmittedCode {
                instructions,
                max_stack,
            });

        log::debug!(
            "{}: {} -> {} instructions, max stack {}{}",
            member.qualified_name(),
            source.instructions.len(),
            emitted.instructions.len(),
            emitted.max_stack,
            if body.is_some() { ", generated body" } else { "" }
        );

        Ok(RewrittenMethod {
            extra_stack: emitted.max_stack.saturating_sub(original_max_stack),
            member,
            instructions: emitted.instructions,
            max_stack: emitted.max_stack,
            body,
        })
    }

    /// Rewrites every method of a class with a fresh [`AnalysisContext`].
    ///
    /// Methods are rewritten in parallel unless the configuration is sequential. The
    /// output keeps declaration order either way.
    ///
    /// # Errors
    ///
    /// Returns the error of a failing method. In sequential mode this is the first
    /// failing method in declaration order.
    pub fn rewrite_class(&self, source: ClassSource) -> Result<RewrittenClass> {
        let ctx = self.context();

        let methods = if self.config.parallel {
            source
                .methods
                .par_iter()
                .map(|method| self.rewrite_method(&ctx, method))
                .collect::<Result<Vec<_>>>()?
        } else {
            source
                .methods
                .iter()
                .map(|method| self.rewrite_method(&ctx, method))
                .collect::<Result<Vec<_>>>()?
        };

        let messages = ctx.into_messages();
        log::debug!(
            "{}: rewrote {} methods ({})",
            source.name,
            methods.len(),
            messages.summary()
        );

        Ok(RewrittenClass {
            name: source.name,
            methods,
            messages,
        })
    }
}

fn original_max_stack(instructions: &[Instruction]) -> Result<u16> {
    let mut emitter = CodeEmitter::new();
    for instruction in instructions {
        emitter.instruction(instruction)?;
    }
    Ok(emitter.max_stack_depth())
}
