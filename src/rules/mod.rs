//! Safety rules and the pipeline that drives them.
//!
//! # Key Components
//!
//! - [`InstructionRule`], [`Emitter`] and [`MemberDefinitionProvider`] - the rule traits
//! - [`CatchGuardRule`] - instruments handlers that could catch the sandbox's fatal signals
//! - [`NativeStubRule`] - replaces native methods with generated bodies
//! - [`RulePipeline`] - runs rules over methods and classes
//! - [`MessageLog`] - where validation findings end up

mod catch_guard;
mod context;
mod messages;
mod native_stub;
mod pipeline;
mod rule;

pub use catch_guard::{
    is_disallowed_catch_type, CatchGuardRule, HandlerLabels, DISALLOWED_CATCH_TYPES,
};
pub use context::{AnalysisContext, EmitterContext, RuleContext};
pub use messages::{Message, MessageBuilder, MessageLog, MessageLogIter, Severity, SourceLocation};
pub use native_stub::{
    write_exception_body, write_stub_body, NativeStubRule, NATIVE_DELETED_MESSAGE,
};
pub use pipeline::{
    ClassSource, EmittedCode, MethodSource, RewrittenClass, RewrittenMethod, RulePipeline,
};
pub use rule::{Emitter, InstructionRule, MemberDefinitionProvider};
