//! # sandscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the sandscope library. Import this module to get quick access to everything
//! needed to configure a pipeline, feed it classes and inspect the results.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all sandscope operations
pub use crate::Error;

/// The result type used throughout sandscope
pub use crate::Result;

/// Pipeline and rule configuration
pub use crate::config::SandboxConfig;

// ================================================================================================
// Instruction Model
// ================================================================================================

/// Instructions, markers and their operands
pub use crate::assembly::{
    Constant, FlowType, Instruction, Label, MemberRef, Operand, StackBehavior, TryCatchBlock,
};

/// Opcode set
pub use crate::assembly::{Opcode, OperandKind};

/// Stack-tracking instruction sink
pub use crate::assembly::CodeEmitter;

/// Descriptor parsing
pub use crate::assembly::{field_slots, MethodDescriptor};

// ================================================================================================
// Members
// ================================================================================================

/// Member declarations and their generated bodies
pub use crate::metadata::{AccessFlags, BodyWriter, Member};

/// Display names of sandboxed types
pub use crate::metadata::ClassNameFormatter;

// ================================================================================================
// Rules
// ================================================================================================

/// Rule contracts
pub use crate::rules::{Emitter, InstructionRule, MemberDefinitionProvider};

/// Contexts handed to rules
pub use crate::rules::{AnalysisContext, EmitterContext, RuleContext};

/// Built-in rules
pub use crate::rules::{CatchGuardRule, NativeStubRule};

/// Pipeline inputs and outputs
pub use crate::rules::{
    ClassSource, EmittedCode, MethodSource, RewrittenClass, RewrittenMethod, RulePipeline,
};

// ================================================================================================
// Messages
// ================================================================================================

/// Validation findings
pub use crate::rules::{Message, MessageLog, Severity, SourceLocation};

// ================================================================================================
// Runtime
// ================================================================================================

/// Decision of the runtime catch check
pub use crate::runtime::{check_catch, CatchCheck};
