//! JVM instruction model and code emission.
//!
//! This module holds everything needed to describe and produce method bodies:
//!
//! - [`Instruction`] and its operands, the value model a frontend hands to the rules
//! - [`Opcode`] with per-opcode stack effects and control-flow classification
//! - [`MethodDescriptor`] for descriptor slot counting
//! - [`CodeEmitter`], the sink rules and body writers emit into

mod descriptor;
mod emitter;
mod instruction;
mod opcodes;

pub use descriptor::{field_slots, MethodDescriptor};
pub use emitter::CodeEmitter;
pub use instruction::{
    Constant, FlowType, Instruction, Label, MemberRef, Operand, StackBehavior, TryCatchBlock,
};
pub use opcodes::{Opcode, OperandKind};
