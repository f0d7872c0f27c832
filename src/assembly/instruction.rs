//! Instruction model for JVM method bodies.
//!
//! A method body is an ordered `Vec<Instruction>`. Besides executable instructions
//! ([`Instruction::Op`]) the stream carries positional markers that do not execute:
//! labels, line numbers and the declarations of exception-handler regions. Handler
//! declarations precede the code they protect, matching the order in which a class-file
//! frontend reports them.
//!
//! Instructions are plain values. Once a frontend has produced a stream it is never
//! mutated; rewriting produces a new stream.
//!
//! # Examples
//!
//! ```rust
//! use sandscope::assembly::{Instruction, Label, Opcode, Operand};
//!
//! let handler = Label(2);
//! let stream = vec![
//!     Instruction::try_catch(Label(0), Label(1), handler, Some("java/lang/Error")),
//!     Instruction::Label(Label(0)),
//!     Instruction::op(Opcode::Return),
//!     Instruction::Label(Label(1)),
//!     Instruction::Label(handler),
//!     Instruction::op(Opcode::Athrow),
//! ];
//! assert_eq!(stream[0].handler_label(), Some(handler));
//! assert_eq!(stream[2].to_string(), "RETURN");
//! ```

use std::fmt;

use crate::assembly::Opcode;

/// Control-flow classification of an opcode.
///
/// # Thread Safety
///
/// [`FlowType`] is [`std::marker::Send`] and [`std::marker::Sync`] as it only contains unit variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location (unconditional jump)
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Multi-way branch (switch statement)
    Switch,
    /// Exception throwing
    Throw,
    /// Jump to a subroutine, pushing the return address at the target
    Subroutine,
    /// Return from a subroutine through a local variable
    SubroutineReturn,
}

/// Stack effect of an instruction, in slots.
///
/// ```rust
/// use sandscope::assembly::StackBehavior;
///
/// // DUP pops one value and pushes it twice
/// let dup = StackBehavior { pops: 1, pushes: 2, net_effect: 1 };
/// assert_eq!(dup.net_effect, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBehavior {
    /// Number of slots popped from stack
    pub pops: u8,
    /// Number of slots pushed to stack
    pub pushes: u8,
    /// Net effect on stack depth (pushes - pops)
    pub net_effect: i8,
}

/// Identity of a position in an instruction stream.
///
/// Labels compare by identity only. Frontends number labels per method, so the same
/// identity can appear in unrelated methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Symbolic reference to a field or method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    /// Owner type in internal form (`java/lang/Object`)
    pub owner: String,
    /// Member name
    pub name: String,
    /// Field or method descriptor
    pub descriptor: String,
    /// True when the owner is an interface (needed for `INVOKESTATIC` on interfaces)
    pub interface: bool,
}

impl MemberRef {
    /// Creates a reference to a member of a class.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
            interface: false,
        }
    }

    /// Creates a reference to a member of an interface.
    pub fn interface(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            interface: true,
            ..Self::new(owner, name, descriptor)
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// A value loadable with `LDC`.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// `int` constant
    Int(i32),
    /// `float` constant
    Float(f32),
    /// `long` constant
    Long(i64),
    /// `double` constant
    Double(f64),
    /// String literal
    String(String),
    /// Class literal, in internal form
    Type(String),
}

impl Constant {
    /// Number of stack slots the constant occupies once loaded.
    #[must_use]
    pub fn slots(&self) -> u8 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Float(v) => write!(f, "{v}f"),
            Constant::Long(v) => write!(f, "{v}L"),
            Constant::Double(v) => write!(f, "{v}d"),
            Constant::String(v) => write!(f, "{v:?}"),
            Constant::Type(v) => write!(f, "{v}.class"),
        }
    }
}

/// Operand of an executable instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Immediate integer
    Int(i32),
    /// Local variable index
    Local(u16),
    /// Type name in internal form
    Type(String),
    /// Field reference
    Field(MemberRef),
    /// Method reference
    Method(MemberRef),
    /// Dynamic call site
    Dynamic {
        /// Call site name
        name: String,
        /// Call site descriptor
        descriptor: String,
    },
    /// Jump target
    Target(Label),
    /// Loadable constant
    Constant(Constant),
    /// `IINC` operands
    Increment {
        /// Local variable index
        local: u16,
        /// Signed increment
        delta: i16,
    },
    /// `TABLESWITCH`/`LOOKUPSWITCH` table
    Switch {
        /// Default target
        default: Label,
        /// Case keys, one per target
        keys: Vec<i32>,
        /// Case targets
        targets: Vec<Label>,
    },
    /// `MULTIANEWARRAY` operands
    MultiArray {
        /// Array type descriptor
        descriptor: String,
        /// Number of dimensions to allocate
        dimensions: u8,
    },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Int(v) => write!(f, "{v}"),
            Operand::Local(v) => write!(f, "{v}"),
            Operand::Type(t) => f.write_str(t),
            Operand::Field(m) | Operand::Method(m) => write!(f, "{m}"),
            Operand::Dynamic { name, descriptor } => write!(f, "{name}{descriptor}"),
            Operand::Target(l) => write!(f, "{l}"),
            Operand::Constant(c) => write!(f, "{c}"),
            Operand::Increment { local, delta } => write!(f, "{local} {delta}"),
            Operand::Switch {
                default,
                keys,
                targets,
            } => {
                for (key, target) in keys.iter().zip(targets) {
                    write!(f, "{key}: {target}, ")?;
                }
                write!(f, "default: {default}")
            }
            Operand::MultiArray {
                descriptor,
                dimensions,
            } => write!(f, "{descriptor} {dimensions}"),
        }
    }
}

/// Declaration of an exception-handler region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatchBlock {
    /// Start of the protected region (inclusive)
    pub start: Label,
    /// End of the protected region (exclusive)
    pub end: Label,
    /// Entry point of the handler
    pub handler: Label,
    /// Caught type in internal form, `None` for catch-any (`finally`)
    pub type_name: Option<String>,
}

/// One entry of a method's instruction stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// An executable instruction
    Op {
        /// The opcode
        opcode: Opcode,
        /// Its operand
        operand: Operand,
    },
    /// A control-flow marker
    Label(Label),
    /// Source line number for the code starting at `start`
    LineNumber {
        /// Line number in the source file
        line: u32,
        /// Label the line number attaches to
        start: Label,
    },
    /// An exception-handler region declaration
    TryCatch(TryCatchBlock),
}

impl Instruction {
    /// Creates an executable instruction without operand.
    #[must_use]
    pub fn op(opcode: Opcode) -> Self {
        Instruction::Op {
            opcode,
            operand: Operand::None,
        }
    }

    /// Creates an executable instruction with the given operand.
    #[must_use]
    pub fn with_operand(opcode: Opcode, operand: Operand) -> Self {
        Instruction::Op { opcode, operand }
    }

    /// Creates a local variable access (`ALOAD 0`, `ISTORE 3`).
    #[must_use]
    pub fn local(opcode: Opcode, index: u16) -> Self {
        Instruction::with_operand(opcode, Operand::Local(index))
    }

    /// Creates a jump to `target`.
    #[must_use]
    pub fn jump(opcode: Opcode, target: Label) -> Self {
        Instruction::with_operand(opcode, Operand::Target(target))
    }

    /// Creates a type instruction (`NEW`, `CHECKCAST`).
    pub fn type_insn(opcode: Opcode, type_name: impl Into<String>) -> Self {
        Instruction::with_operand(opcode, Operand::Type(type_name.into()))
    }

    /// Creates a method invocation.
    #[must_use]
    pub fn invoke(opcode: Opcode, method: MemberRef) -> Self {
        Instruction::with_operand(opcode, Operand::Method(method))
    }

    /// Creates an `LDC`.
    #[must_use]
    pub fn ldc(constant: Constant) -> Self {
        Instruction::with_operand(Opcode::Ldc, Operand::Constant(constant))
    }

    /// Creates an exception-handler region declaration.
    #[must_use]
    pub fn try_catch(start: Label, end: Label, handler: Label, type_name: Option<&str>) -> Self {
        Instruction::TryCatch(TryCatchBlock {
            start,
            end,
            handler,
            type_name: type_name.map(str::to_string),
        })
    }

    /// Returns the opcode of an executable instruction.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Instruction::Op { opcode, .. } => Some(*opcode),
            _ => None,
        }
    }

    /// Returns true for labels, line numbers and handler declarations.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        !matches!(self, Instruction::Op { .. })
    }

    /// Returns the label identity if this is a control-flow marker.
    #[must_use]
    pub fn label(&self) -> Option<Label> {
        match self {
            Instruction::Label(label) => Some(*label),
            _ => None,
        }
    }

    /// Returns the handler entry label if this is a handler region declaration.
    #[must_use]
    pub fn handler_label(&self) -> Option<Label> {
        match self {
            Instruction::TryCatch(block) => Some(block.handler),
            _ => None,
        }
    }

    /// Returns every label this instruction refers to or defines.
    pub fn labels(&self) -> Vec<Label> {
        match self {
            Instruction::Label(label) => vec![*label],
            Instruction::LineNumber { start, .. } => vec![*start],
            Instruction::TryCatch(block) => vec![block.start, block.end, block.handler],
            Instruction::Op { operand, .. } => match operand {
                Operand::Target(label) => vec![*label],
                Operand::Switch {
                    default, targets, ..
                } => std::iter::once(*default)
                    .chain(targets.iter().copied())
                    .collect(),
                _ => Vec::new(),
            },
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Op { opcode, operand } => match operand {
                Operand::None => write!(f, "{opcode}"),
                _ => write!(f, "{opcode} {operand}"),
            },
            Instruction::Label(label) => write!(f, "{label}:"),
            Instruction::LineNumber { line, start } => write!(f, "LINENUMBER {line} {start}"),
            Instruction::TryCatch(block) => write!(
                f,
                "TRYCATCHBLOCK {} {} {} {}",
                block.start,
                block.end,
                block.handler,
                block.type_name.as_deref().unwrap_or("null")
            ),
        }
    }
}
