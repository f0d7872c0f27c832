//! Code emission sink with operand stack tracking.
//!
//! [`CodeEmitter`] appends [`Instruction`]s to a buffer while tracking the operand stack
//! depth in slots, the same way a class-file writer computes `max_stack`. Rules use it
//! both to pass original instructions through and to insert their own code, and body
//! writers use it to produce complete method bodies.
//!
//! # Stack Tracking
//!
//! - Fixed-effect opcodes use [`crate::assembly::Opcode::stack_behavior`]
//! - Invocations and field accesses use the parsed descriptor
//! - `LDC` pushes one slot, or two for `long`/`double` constants
//! - Jumps record the depth expected at their target label, and placing that label
//!   verifies that every path agrees
//! - After `GOTO`, a return, a throw or a switch the code is unreachable until the next
//!   label is placed
//! - Handler entry labels start with exactly the caught exception on the stack
//! - A label placed in unreachable code that no jump has targeted yet starts at an
//!   unknown depth: underflow and mismatches are not reported there, and the depth
//!   recorded for the next targeted label is adopted when that label is placed
//!
//! # Examples
//!
//! ```rust
//! use sandscope::assembly::{CodeEmitter, Constant};
//!
//! let mut emitter = CodeEmitter::new();
//! emitter
//!     .new_object("sandbox/net/corda/djvm/rules/RuleViolationException")?
//!     .dup()?
//!     .ldc(Constant::String("denied".into()))?
//!     .invoke_special(
//!         "sandbox/net/corda/djvm/rules/RuleViolationException",
//!         "<init>",
//!         "(Ljava/lang/String;)V",
//!     )?
//!     .athrow()?;
//!
//! let (code, max_stack) = emitter.finalize();
//! assert_eq!(code.len(), 5);
//! assert_eq!(max_stack, 3);
//! # Ok::<(), sandscope::Error>(())
//! ```

use std::collections::{HashMap, HashSet};

use crate::{
    assembly::{
        descriptor::{field_slots, MethodDescriptor},
        Constant, FlowType, Instruction, Label, MemberRef, Opcode, Operand, OperandKind,
        TryCatchBlock,
    },
    Error, Result,
};

/// Instruction sink that tracks the operand stack.
///
/// # Thread Safety
///
/// [`CodeEmitter`] holds mutable per-method state. Create one emitter per method body;
/// emitters for different methods can live on different threads.
#[derive(Debug, Default)]
pub struct CodeEmitter {
    /// Emitted instructions in order
    instructions: Vec<Instruction>,
    /// Current stack depth in slots
    current_stack_depth: i32,
    /// Maximum stack depth reached
    max_stack_depth: u16,
    /// Expected stack depth at labels, recorded by jumps and fall-through placement
    label_stack_depths: HashMap<Label, i32>,
    /// Labels already placed
    placed_labels: HashSet<Label>,
    /// Labels that are handler entry points
    handler_labels: HashSet<Label>,
    /// Whether the current position can only be reached through a label
    unreachable: bool,
    /// Whether the current depth is a guess: the code follows a label no jump has
    /// targeted yet, so its real entry depth is not known
    depth_unknown: bool,
    /// Next identity handed out by [`CodeEmitter::new_label`], wide enough to hold one past
    /// the last valid label
    next_label: u64,
}

impl CodeEmitter {
    /// Creates an empty emitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty emitter whose fresh labels start at `base`.
    ///
    /// Use a base above every label of the method being rewritten so labels created by
    /// rules cannot collide with the frontend's.
    #[must_use]
    pub fn with_label_base(base: u64) -> Self {
        Self {
            next_label: base,
            ..Self::default()
        }
    }

    /// Allocates a fresh label identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] once every `u32` identity above the base is used up.
    pub fn new_label(&mut self) -> Result<Label> {
        let id = u32::try_from(self.next_label).map_err(|_| {
            malformed_error!("No label identity left above {}", self.next_label - 1)
        })?;
        self.next_label += 1;
        Ok(Label(id))
    }

    /// Appends an executable instruction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the operand does not fit the opcode or the stack
    /// underflows in reachable code, and [`Error::InvalidDescriptor`] if a member
    /// reference carries a bad descriptor.
    pub fn emit(&mut self, opcode: Opcode, operand: Operand) -> Result<&mut Self> {
        if !operand_fits(opcode.operand_kind(), &operand) {
            return Err(malformed_error!(
                "{} expects a {:?} operand, got {:?}",
                opcode,
                opcode.operand_kind(),
                operand
            ));
        }

        let (pops, pushes) = stack_effect(opcode, &operand)?;
        self.update_stack_depth(pops, 0)?;

        match (&operand, opcode.flow()) {
            (Operand::Target(target), FlowType::Subroutine) => {
                // The return address is on the stack at the subroutine entry only
                self.current_stack_depth += 1;
                self.record_label_stack_depth(*target)?;
                self.current_stack_depth -= 1;
            }
            (Operand::Target(target), _) => self.record_label_stack_depth(*target)?,
            (
                Operand::Switch {
                    default, targets, ..
                },
                _,
            ) => {
                self.record_label_stack_depth(*default)?;
                for target in targets {
                    self.record_label_stack_depth(*target)?;
                }
            }
            _ => {}
        }

        self.update_stack_depth(0, pushes)?;
        if opcode.ends_flow() {
            self.unreachable = true;
        }

        self.instructions.push(Instruction::Op { opcode, operand });
        Ok(self)
    }

    /// Appends an executable instruction that takes no operand.
    ///
    /// # Errors
    ///
    /// See [`CodeEmitter::emit`].
    pub fn insn(&mut self, opcode: Opcode) -> Result<&mut Self> {
        self.emit(opcode, Operand::None)
    }

    /// Appends a local variable access (`ALOAD 0`, `ISTORE 2`, `RET 1`).
    ///
    /// # Errors
    ///
    /// See [`CodeEmitter::emit`].
    pub fn local(&mut self, opcode: Opcode, index: u16) -> Result<&mut Self> {
        self.emit(opcode, Operand::Local(index))
    }

    /// Appends a jump to `target`.
    ///
    /// # Errors
    ///
    /// See [`CodeEmitter::emit`].
    pub fn jump(&mut self, opcode: Opcode, target: Label) -> Result<&mut Self> {
        self.emit(opcode, Operand::Target(target))
    }

    /// Duplicates the top stack value (`DUP`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the stack is empty in reachable code.
    pub fn dup(&mut self) -> Result<&mut Self> {
        self.insn(Opcode::Dup)
    }

    /// Throws the exception on top of the stack (`ATHROW`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the stack is empty in reachable code.
    pub fn athrow(&mut self) -> Result<&mut Self> {
        self.insn(Opcode::Athrow)
    }

    /// Returns from a `void` method (`RETURN`).
    ///
    /// # Errors
    ///
    /// Never fails; returns `Result` for chaining.
    pub fn return_void(&mut self) -> Result<&mut Self> {
        self.insn(Opcode::Return)
    }

    /// Allocates an uninitialised object (`NEW`).
    ///
    /// # Errors
    ///
    /// Never fails; returns `Result` for chaining.
    pub fn new_object(&mut self, type_name: impl Into<String>) -> Result<&mut Self> {
        self.emit(Opcode::New, Operand::Type(type_name.into()))
    }

    /// Loads a constant (`LDC`).
    ///
    /// # Errors
    ///
    /// Never fails; returns `Result` for chaining.
    pub fn ldc(&mut self, constant: Constant) -> Result<&mut Self> {
        self.emit(Opcode::Ldc, Operand::Constant(constant))
    }

    /// Invokes a static method (`INVOKESTATIC`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] for a bad descriptor and [`Error::Malformed`]
    /// if the arguments are not on the stack.
    pub fn invoke_static(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.emit(
            Opcode::Invokestatic,
            Operand::Method(MemberRef::new(owner, name, descriptor)),
        )
    }

    /// Invokes a constructor or private method (`INVOKESPECIAL`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] for a bad descriptor and [`Error::Malformed`]
    /// if the receiver and arguments are not on the stack.
    pub fn invoke_special(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<&mut Self> {
        self.emit(
            Opcode::Invokespecial,
            Operand::Method(MemberRef::new(owner, name, descriptor)),
        )
    }

    /// Places a label.
    ///
    /// Placing a label makes the following code reachable. If jumps to the label were
    /// recorded, the current depth must agree with them unless the preceding code was
    /// unreachable. Handler entry labels reset the depth to one slot, the caught
    /// exception.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateLabel`] if the label was placed before and
    /// [`Error::Malformed`] on a stack depth mismatch.
    pub fn label(&mut self, label: Label) -> Result<&mut Self> {
        if !self.placed_labels.insert(label) {
            return Err(Error::DuplicateLabel(label));
        }

        if self.handler_labels.contains(&label) {
            self.reset_depth(1);
        } else if let Some(&expected) = self.label_stack_depths.get(&label) {
            if self.unreachable || self.depth_unknown {
                self.current_stack_depth = expected;
                self.depth_unknown = false;
            } else if self.current_stack_depth != expected {
                return Err(malformed_error!(
                    "Stack depth mismatch at label {}: expected {} (from jump), got {} (current)",
                    label,
                    expected,
                    self.current_stack_depth
                ));
            }
        } else if self.unreachable {
            // Nothing jumps here yet, so the entry depth is unknown until a label with a
            // recorded depth is reached
            self.current_stack_depth = 0;
            self.depth_unknown = true;
        } else if !self.depth_unknown {
            self.label_stack_depths
                .insert(label, self.current_stack_depth);
        }

        self.unreachable = false;
        self.instructions.push(Instruction::Label(label));
        Ok(self)
    }

    /// Records the source line of the code at `start`.
    ///
    /// # Errors
    ///
    /// Never fails; returns `Result` for chaining.
    pub fn line_number(&mut self, line: u32, start: Label) -> Result<&mut Self> {
        self.instructions.push(Instruction::LineNumber { line, start });
        Ok(self)
    }

    /// Declares an exception-handler region and registers its handler entry label.
    ///
    /// # Errors
    ///
    /// Never fails; returns `Result` for chaining.
    pub fn try_catch(&mut self, block: TryCatchBlock) -> Result<&mut Self> {
        self.declare_handler(block.handler);
        self.instructions.push(Instruction::TryCatch(block));
        Ok(self)
    }

    /// Marks `label` as a handler entry point without emitting anything.
    pub fn declare_handler(&mut self, label: Label) {
        self.handler_labels.insert(label);
        self.label_stack_depths.insert(label, 1);
    }

    /// Appends an existing instruction, dispatching on its kind.
    ///
    /// # Errors
    ///
    /// See [`CodeEmitter::emit`] and [`CodeEmitter::label`].
    pub fn instruction(&mut self, instruction: &Instruction) -> Result<&mut Self> {
        match instruction {
            Instruction::Op { opcode, operand } => self.emit(*opcode, operand.clone()),
            Instruction::Label(label) => self.label(*label),
            Instruction::LineNumber { line, start } => self.line_number(*line, *start),
            Instruction::TryCatch(block) => self.try_catch(block.clone()),
        }
    }

    /// Sets the current stack depth to a known value and makes the code reachable.
    ///
    /// Used when entering code with a known stack state, such as a handler entry with
    /// the exception on the stack.
    pub fn reset_depth(&mut self, depth: u16) {
        self.current_stack_depth = i32::from(depth);
        self.max_stack_depth = self.max_stack_depth.max(depth);
        self.unreachable = false;
        self.depth_unknown = false;
    }

    /// Sets the expected stack depth at a label.
    pub fn set_label_stack_depth(&mut self, label: Label, depth: u16) {
        self.label_stack_depths.insert(label, i32::from(depth));
    }

    /// Current stack depth in slots.
    #[must_use]
    pub fn current_stack_depth(&self) -> i32 {
        self.current_stack_depth
    }

    /// Maximum stack depth reached so far.
    #[must_use]
    pub fn max_stack_depth(&self) -> u16 {
        self.max_stack_depth
    }

    /// Returns true if the current depth is a guess because the code follows a label no
    /// jump has targeted so far.
    #[must_use]
    pub fn is_depth_unknown(&self) -> bool {
        self.depth_unknown
    }

    /// Returns true if the current position is only reachable through a label.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        self.unreachable
    }

    /// The instructions emitted so far.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions emitted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Consumes the emitter, returning the instructions and the peak stack depth.
    #[must_use]
    pub fn finalize(self) -> (Vec<Instruction>, u16) {
        (self.instructions, self.max_stack_depth)
    }

    fn update_stack_depth(&mut self, pops: u16, pushes: u16) -> Result<()> {
        self.current_stack_depth += i32::from(pushes) - i32::from(pops);

        // Only underflow from a known depth in reachable code counts
        if self.current_stack_depth < 0 && !self.unreachable && !self.depth_unknown {
            return Err(malformed_error!(
                "Stack underflow: depth became {} after instruction with {} pops, {} pushes",
                self.current_stack_depth,
                pops,
                pushes
            ));
        }

        if self.current_stack_depth < 0 {
            self.current_stack_depth = 0;
        }

        let current = u16::try_from(self.current_stack_depth)
            .map_err(|_| malformed_error!("Stack depth exceeds u16 range"))?;
        self.max_stack_depth = self.max_stack_depth.max(current);

        Ok(())
    }

    fn record_label_stack_depth(&mut self, label: Label) -> Result<()> {
        if self.unreachable || self.depth_unknown {
            return Ok(());
        }

        if let Some(&expected) = self.label_stack_depths.get(&label) {
            if self.current_stack_depth != expected {
                return Err(malformed_error!(
                    "Stack depth mismatch for jump to {}: expected {}, but jump has {}",
                    label,
                    expected,
                    self.current_stack_depth
                ));
            }
        } else {
            self.label_stack_depths
                .insert(label, self.current_stack_depth);
        }
        Ok(())
    }
}

fn operand_fits(kind: OperandKind, operand: &Operand) -> bool {
    matches!(
        (kind, operand),
        (OperandKind::None, Operand::None)
            | (OperandKind::Int, Operand::Int(_))
            | (OperandKind::Local, Operand::Local(_))
            | (OperandKind::Type, Operand::Type(_))
            | (OperandKind::Field, Operand::Field(_))
            | (OperandKind::Method, Operand::Method(_))
            | (OperandKind::Dynamic, Operand::Dynamic { .. })
            | (OperandKind::Target, Operand::Target(_))
            | (OperandKind::Constant, Operand::Constant(_))
            | (OperandKind::Increment, Operand::Increment { .. })
            | (OperandKind::Switch, Operand::Switch { .. })
            | (OperandKind::MultiArray, Operand::MultiArray { .. })
    )
}

/// Returns the `(pops, pushes)` of an instruction in slots.
fn stack_effect(opcode: Opcode, operand: &Operand) -> Result<(u16, u16)> {
    if let Some(behavior) = opcode.stack_behavior() {
        return Ok((u16::from(behavior.pops), u16::from(behavior.pushes)));
    }

    let effect = match (opcode, operand) {
        (Opcode::Ldc, Operand::Constant(constant)) => (0, u16::from(constant.slots())),
        (Opcode::Getstatic, Operand::Field(field)) => (0, u16::from(field_slots(&field.descriptor)?)),
        (Opcode::Putstatic, Operand::Field(field)) => (u16::from(field_slots(&field.descriptor)?), 0),
        (Opcode::Getfield, Operand::Field(field)) => (1, u16::from(field_slots(&field.descriptor)?)),
        (Opcode::Putfield, Operand::Field(field)) => {
            (1 + u16::from(field_slots(&field.descriptor)?), 0)
        }
        (Opcode::Invokestatic, Operand::Method(method)) => {
            let desc = MethodDescriptor::parse(&method.descriptor)?;
            (u16::from(desc.argument_slots), u16::from(desc.return_slots))
        }
        (
            Opcode::Invokevirtual | Opcode::Invokespecial | Opcode::Invokeinterface,
            Operand::Method(method),
        ) => {
            let desc = MethodDescriptor::parse(&method.descriptor)?;
            (1 + u16::from(desc.argument_slots), u16::from(desc.return_slots))
        }
        (Opcode::Invokedynamic, Operand::Dynamic { descriptor, .. }) => {
            let desc = MethodDescriptor::parse(descriptor)?;
            (u16::from(desc.argument_slots), u16::from(desc.return_slots))
        }
        (Opcode::Multianewarray, Operand::MultiArray { dimensions, .. }) => {
            (u16::from(*dimensions), 1)
        }
        _ => {
            return Err(malformed_error!(
                "No stack effect known for {} with {:?}",
                opcode,
                operand
            ))
        }
    };
    Ok(effect)
}
