//! Instruction and member factories shared by the unit tests.

use crate::{
    assembly::{Instruction, Label, MemberRef, Opcode},
    metadata::{AccessFlags, Member},
};

/// Owner of the members built by [`task_member`].
pub const TASK_CLASS: &str = "com/example/Task";

/// A public `run()V` method on [`TASK_CLASS`].
pub fn task_member() -> Member {
    Member::new(TASK_CLASS, "run", "()V", AccessFlags::PUBLIC)
}

/// A public native method.
pub fn native_member(owner: &str, name: &str, signature: &str) -> Member {
    Member::new(
        owner,
        name,
        signature,
        AccessFlags::PUBLIC | AccessFlags::NATIVE,
    )
}

/// A handler region over `L0..L1` catching `type_name` at `handler`.
pub fn catching(type_name: &str, handler: u32) -> Instruction {
    Instruction::try_catch(Label(0), Label(1), Label(handler), Some(type_name))
}

/// `try { this.run(); } catch (type_name e) { }`
///
/// The handler sits at `L2`. The uninstrumented body needs one stack slot.
pub fn guarded_method(type_name: &str) -> Vec<Instruction> {
    vec![
        catching(type_name, 2),
        Instruction::Label(Label(0)),
        Instruction::local(Opcode::Aload, 0),
        Instruction::invoke(
            Opcode::Invokevirtual,
            MemberRef::new(TASK_CLASS, "run", "()V"),
        ),
        Instruction::Label(Label(1)),
        Instruction::jump(Opcode::Goto, Label(3)),
        Instruction::Label(Label(2)),
        Instruction::local(Opcode::Astore, 1),
        Instruction::Label(Label(3)),
        Instruction::op(Opcode::Return),
    ]
}
