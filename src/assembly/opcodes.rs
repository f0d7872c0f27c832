//! JVM opcode table.
//!
//! [`Opcode`] enumerates the canonical JVM instruction set as it appears after a
//! frontend has normalised a class file: the `xload_n`/`xstore_n` shorthands, `ldc_w`,
//! `ldc2_w`, `wide`, `goto_w` and `jsr_w` are folded into their general forms and do not
//! appear here. Each opcode knows its byte value, its mnemonic, the kind of operand it
//! carries, its control-flow classification and, where it is fixed, its stack effect.
//!
//! Stack effects are measured in slots: `long` and `double` values occupy two.
//!
//! ```rust
//! use sandscope::assembly::{FlowType, Opcode};
//! use std::str::FromStr;
//!
//! let op = Opcode::from_str("INVOKESTATIC").unwrap();
//! assert_eq!(op, Opcode::Invokestatic);
//! assert_eq!(op as u8, 0xB8);
//! assert_eq!(op.flow(), FlowType::Call);
//! assert!(op.stack_behavior().is_none());
//! ```

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::assembly::{FlowType, StackBehavior};

/// The kind of operand an [`Opcode`] expects.
///
/// Used by [`crate::assembly::CodeEmitter`] to reject instructions whose operand
/// does not fit the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// No operand
    None,
    /// Immediate integer (`bipush`, `sipush`, `newarray` element code)
    Int,
    /// Local variable index
    Local,
    /// Type name in internal form
    Type,
    /// Field reference
    Field,
    /// Method reference
    Method,
    /// Dynamic call site
    Dynamic,
    /// Jump target label
    Target,
    /// Loadable constant
    Constant,
    /// Local variable index plus increment
    Increment,
    /// Switch table
    Switch,
    /// Array descriptor plus dimension count
    MultiArray,
}

/// A JVM opcode.
///
/// The discriminant is the opcode byte. Display and parsing use the upper-case mnemonic
/// as printed by `javap` and ASM (`ICONST_0`, `INVOKESTATIC`, `IF_ICMPEQ`).
#[allow(missing_docs)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,
    AconstNull = 0x01,
    #[strum(serialize = "ICONST_M1")]
    IconstM1 = 0x02,
    #[strum(serialize = "ICONST_0")]
    Iconst0 = 0x03,
    #[strum(serialize = "ICONST_1")]
    Iconst1 = 0x04,
    #[strum(serialize = "ICONST_2")]
    Iconst2 = 0x05,
    #[strum(serialize = "ICONST_3")]
    Iconst3 = 0x06,
    #[strum(serialize = "ICONST_4")]
    Iconst4 = 0x07,
    #[strum(serialize = "ICONST_5")]
    Iconst5 = 0x08,
    #[strum(serialize = "LCONST_0")]
    Lconst0 = 0x09,
    #[strum(serialize = "LCONST_1")]
    Lconst1 = 0x0A,
    #[strum(serialize = "FCONST_0")]
    Fconst0 = 0x0B,
    #[strum(serialize = "FCONST_1")]
    Fconst1 = 0x0C,
    #[strum(serialize = "FCONST_2")]
    Fconst2 = 0x0D,
    #[strum(serialize = "DCONST_0")]
    Dconst0 = 0x0E,
    #[strum(serialize = "DCONST_1")]
    Dconst1 = 0x0F,
    Bipush = 0x10,
    Sipush = 0x11,
    Ldc = 0x12,

    // Loads
    Iload = 0x15,
    Lload = 0x16,
    Fload = 0x17,
    Dload = 0x18,
    Aload = 0x19,
    Iaload = 0x2E,
    Laload = 0x2F,
    Faload = 0x30,
    Daload = 0x31,
    Aaload = 0x32,
    Baload = 0x33,
    Caload = 0x34,
    Saload = 0x35,

    // Stores
    Istore = 0x36,
    Lstore = 0x37,
    Fstore = 0x38,
    Dstore = 0x39,
    Astore = 0x3A,
    Iastore = 0x4F,
    Lastore = 0x50,
    Fastore = 0x51,
    Dastore = 0x52,
    Aastore = 0x53,
    Bastore = 0x54,
    Castore = 0x55,
    Sastore = 0x56,

    // Stack
    Pop = 0x57,
    Pop2 = 0x58,
    Dup = 0x59,
    #[strum(serialize = "DUP_X1")]
    DupX1 = 0x5A,
    #[strum(serialize = "DUP_X2")]
    DupX2 = 0x5B,
    Dup2 = 0x5C,
    #[strum(serialize = "DUP2_X1")]
    Dup2X1 = 0x5D,
    #[strum(serialize = "DUP2_X2")]
    Dup2X2 = 0x5E,
    Swap = 0x5F,

    // Arithmetic
    Iadd = 0x60,
    Ladd = 0x61,
    Fadd = 0x62,
    Dadd = 0x63,
    Isub = 0x64,
    Lsub = 0x65,
    Fsub = 0x66,
    Dsub = 0x67,
    Imul = 0x68,
    Lmul = 0x69,
    Fmul = 0x6A,
    Dmul = 0x6B,
    Idiv = 0x6C,
    Ldiv = 0x6D,
    Fdiv = 0x6E,
    Ddiv = 0x6F,
    Irem = 0x70,
    Lrem = 0x71,
    Frem = 0x72,
    Drem = 0x73,
    Ineg = 0x74,
    Lneg = 0x75,
    Fneg = 0x76,
    Dneg = 0x77,
    Ishl = 0x78,
    Lshl = 0x79,
    Ishr = 0x7A,
    Lshr = 0x7B,
    Iushr = 0x7C,
    Lushr = 0x7D,
    Iand = 0x7E,
    Land = 0x7F,
    Ior = 0x80,
    Lor = 0x81,
    Ixor = 0x82,
    Lxor = 0x83,
    Iinc = 0x84,

    // Conversions
    #[strum(serialize = "I2L")]
    I2l = 0x85,
    #[strum(serialize = "I2F")]
    I2f = 0x86,
    #[strum(serialize = "I2D")]
    I2d = 0x87,
    #[strum(serialize = "L2I")]
    L2i = 0x88,
    #[strum(serialize = "L2F")]
    L2f = 0x89,
    #[strum(serialize = "L2D")]
    L2d = 0x8A,
    #[strum(serialize = "F2I")]
    F2i = 0x8B,
    #[strum(serialize = "F2L")]
    F2l = 0x8C,
    #[strum(serialize = "F2D")]
    F2d = 0x8D,
    #[strum(serialize = "D2I")]
    D2i = 0x8E,
    #[strum(serialize = "D2L")]
    D2l = 0x8F,
    #[strum(serialize = "D2F")]
    D2f = 0x90,
    #[strum(serialize = "I2B")]
    I2b = 0x91,
    #[strum(serialize = "I2C")]
    I2c = 0x92,
    #[strum(serialize = "I2S")]
    I2s = 0x93,

    // Comparisons
    Lcmp = 0x94,
    Fcmpl = 0x95,
    Fcmpg = 0x96,
    Dcmpl = 0x97,
    Dcmpg = 0x98,
    Ifeq = 0x99,
    Ifne = 0x9A,
    Iflt = 0x9B,
    Ifge = 0x9C,
    Ifgt = 0x9D,
    Ifle = 0x9E,
    IfIcmpeq = 0x9F,
    IfIcmpne = 0xA0,
    IfIcmplt = 0xA1,
    IfIcmpge = 0xA2,
    IfIcmpgt = 0xA3,
    IfIcmple = 0xA4,
    IfAcmpeq = 0xA5,
    IfAcmpne = 0xA6,

    // Control
    Goto = 0xA7,
    Jsr = 0xA8,
    Ret = 0xA9,
    Tableswitch = 0xAA,
    Lookupswitch = 0xAB,
    Ireturn = 0xAC,
    Lreturn = 0xAD,
    Freturn = 0xAE,
    Dreturn = 0xAF,
    Areturn = 0xB0,
    Return = 0xB1,

    // References
    Getstatic = 0xB2,
    Putstatic = 0xB3,
    Getfield = 0xB4,
    Putfield = 0xB5,
    Invokevirtual = 0xB6,
    Invokespecial = 0xB7,
    Invokestatic = 0xB8,
    Invokeinterface = 0xB9,
    Invokedynamic = 0xBA,
    New = 0xBB,
    Newarray = 0xBC,
    Anewarray = 0xBD,
    Arraylength = 0xBE,
    Athrow = 0xBF,
    Checkcast = 0xC0,
    Instanceof = 0xC1,
    Monitorenter = 0xC2,
    Monitorexit = 0xC3,

    // Extended
    Multianewarray = 0xC5,
    Ifnull = 0xC6,
    Ifnonnull = 0xC7,
}

const fn effect(pops: u8, pushes: u8) -> Option<StackBehavior> {
    Some(StackBehavior {
        pops,
        pushes,
        net_effect: pushes as i8 - pops as i8,
    })
}

impl Opcode {
    /// Returns the upper-case mnemonic.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Returns the opcode byte.
    #[must_use]
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Returns the fixed stack effect of this opcode in slots.
    ///
    /// Returns `None` for opcodes whose effect depends on their operand: `LDC`, field
    /// access, invocations and `MULTIANEWARRAY`.
    #[must_use]
    pub fn stack_behavior(self) -> Option<StackBehavior> {
        use Opcode::*;

        match self {
            Nop | Iinc | Goto | Jsr | Ret | Return => effect(0, 0),
            AconstNull | IconstM1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4
            | Iconst5 | Fconst0 | Fconst1 | Fconst2 | Bipush | Sipush | Iload | Fload
            | Aload | New => effect(0, 1),
            Lconst0 | Lconst1 | Dconst0 | Dconst1 | Lload | Dload => effect(0, 2),

            Iaload | Faload | Aaload | Baload | Caload | Saload => effect(2, 1),
            Laload | Daload => effect(2, 2),
            Istore | Fstore | Astore => effect(1, 0),
            Lstore | Dstore => effect(2, 0),
            Iastore | Fastore | Aastore | Bastore | Castore | Sastore => effect(3, 0),
            Lastore | Dastore => effect(4, 0),

            Pop => effect(1, 0),
            Pop2 => effect(2, 0),
            Dup => effect(1, 2),
            DupX1 => effect(2, 3),
            DupX2 => effect(3, 4),
            Dup2 => effect(2, 4),
            Dup2X1 => effect(3, 5),
            Dup2X2 => effect(4, 6),
            Swap => effect(2, 2),

            Iadd | Isub | Imul | Idiv | Irem | Ishl | Ishr | Iushr | Iand | Ior | Ixor
            | Fadd | Fsub | Fmul | Fdiv | Frem => effect(2, 1),
            Ladd | Lsub | Lmul | Ldiv | Lrem | Land | Lor | Lxor | Dadd | Dsub | Dmul
            | Ddiv | Drem => effect(4, 2),
            Lshl | Lshr | Lushr => effect(3, 2),
            Ineg | Fneg => effect(1, 1),
            Lneg | Dneg => effect(2, 2),

            I2f | F2i | I2b | I2c | I2s => effect(1, 1),
            I2l | I2d | F2l | F2d => effect(1, 2),
            L2i | L2f | D2i | D2f => effect(2, 1),
            L2d | D2l => effect(2, 2),

            Fcmpl | Fcmpg => effect(2, 1),
            Lcmp | Dcmpl | Dcmpg => effect(4, 1),
            Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle | Ifnull | Ifnonnull => effect(1, 0),
            IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge | IfIcmpgt | IfIcmple | IfAcmpeq
            | IfAcmpne => effect(2, 0),

            Tableswitch | Lookupswitch => effect(1, 0),
            Ireturn | Freturn | Areturn => effect(1, 0),
            Lreturn | Dreturn => effect(2, 0),

            Newarray | Anewarray | Arraylength | Checkcast | Instanceof => effect(1, 1),
            Athrow | Monitorenter | Monitorexit => effect(1, 0),

            Ldc | Getstatic | Putstatic | Getfield | Putfield | Invokevirtual
            | Invokespecial | Invokestatic | Invokeinterface | Invokedynamic
            | Multianewarray => None,
        }
    }

    /// Returns the control-flow classification of this opcode.
    #[must_use]
    pub fn flow(self) -> FlowType {
        use Opcode::*;

        match self {
            Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle | IfIcmpeq | IfIcmpne | IfIcmplt
            | IfIcmpge | IfIcmpgt | IfIcmple | IfAcmpeq | IfAcmpne | Ifnull | Ifnonnull => {
                FlowType::ConditionalBranch
            }
            Goto => FlowType::UnconditionalBranch,
            Jsr => FlowType::Subroutine,
            Ret => FlowType::SubroutineReturn,
            Tableswitch | Lookupswitch => FlowType::Switch,
            Ireturn | Lreturn | Freturn | Dreturn | Areturn | Return => FlowType::Return,
            Athrow => FlowType::Throw,
            Invokevirtual | Invokespecial | Invokestatic | Invokeinterface | Invokedynamic => {
                FlowType::Call
            }
            _ => FlowType::Sequential,
        }
    }

    /// Returns the kind of operand this opcode carries.
    #[must_use]
    pub fn operand_kind(self) -> OperandKind {
        use Opcode::*;

        match self {
            Bipush | Sipush | Newarray => OperandKind::Int,
            Iload | Lload | Fload | Dload | Aload | Istore | Lstore | Fstore | Dstore
            | Astore | Ret => OperandKind::Local,
            Ldc => OperandKind::Constant,
            New | Anewarray | Checkcast | Instanceof => OperandKind::Type,
            Getstatic | Putstatic | Getfield | Putfield => OperandKind::Field,
            Invokevirtual | Invokespecial | Invokestatic | Invokeinterface => {
                OperandKind::Method
            }
            Invokedynamic => OperandKind::Dynamic,
            Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle | IfIcmpeq | IfIcmpne | IfIcmplt
            | IfIcmpge | IfIcmpgt | IfIcmple | IfAcmpeq | IfAcmpne | Goto | Jsr | Ifnull
            | Ifnonnull => OperandKind::Target,
            Iinc => OperandKind::Increment,
            Tableswitch | Lookupswitch => OperandKind::Switch,
            Multianewarray => OperandKind::MultiArray,
            _ => OperandKind::None,
        }
    }

    /// Returns true if execution cannot fall through to the next instruction.
    #[must_use]
    pub fn ends_flow(self) -> bool {
        matches!(
            self.flow(),
            FlowType::UnconditionalBranch
                | FlowType::Switch
                | FlowType::Return
                | FlowType::Throw
                | FlowType::SubroutineReturn
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_opcode_bytes() {
        assert_eq!(Opcode::Nop.byte(), 0x00);
        assert_eq!(Opcode::Dup.byte(), 0x59);
        assert_eq!(Opcode::Invokestatic.byte(), 0xB8);
        assert_eq!(Opcode::Invokespecial.byte(), 0xB7);
        assert_eq!(Opcode::New.byte(), 0xBB);
        assert_eq!(Opcode::Athrow.byte(), 0xBF);
        assert_eq!(Opcode::Return.byte(), 0xB1);
        assert_eq!(Opcode::Ifnonnull.byte(), 0xC7);
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(Opcode::Iconst0.mnemonic(), "ICONST_0");
        assert_eq!(Opcode::IconstM1.mnemonic(), "ICONST_M1");
        assert_eq!(Opcode::AconstNull.mnemonic(), "ACONST_NULL");
        assert_eq!(Opcode::Dup2X1.mnemonic(), "DUP2_X1");
        assert_eq!(Opcode::IfIcmpeq.mnemonic(), "IF_ICMPEQ");
        assert_eq!(Opcode::Invokestatic.to_string(), "INVOKESTATIC");
        assert_eq!(Opcode::I2l.to_string(), "I2L");
    }

    #[test]
    fn test_parse_mnemonic() {
        assert_eq!(Opcode::from_str("ATHROW").unwrap(), Opcode::Athrow);
        assert_eq!(Opcode::from_str("DUP_X1").unwrap(), Opcode::DupX1);
        assert_eq!(Opcode::from_str("LCONST_1").unwrap(), Opcode::Lconst1);
        assert!(Opcode::from_str("LDC_W").is_err());
    }

    #[test]
    fn test_bytes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for op in Opcode::iter() {
            assert!(seen.insert(op.byte()), "duplicate byte for {op}");
        }
    }

    #[test]
    fn test_stack_behavior() {
        let dup = Opcode::Dup.stack_behavior().unwrap();
        assert_eq!((dup.pops, dup.pushes, dup.net_effect), (1, 2, 1));

        let ladd = Opcode::Ladd.stack_behavior().unwrap();
        assert_eq!(ladd.net_effect, -2);

        assert!(Opcode::Invokestatic.stack_behavior().is_none());
        assert!(Opcode::Ldc.stack_behavior().is_none());
        assert!(Opcode::Getfield.stack_behavior().is_none());
    }

    #[test]
    fn test_flow_classification() {
        assert_eq!(Opcode::Goto.flow(), FlowType::UnconditionalBranch);
        assert_eq!(Opcode::Ifnull.flow(), FlowType::ConditionalBranch);
        assert_eq!(Opcode::Athrow.flow(), FlowType::Throw);
        assert_eq!(Opcode::Areturn.flow(), FlowType::Return);
        assert_eq!(Opcode::Iadd.flow(), FlowType::Sequential);
        assert!(Opcode::Athrow.ends_flow());
        assert!(Opcode::Lookupswitch.ends_flow());
        assert!(!Opcode::Ifeq.ends_flow());
    }

    #[test]
    fn test_every_operand_dependent_opcode_has_operand() {
        for op in Opcode::iter() {
            if op.stack_behavior().is_none() {
                assert_ne!(op.operand_kind(), OperandKind::None, "{op}");
            }
        }
    }
}
