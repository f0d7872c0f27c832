//! Method access and property flags.

use bitflags::bitflags;

/// Bitmask for the visibility bits of a method's access flags
pub const METHOD_VISIBILITY_MASK: u16 = 0x0007;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Method access and property flags (`ACC_*` in a class file)
    pub struct AccessFlags: u16 {
        /// Accessible from anywhere
        const PUBLIC = 0x0001;
        /// Accessible only from the declaring class
        const PRIVATE = 0x0002;
        /// Accessible from subclasses and the same package
        const PROTECTED = 0x0004;
        /// Belongs to the class rather than an instance
        const STATIC = 0x0008;
        /// Cannot be overridden
        const FINAL = 0x0010;
        /// Invocation acquires the monitor of the receiver or class
        const SYNCHRONIZED = 0x0020;
        /// Compiler-generated bridge method
        const BRIDGE = 0x0040;
        /// Takes a variable number of arguments
        const VARARGS = 0x0080;
        /// Implemented outside the JVM, has no bytecode body
        const NATIVE = 0x0100;
        /// Has no implementation
        const ABSTRACT = 0x0400;
        /// Uses strict floating point
        const STRICT = 0x0800;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
    }
}

impl AccessFlags {
    /// Extract the visibility bits from raw access flags
    #[must_use]
    pub fn visibility(self) -> Self {
        self & Self::from_bits_truncate(METHOD_VISIBILITY_MASK)
    }

    /// Returns true if a method with these flags carries bytecode.
    #[must_use]
    pub fn has_code(self) -> bool {
        !self.intersects(Self::NATIVE | Self::ABSTRACT)
    }
}
