//! Method declarations.
//!
//! A [`Member`] is one declared method: its owner, name, descriptor, access flags and the
//! body writers that will produce its code. Definition providers never mutate a member in
//! place. Every rewrite goes through [`Member::with_access`] or
//! [`Member::with_body_writer`] and yields a new value.
//!
//! # Examples
//!
//! ```rust
//! use sandscope::{
//!     assembly::CodeEmitter,
//!     metadata::{AccessFlags, Member},
//! };
//!
//! let member = Member::new("com/example/Widget", "draw", "()V", AccessFlags::PUBLIC)
//!     .with_body_writer(|emitter: &mut CodeEmitter| {
//!         emitter.return_void()?;
//!         Ok(())
//!     });
//!
//! let (code, max_stack) = member.write_body()?.expect("has a body writer");
//! assert_eq!(code.len(), 1);
//! assert_eq!(max_stack, 0);
//! # Ok::<(), sandscope::Error>(())
//! ```

use std::{fmt, sync::Arc};

use crate::{
    assembly::{CodeEmitter, Instruction},
    metadata::AccessFlags,
    Result,
};

/// A function producing (part of) a method body into an emitter.
pub type BodyWriter = Arc<dyn Fn(&mut CodeEmitter) -> Result<()> + Send + Sync>;

/// A method declaration.
#[derive(Clone)]
pub struct Member {
    /// Owner type in internal form (`java/lang/reflect/Array`)
    pub class_name: String,
    /// Method name
    pub member_name: String,
    /// Method descriptor
    pub signature: String,
    /// Access and property flags
    pub access: AccessFlags,
    /// Body writers, applied in order when the body is generated
    pub body: Vec<BodyWriter>,
}

impl Member {
    /// Creates a member without body writers.
    pub fn new(
        class_name: impl Into<String>,
        member_name: impl Into<String>,
        signature: impl Into<String>,
        access: AccessFlags,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            member_name: member_name.into(),
            signature: signature.into(),
            access,
            body: Vec::new(),
        }
    }

    /// Returns a copy of this member with different access flags.
    #[must_use]
    pub fn with_access(&self, access: AccessFlags) -> Self {
        Self {
            access,
            ..self.clone()
        }
    }

    /// Returns this member with `writer` appended to its body writers.
    #[must_use]
    pub fn with_body_writer<F>(mut self, writer: F) -> Self
    where
        F: Fn(&mut CodeEmitter) -> Result<()> + Send + Sync + 'static,
    {
        self.body.push(Arc::new(writer));
        self
    }

    /// Returns true if the member is declared `native`.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.access.contains(AccessFlags::NATIVE)
    }

    /// Returns true if the member is declared `static`.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    /// `owner.name` followed by the descriptor, e.g. `java/lang/Object.hashCode()I`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}{}", self.class_name, self.member_name, self.signature)
    }

    /// Runs all body writers into a fresh emitter.
    ///
    /// Returns `None` if the member has no body writers.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a body writer.
    pub fn write_body(&self) -> Result<Option<(Vec<Instruction>, u16)>> {
        if self.body.is_empty() {
            return Ok(None);
        }

        let mut emitter = CodeEmitter::new();
        for writer in &self.body {
            writer(&mut emitter)?;
        }
        Ok(Some(emitter.finalize()))
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("class_name", &self.class_name)
            .field("member_name", &self.member_name)
            .field("signature", &self.signature)
            .field("access", &self.access)
            .field("body_writers", &self.body.len())
            .finish()
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}
