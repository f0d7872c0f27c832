//! Method declarations, access flags and type names.

mod access;
mod member;
pub mod names;

pub use access::{AccessFlags, METHOD_VISIBILITY_MASK};
pub use member::{BodyWriter, Member};
pub use names::ClassNameFormatter;
