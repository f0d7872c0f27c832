//! Field and method descriptor parsing.
//!
//! Only the slot counts are of interest here: the emitter needs to know how many stack
//! slots an invocation or field access consumes and produces.

use crate::{Error, Result};

/// Parsed shape of a method descriptor such as `(JLjava/lang/String;[I)V`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Number of argument values
    pub arguments: usize,
    /// Stack slots taken by the arguments
    pub argument_slots: u8,
    /// Stack slots taken by the return value (0 for `V`)
    pub return_slots: u8,
}

impl MethodDescriptor {
    /// Parses a method descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] if the descriptor is not well formed.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let invalid = || Error::InvalidDescriptor(descriptor.to_string());

        let rest = descriptor.strip_prefix('(').ok_or_else(invalid)?;
        let close = rest.find(')').ok_or_else(invalid)?;
        let (mut params, ret) = (&rest[..close], &rest[close + 1..]);

        let mut arguments = 0usize;
        let mut argument_slots = 0u8;
        while !params.is_empty() {
            let (slots, len) = field_type(params).ok_or_else(invalid)?;
            arguments += 1;
            argument_slots = argument_slots.checked_add(slots).ok_or_else(invalid)?;
            params = &params[len..];
        }

        let return_slots = if ret == "V" {
            0
        } else {
            match field_type(ret) {
                Some((slots, len)) if len == ret.len() => slots,
                _ => return Err(invalid()),
            }
        };

        Ok(Self {
            arguments,
            argument_slots,
            return_slots,
        })
    }
}

/// Returns the number of stack slots a value of the given field descriptor occupies.
///
/// # Errors
///
/// Returns [`Error::InvalidDescriptor`] if `descriptor` is not a single field type.
pub fn field_slots(descriptor: &str) -> Result<u8> {
    match field_type(descriptor) {
        Some((slots, len)) if len == descriptor.len() => Ok(slots),
        _ => Err(Error::InvalidDescriptor(descriptor.to_string())),
    }
}

/// Parses one field type at the start of `input`, returning its slot count and length.
fn field_type(input: &str) -> Option<(u8, usize)> {
    let bytes = input.as_bytes();
    let mut dims = 0;
    while bytes.get(dims) == Some(&b'[') {
        dims += 1;
    }

    let (slots, len) = match bytes.get(dims)? {
        b'J' | b'D' => (2, 1),
        b'Z' | b'B' | b'C' | b'S' | b'I' | b'F' => (1, 1),
        b'L' => {
            let end = input[dims..].find(';')?;
            if end < 2 {
                return None;
            }
            (1, end + 1)
        }
        _ => return None,
    };

    // Arrays are references regardless of their element type
    let slots = if dims > 0 { 1 } else { slots };
    Some((slots, dims + len))
}
