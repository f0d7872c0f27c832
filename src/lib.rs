// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # sandscope
//!
//! Instrumentation core for running untrusted JVM code inside a sandbox.
//!
//! `sandscope` rewrites the instruction streams and method declarations of untrusted
//! classes before they are loaded. Two rules ship with the crate:
//!
//! - [`rules::CatchGuardRule`] warns about catch blocks that could intercept the
//!   sandbox's fatal signals and injects a runtime re-check at their entry
//! - [`rules::NativeStubRule`] replaces native methods with generated bodies, so host
//!   code can never be reached from inside the sandbox
//!
//! Both are instances of the same pattern: a rule visits a unit of code, optionally
//! records a finding, and optionally rewrites it. [`rules::RulePipeline`] drives any
//! number of such rules over methods and classes.
//!
//! ## Architecture
//!
//! - [`assembly`] - instruction model, opcodes, descriptors and the stack-tracking
//!   [`assembly::CodeEmitter`]
//! - [`metadata`] - member declarations, access flags and well-known type names
//! - [`rules`] - rule traits, contexts, the message log, the built-in rules and the
//!   pipeline
//! - [`runtime`] - the decision made by the runtime catch check
//! - [`config`] - [`config::SandboxConfig`]
//!
//! Parsing class files and writing them back out is left to the caller; the crate
//! works on the decoded instruction stream.
//!
//! ## Quick Start
//!
//! ```rust
//! use sandscope::prelude::*;
//!
//! let run = Member::new("com/example/Task", "run", "()V", AccessFlags::PUBLIC);
//! let code = vec![
//!     Instruction::try_catch(Label(0), Label(1), Label(2), Some("java/lang/Throwable")),
//!     Instruction::Label(Label(0)),
//!     Instruction::op(Opcode::Return),
//!     Instruction::Label(Label(1)),
//!     Instruction::Label(Label(2)),
//!     Instruction::op(Opcode::Athrow),
//! ];
//! let peek = Member::new(
//!     "com/example/Task",
//!     "peek",
//!     "()J",
//!     AccessFlags::PUBLIC | AccessFlags::NATIVE,
//! );
//!
//! let pipeline = RulePipeline::with_default_rules(SandboxConfig::default());
//! let class = pipeline.rewrite_class(ClassSource::new(
//!     "com/example/Task",
//!     vec![MethodSource::new(run, code), MethodSource::declaration(peek)],
//! ))?;
//!
//! assert_eq!(class.methods[0].extra_stack, 1);
//! assert!(!class.methods[1].member.is_native());
//! for message in &class.messages {
//!     println!("{message}");
//! }
//! # Ok::<(), sandscope::Error>(())
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade: rewrites at `debug`, individual
//! insertions at `trace`. Install any logger to see them.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use sandscope::prelude::*;
///
/// let pipeline = RulePipeline::default();
/// assert_eq!(pipeline.config().minimum_severity, Severity::Warning);
/// ```
pub mod prelude;

/// Instruction model and code emission.
///
/// # Key Types
///
/// - [`assembly::Instruction`] - an instruction or marker of a method body
/// - [`assembly::Opcode`] - the opcode set, with stack behaviour and flow type
/// - [`assembly::CodeEmitter`] - instruction sink tracking operand stack depth
/// - [`assembly::MethodDescriptor`] - parsed method descriptors
pub mod assembly;

/// Member declarations and well-known names.
pub mod metadata;

/// Rules, contexts, messages and the pipeline running them.
pub mod rules;

/// The runtime half of the catch guard.
pub mod runtime;

/// Configuration shared by the pipeline and its rules.
pub mod config;

pub use error::Error;

/// The generic Result type used throughout `sandscope`.
pub type Result<T> = std::result::Result<T, Error>;
