//! Replacement of native methods.
//!
//! Native methods run host code that the sandbox cannot instrument, so every native
//! declaration loses its `NATIVE` flag and gets a generated body instead. The body throws
//! the rule-violation signal with the message `Native method has been deleted`. The only
//! exception is `registerNatives()V` on the allow-listed owner
//! ([`crate::config::SandboxConfig::allowed_native_owner`]), which the runtime calls
//! during class initialisation and which becomes a plain `RETURN`.
//!
//! This rule records no messages; the rewrite is only visible in the member it returns.

use crate::{
    assembly::{CodeEmitter, Constant},
    metadata::{names, AccessFlags, Member},
    rules::{AnalysisContext, MemberDefinitionProvider},
    Result,
};

/// Message carried by the signal thrown from a stubbed native method.
pub const NATIVE_DELETED_MESSAGE: &str = "Native method has been deleted";

const REGISTER_NATIVES: &str = "registerNatives";
const REGISTER_NATIVES_SIGNATURE: &str = "()V";

/// Rule that replaces native methods with generated bodies.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeStubRule;

impl NativeStubRule {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn is_registering(member: &Member) -> bool {
        member.member_name == REGISTER_NATIVES && member.signature == REGISTER_NATIVES_SIGNATURE
    }
}

impl MemberDefinitionProvider for NativeStubRule {
    fn name(&self) -> &'static str {
        "NativeStubRule"
    }

    fn define(&self, ctx: &AnalysisContext, member: Member) -> Member {
        if !member.is_native() {
            return member;
        }

        let allowed_owner = member.class_name == ctx.config().allowed_native_owner;
        let access = member.access - AccessFlags::NATIVE;

        if allowed_owner {
            if !Self::is_registering(&member) {
                return member;
            }
            log::debug!("{}: native registration replaced by no-op", member.qualified_name());
            return member.with_access(access).with_body_writer(write_stub_body);
        }

        log::debug!("{}: native method replaced by throwing stub", member.qualified_name());
        member.with_access(access).with_body_writer(write_exception_body)
    }
}

/// Writes a body that returns immediately.
///
/// # Errors
///
/// Never fails in practice; the signature matches [`crate::metadata::BodyWriter`].
pub fn write_stub_body(emitter: &mut CodeEmitter) -> Result<()> {
    emitter.return_void()?;
    Ok(())
}

/// Writes a body that throws the rule-violation signal.
///
/// # Errors
///
/// Never fails in practice; the signature matches [`crate::metadata::BodyWriter`].
pub fn write_exception_body(emitter: &mut CodeEmitter) -> Result<()> {
    let throw = emitter.new_label()?;
    emitter
        .label(throw)?
        .line_number(0, throw)?
        .new_object(names::RULE_VIOLATION_EXCEPTION)?
        .dup()?
        .ldc(Constant::String(NATIVE_DELETED_MESSAGE.to_string()))?
        .invoke_special(
            names::RULE_VIOLATION_EXCEPTION,
            names::CONSTRUCTOR_NAME,
            "(Ljava/lang/String;)V",
        )?
        .athrow()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{Instruction, Opcode, Operand},
        config::SandboxConfig,
        test::native_member,
    };

    fn define(member: Member) -> Member {
        NativeStubRule.define(&AnalysisContext::default(), member)
    }

    #[test]
    fn test_native_method_throws() -> Result<()> {
        let member = define(native_member("com/example/Widget", "foo", "()I"));
        assert!(!member.is_native());
        assert!(member.access.contains(AccessFlags::PUBLIC));
        assert_eq!(member.body.len(), 1);

        let (code, max_stack) = member.write_body()?.unwrap();
        assert_eq!(max_stack, 3);
        assert!(matches!(code[0], Instruction::Label(_)));
        assert!(matches!(code[1], Instruction::LineNumber { line: 0, .. }));
        assert_eq!(
            code[2],
            Instruction::type_insn(Opcode::New, names::RULE_VIOLATION_EXCEPTION)
        );
        assert_eq!(code[3].opcode(), Some(Opcode::Dup));
        assert_eq!(
            code[4],
            Instruction::with_operand(
                Opcode::Ldc,
                Operand::Constant(Constant::String(NATIVE_DELETED_MESSAGE.into()))
            )
        );
        assert_eq!(
            code[5].to_string(),
            format!(
                "INVOKESPECIAL {}.<init>(Ljava/lang/String;)V",
                names::RULE_VIOLATION_EXCEPTION
            )
        );
        assert_eq!(code[6].opcode(), Some(Opcode::Athrow));
        assert_eq!(code.len(), 7);
        Ok(())
    }

    #[test]
    fn test_array_registration_is_noop() -> Result<()> {
        let member = define(native_member(names::REFLECT_ARRAY, "registerNatives", "()V"));
        assert!(!member.is_native());

        let (code, max_stack) = member.write_body()?.unwrap();
        assert_eq!(code, vec![Instruction::op(Opcode::Return)]);
        assert_eq!(max_stack, 0);
        Ok(())
    }

    #[test]
    fn test_registration_elsewhere_throws() -> Result<()> {
        let member = define(native_member("java/lang/Object", "registerNatives", "()V"));
        let (code, _) = member.write_body()?.unwrap();
        assert_eq!(code.last().and_then(Instruction::opcode), Some(Opcode::Athrow));
        Ok(())
    }

    #[test]
    fn test_other_array_natives_untouched() {
        let original = native_member(names::REFLECT_ARRAY, "getLength", "(Ljava/lang/Object;)I");
        let member = define(original.clone());
        assert!(member.is_native());
        assert!(member.body.is_empty());
        assert_eq!(member.access, original.access);
    }

    #[test]
    fn test_registration_signature_must_match() {
        let member = define(native_member(names::REFLECT_ARRAY, "registerNatives", "(I)V"));
        assert!(member.is_native());
    }

    #[test]
    fn test_non_native_unchanged_and_idempotent() {
        let plain = Member::new("a/B", "run", "()V", AccessFlags::PUBLIC);
        let same = define(plain);
        assert!(same.body.is_empty());

        let once = define(native_member("a/B", "run", "()V"));
        let twice = define(once.clone());
        assert_eq!(twice.access, once.access);
        assert_eq!(twice.body.len(), 1);
    }

    #[test]
    fn test_configured_owner() -> Result<()> {
        let ctx = AnalysisContext::new(SandboxConfig {
            allowed_native_owner: "custom/Natives".to_string(),
            ..SandboxConfig::default()
        });
        let member = NativeStubRule.define(
            &ctx,
            native_member("custom/Natives", "registerNatives", "()V"),
        );
        let (code, _) = member.write_body()?.unwrap();
        assert_eq!(code, vec![Instruction::op(Opcode::Return)]);
        Ok(())
    }

    #[test]
    fn test_existing_body_writers_kept() {
        let member = native_member("a/B", "run", "()V").with_body_writer(|_| Ok(()));
        assert_eq!(define(member).body.len(), 2);
    }
}
