use std::str::FromStr;

use anyhow::{Context, Result};
use jdescriptor::{MethodDescriptor, TypeDescriptor};

/// Count parameters in a JVM method descriptor.
pub fn method_param_count(descriptor: &str) -> Result<usize> {
    let descriptor = MethodDescriptor::from_str(descriptor).context("parse method descriptor")?;
    Ok(descriptor.parameter_types().len())
}

/// Return kind of a JVM method descriptor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReturnKind {
    Void,
    Primitive,
    Reference,
}

/// Determine the return kind from a JVM method descriptor.
pub fn method_return_kind(descriptor: &str) -> Result<ReturnKind> {
    let descriptor = MethodDescriptor::from_str(descriptor).context("parse method descriptor")?;
    let kind = match descriptor.return_type() {
        TypeDescriptor::Void => ReturnKind::Void,
        TypeDescriptor::Object(_) | TypeDescriptor::Array(_, _) => ReturnKind::Reference,
        _ => ReturnKind::Primitive,
    };
    Ok(kind)
}

/// Return-type signature text of a method descriptor (the part after `)`).
pub fn method_return_signature(descriptor: &str) -> Result<&str> {
    let close = descriptor
        .rfind(')')
        .with_context(|| format!("malformed method descriptor: {descriptor}"))?;
    Ok(&descriptor[close + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_parameters() {
        assert_eq!(method_param_count("()V").expect("parse"), 0);
        assert_eq!(
            method_param_count("(Ljava/lang/Object;Ljava/lang/Object;)I").expect("parse"),
            2
        );
        assert_eq!(method_param_count("(IJ[Ljava/lang/String;)V").expect("parse"), 3);
    }

    #[test]
    fn classifies_return_kinds() {
        assert_eq!(method_return_kind("()V").expect("parse"), ReturnKind::Void);
        assert_eq!(method_return_kind("()I").expect("parse"), ReturnKind::Primitive);
        assert_eq!(
            method_return_kind("()Ljava/lang/String;").expect("parse"),
            ReturnKind::Reference
        );
        assert_eq!(method_return_kind("()[B").expect("parse"), ReturnKind::Reference);
    }

    #[test]
    fn extracts_return_signature_text() {
        assert_eq!(
            method_return_signature("(II)Ljava/lang/String;").expect("parse"),
            "Ljava/lang/String;"
        );
        assert_eq!(method_return_signature("()V").expect("parse"), "V");
        assert!(method_return_signature("no-parens").is_err());
    }
}
