//! Method descriptors supplied by the reflection layer
//!
//! The bridge does not discover methods itself. A `DescriptorSource` hands it
//! a `MethodDescriptor` for a callable identity, and the bridge builds its
//! loader set from that.

use crate::host::MethodId;
use crate::types::{JavaTypeId, TypeIdentity};

/// Declared shape of a callable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Method name (property name on the script side)
    pub name: String,
    /// Declared return type
    pub return_type: TypeIdentity,
    /// Declared parameter types, in order
    pub parameters: Vec<TypeIdentity>,
    /// Whether the last parameter is a variadic array
    pub is_varargs: bool,
    /// Whether the method is the single method of a lambda-style interface
    pub is_lambda: bool,
}

impl MethodDescriptor {
    /// Create a plain (non-variadic, non-lambda) descriptor
    pub fn new(name: impl Into<String>, return_type: impl Into<TypeIdentity>, parameters: Vec<TypeIdentity>) -> Self {
        Self {
            name: name.into(),
            return_type: return_type.into(),
            parameters,
            is_varargs: false,
            is_lambda: false,
        }
    }

    /// Mark the method as variadic
    pub fn varargs(mut self) -> Self {
        self.is_varargs = true;
        self
    }

    /// Mark the method as a lambda
    pub fn lambda(mut self) -> Self {
        self.is_lambda = true;
        self
    }

    /// Host type signature, e.g. `(I[Ljava/lang/String;)V`
    pub fn signature(&self) -> String {
        let mut sig = String::from("(");
        for param in &self.parameters {
            sig.push_str(&type_signature(*param));
        }
        sig.push(')');
        sig.push_str(&type_signature(self.return_type));
        sig
    }
}

/// Source of method descriptors (the reflection layer)
pub trait DescriptorSource {
    /// Describe a callable, if it is known
    fn method_descriptor(&self, method: MethodId) -> Option<MethodDescriptor>;
}

/// Host type signature of a single type
pub fn type_signature(ty: TypeIdentity) -> String {
    match ty {
        TypeIdentity::Scalar(id) => element_signature(id),
        TypeIdentity::ArrayOf(id) => format!("[{}", element_signature(id)),
    }
}

fn element_signature(id: JavaTypeId) -> String {
    let code = match id {
        JavaTypeId::Void => "V",
        JavaTypeId::Boolean => "Z",
        JavaTypeId::Byte => "B",
        JavaTypeId::Short => "S",
        JavaTypeId::Int => "I",
        JavaTypeId::Long => "J",
        JavaTypeId::Float => "F",
        JavaTypeId::Double => "D",
        other => return format!("L{};", other.class_name().replace('.', "/")),
    };
    code.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature() {
        let desc = MethodDescriptor::new(
            "format",
            JavaTypeId::String,
            vec![
                TypeIdentity::Scalar(JavaTypeId::Int),
                TypeIdentity::ArrayOf(JavaTypeId::BoxedInt),
            ],
        )
        .varargs();
        assert_eq!(desc.signature(), "(I[Ljava/lang/Integer;)Ljava/lang/String;");
        assert!(desc.is_varargs);
        assert!(!desc.is_lambda);
    }

    #[test]
    fn test_void_signature() {
        let desc = MethodDescriptor::new("run", JavaTypeId::Void, vec![]).lambda();
        assert_eq!(desc.signature(), "()V");
        assert!(desc.is_lambda);
    }
}
