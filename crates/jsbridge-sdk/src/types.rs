//! Type identities for values crossing the bridge
//!
//! A `JavaTypeId` names one host type, distinguishing the primitive form
//! (`Int`) from its boxed wrapper (`BoxedInt`). A `TypeIdentity` adds the
//! array dimension on top of it.

use std::fmt;

/// Host type identity of a single (non-array) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JavaTypeId {
    /// `void`, no value at all
    Void,
    /// `java.lang.Void`, boxed void
    BoxedVoid,
    /// `kotlin.Unit`, boxed void of Kotlin lambdas
    Unit,
    /// `boolean`
    Boolean,
    /// `java.lang.Boolean`
    BoxedBoolean,
    /// `byte`
    Byte,
    /// `java.lang.Byte`
    BoxedByte,
    /// `short`
    Short,
    /// `java.lang.Short`
    BoxedShort,
    /// `int`
    Int,
    /// `java.lang.Integer`
    BoxedInt,
    /// `long`
    Long,
    /// `java.lang.Long`
    BoxedLong,
    /// `float`
    Float,
    /// `java.lang.Float`
    BoxedFloat,
    /// `double`
    Double,
    /// `java.lang.Double`
    BoxedDouble,
    /// `java.lang.String`
    String,
    /// `java.lang.Object`
    Object,
}

impl JavaTypeId {
    /// Host class name for this type (primitive keyword for primitives)
    pub const fn class_name(self) -> &'static str {
        match self {
            JavaTypeId::Void => "void",
            JavaTypeId::BoxedVoid => "java.lang.Void",
            JavaTypeId::Unit => "kotlin.Unit",
            JavaTypeId::Boolean => "boolean",
            JavaTypeId::BoxedBoolean => "java.lang.Boolean",
            JavaTypeId::Byte => "byte",
            JavaTypeId::BoxedByte => "java.lang.Byte",
            JavaTypeId::Short => "short",
            JavaTypeId::BoxedShort => "java.lang.Short",
            JavaTypeId::Int => "int",
            JavaTypeId::BoxedInt => "java.lang.Integer",
            JavaTypeId::Long => "long",
            JavaTypeId::BoxedLong => "java.lang.Long",
            JavaTypeId::Float => "float",
            JavaTypeId::BoxedFloat => "java.lang.Float",
            JavaTypeId::Double => "double",
            JavaTypeId::BoxedDouble => "java.lang.Double",
            JavaTypeId::String => "java.lang.String",
            JavaTypeId::Object => "java.lang.Object",
        }
    }

    /// Whether this is an unboxed primitive (including `void`)
    pub const fn is_primitive(self) -> bool {
        matches!(
            self,
            JavaTypeId::Void
                | JavaTypeId::Boolean
                | JavaTypeId::Byte
                | JavaTypeId::Short
                | JavaTypeId::Int
                | JavaTypeId::Long
                | JavaTypeId::Float
                | JavaTypeId::Double
        )
    }

    /// Whether a value of this type may be null
    pub const fn is_nullable(self) -> bool {
        !self.is_primitive()
    }

    /// The boxed counterpart of a primitive (identity for reference types)
    pub const fn boxed(self) -> JavaTypeId {
        match self {
            JavaTypeId::Void => JavaTypeId::BoxedVoid,
            JavaTypeId::Boolean => JavaTypeId::BoxedBoolean,
            JavaTypeId::Byte => JavaTypeId::BoxedByte,
            JavaTypeId::Short => JavaTypeId::BoxedShort,
            JavaTypeId::Int => JavaTypeId::BoxedInt,
            JavaTypeId::Long => JavaTypeId::BoxedLong,
            JavaTypeId::Float => JavaTypeId::BoxedFloat,
            JavaTypeId::Double => JavaTypeId::BoxedDouble,
            other => other,
        }
    }

    /// The primitive counterpart of a boxed wrapper, if there is one
    pub const fn unboxed(self) -> Option<JavaTypeId> {
        match self {
            JavaTypeId::BoxedVoid | JavaTypeId::Unit => Some(JavaTypeId::Void),
            JavaTypeId::BoxedBoolean => Some(JavaTypeId::Boolean),
            JavaTypeId::BoxedByte => Some(JavaTypeId::Byte),
            JavaTypeId::BoxedShort => Some(JavaTypeId::Short),
            JavaTypeId::BoxedInt => Some(JavaTypeId::Int),
            JavaTypeId::BoxedLong => Some(JavaTypeId::Long),
            JavaTypeId::BoxedFloat => Some(JavaTypeId::Float),
            JavaTypeId::BoxedDouble => Some(JavaTypeId::Double),
            _ => None,
        }
    }

    /// Look up a type by its host class name
    pub fn from_class_name(name: &str) -> Option<JavaTypeId> {
        ALL_TYPE_IDS
            .iter()
            .copied()
            .find(|id| id.class_name() == name)
    }
}

impl fmt::Display for JavaTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Every known type identity, in declaration order
pub const ALL_TYPE_IDS: [JavaTypeId; 19] = [
    JavaTypeId::Void,
    JavaTypeId::BoxedVoid,
    JavaTypeId::Unit,
    JavaTypeId::Boolean,
    JavaTypeId::BoxedBoolean,
    JavaTypeId::Byte,
    JavaTypeId::BoxedByte,
    JavaTypeId::Short,
    JavaTypeId::BoxedShort,
    JavaTypeId::Int,
    JavaTypeId::BoxedInt,
    JavaTypeId::Long,
    JavaTypeId::BoxedLong,
    JavaTypeId::Float,
    JavaTypeId::BoxedFloat,
    JavaTypeId::Double,
    JavaTypeId::BoxedDouble,
    JavaTypeId::String,
    JavaTypeId::Object,
];

/// Declared type of a parameter or return value.
///
/// Arrays are one-dimensional: `int[]` is `ArrayOf(Int)`, `Integer[]` is
/// `ArrayOf(BoxedInt)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeIdentity {
    /// A single value
    Scalar(JavaTypeId),
    /// An array of values
    ArrayOf(JavaTypeId),
}

impl TypeIdentity {
    /// The scalar type, or the element type for arrays
    pub const fn element(self) -> JavaTypeId {
        match self {
            TypeIdentity::Scalar(id) | TypeIdentity::ArrayOf(id) => id,
        }
    }

    /// Whether this is an array identity
    pub const fn is_array(self) -> bool {
        matches!(self, TypeIdentity::ArrayOf(_))
    }
}

impl From<JavaTypeId> for TypeIdentity {
    fn from(id: JavaTypeId) -> Self {
        TypeIdentity::Scalar(id)
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeIdentity::Scalar(id) => write!(f, "{}", id),
            TypeIdentity::ArrayOf(id) => write!(f, "Array<{}>", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxing_pairs() {
        for id in ALL_TYPE_IDS {
            if id.is_primitive() {
                assert_eq!(id.boxed().unboxed(), Some(id));
            }
        }
        assert_eq!(JavaTypeId::Unit.unboxed(), Some(JavaTypeId::Void));
        assert_eq!(JavaTypeId::String.unboxed(), None);
    }

    #[test]
    fn test_nullability() {
        assert!(!JavaTypeId::Int.is_nullable());
        assert!(JavaTypeId::BoxedInt.is_nullable());
        assert!(JavaTypeId::String.is_nullable());
    }

    #[test]
    fn test_class_name_lookup() {
        assert_eq!(
            JavaTypeId::from_class_name("java.lang.Integer"),
            Some(JavaTypeId::BoxedInt)
        );
        assert_eq!(JavaTypeId::from_class_name("com.example.Foo"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeIdentity::ArrayOf(JavaTypeId::Int).to_string(), "Array<int>");
        assert_eq!(TypeIdentity::Scalar(JavaTypeId::BoxedLong).to_string(), "java.lang.Long");
    }
}
