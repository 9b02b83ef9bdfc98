//! Traits for converting between `JValue` and plain Rust types.
//!
//! Host method implementations use these to unpack their arguments and
//! produce their results without matching on `JValue` by hand.
//!
//! # Example
//!
//! ```ignore
//! use jsbridge_sdk::{FromJValue, IntoJValue, JValue};
//!
//! fn add(args: &[JValue]) -> BridgeResult<JValue> {
//!     let a = i32::from_jvalue(&args[0])?;
//!     let b = i32::from_jvalue(&args[1])?;
//!     Ok((a + b).into_jvalue())
//! }
//! ```

use crate::error::{BridgeError, BridgeResult};
use crate::value::JValue;

/// Convert from a borrowed `JValue` into a Rust value.
pub trait FromJValue: Sized {
    /// Convert, returning a type conversion error if the tag doesn't match.
    fn from_jvalue(value: &JValue) -> BridgeResult<Self>;
}

/// Convert a Rust value into a `JValue`.
pub trait IntoJValue {
    /// Convert to JValue.
    fn into_jvalue(self) -> JValue;
}

macro_rules! primitive_conversions {
    ($($ty:ty => $accessor:ident, $name:literal);* $(;)?) => {
        $(
            impl FromJValue for $ty {
                fn from_jvalue(value: &JValue) -> BridgeResult<Self> {
                    value.$accessor().ok_or_else(|| {
                        BridgeError::type_conversion(value.type_name(), $name, false)
                    })
                }
            }

            impl IntoJValue for $ty {
                fn into_jvalue(self) -> JValue {
                    JValue::from(self)
                }
            }
        )*
    };
}

primitive_conversions! {
    bool => as_bool, "boolean";
    i8 => as_i8, "byte";
    i16 => as_i16, "short";
    i32 => as_i32, "int";
    i64 => as_i64, "long";
    f32 => as_f32, "float";
    f64 => as_f64, "double";
}

// Unit type (for methods that return void)
impl IntoJValue for () {
    fn into_jvalue(self) -> JValue {
        JValue::Null
    }
}

impl<T: IntoJValue> IntoJValue for Option<T> {
    fn into_jvalue(self) -> JValue {
        match self {
            Some(value) => value.into_jvalue(),
            None => JValue::Null,
        }
    }
}

impl<T: FromJValue> FromJValue for Option<T> {
    fn from_jvalue(value: &JValue) -> BridgeResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_jvalue(value).map(Some)
        }
    }
}
