//! Host-side value representation
//!
//! A `JValue` is what converters materialize on the host side of the bridge:
//! nothing (null/void), a primitive, an owned host object reference, or a host
//! array.
//!
//! # Ownership
//!
//! ```text
//! Null / primitives   inline, freely copied via `copy_primitive`
//! Object(LocalRef)    exactly one owner; released once (explicitly or on drop)
//! Array(HostArray)    owns its elements; releasing the array releases them
//! ```
//!
//! `JValue` is intentionally not `Clone`: two values must never own the same
//! host reference.

use crate::refs::LocalRef;
use crate::types::JavaTypeId;

/// Host value crossing the bridge.
#[derive(Debug, Default)]
pub enum JValue {
    /// Null reference, or the absence of a value (`void`)
    #[default]
    Null,
    /// `boolean`
    Bool(bool),
    /// `byte`
    Byte(i8),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// Owned reference to a host object
    Object(LocalRef),
    /// Host array
    Array(HostArray),
}

impl JValue {
    /// Null value
    #[inline]
    pub const fn null() -> Self {
        JValue::Null
    }

    /// Default (zero) value of a primitive type, null for reference types
    pub fn zero_of(id: JavaTypeId) -> Self {
        match id {
            JavaTypeId::Boolean => JValue::Bool(false),
            JavaTypeId::Byte => JValue::Byte(0),
            JavaTypeId::Short => JValue::Short(0),
            JavaTypeId::Int => JValue::Int(0),
            JavaTypeId::Long => JValue::Long(0),
            JavaTypeId::Float => JValue::Float(0.0),
            JavaTypeId::Double => JValue::Double(0.0),
            _ => JValue::Null,
        }
    }

    /// Check if value is null
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, JValue::Null)
    }

    /// Check if value holds a host primitive
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            JValue::Bool(_)
                | JValue::Byte(_)
                | JValue::Short(_)
                | JValue::Int(_)
                | JValue::Long(_)
                | JValue::Float(_)
                | JValue::Double(_)
        )
    }

    /// Extract boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract byte value
    pub fn as_i8(&self) -> Option<i8> {
        match self {
            JValue::Byte(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract short value
    pub fn as_i16(&self) -> Option<i16> {
        match self {
            JValue::Short(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract int value
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            JValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract long value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract float value
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            JValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract double value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow the object reference
    pub fn as_object(&self) -> Option<&LocalRef> {
        match self {
            JValue::Object(r) => Some(r),
            _ => None,
        }
    }

    /// Borrow the host array
    pub fn as_array(&self) -> Option<&HostArray> {
        match self {
            JValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Take the object reference out, transferring ownership
    pub fn into_object(self) -> Option<LocalRef> {
        match self {
            JValue::Object(r) => Some(r),
            _ => None,
        }
    }

    /// Take the array out, transferring ownership
    pub fn into_array(self) -> Option<HostArray> {
        match self {
            JValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Copy a primitive or null value; `None` for owned handles.
    pub fn copy_primitive(&self) -> Option<JValue> {
        Some(match self {
            JValue::Null => JValue::Null,
            JValue::Bool(v) => JValue::Bool(*v),
            JValue::Byte(v) => JValue::Byte(*v),
            JValue::Short(v) => JValue::Short(*v),
            JValue::Int(v) => JValue::Int(*v),
            JValue::Long(v) => JValue::Long(*v),
            JValue::Float(v) => JValue::Float(*v),
            JValue::Double(v) => JValue::Double(*v),
            JValue::Object(_) | JValue::Array(_) => return None,
        })
    }

    /// Move the value out, leaving null behind
    pub fn take(&mut self) -> JValue {
        std::mem::take(self)
    }

    /// Release any host handle held by this value and reset it to null.
    pub fn release(&mut self) {
        match self.take() {
            JValue::Object(mut r) => r.release(),
            JValue::Array(mut a) => a.release(),
            _ => {}
        }
    }

    /// Release every value of a consumed argument list.
    pub fn release_all(values: &mut [JValue]) {
        for value in values.iter_mut() {
            value.release();
        }
    }

    /// Short name of the held kind, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            JValue::Null => "null",
            JValue::Bool(_) => "boolean",
            JValue::Byte(_) => "byte",
            JValue::Short(_) => "short",
            JValue::Int(_) => "int",
            JValue::Long(_) => "long",
            JValue::Float(_) => "float",
            JValue::Double(_) => "double",
            JValue::Object(_) => "object",
            JValue::Array(_) => "array",
        }
    }
}

impl PartialEq for JValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JValue::Null, JValue::Null) => true,
            (JValue::Bool(a), JValue::Bool(b)) => a == b,
            (JValue::Byte(a), JValue::Byte(b)) => a == b,
            (JValue::Short(a), JValue::Short(b)) => a == b,
            (JValue::Int(a), JValue::Int(b)) => a == b,
            (JValue::Long(a), JValue::Long(b)) => a == b,
            (JValue::Float(a), JValue::Float(b)) => a.to_bits() == b.to_bits(),
            (JValue::Double(a), JValue::Double(b)) => a.to_bits() == b.to_bits(),
            (JValue::Object(a), JValue::Object(b)) => a.object_id() == b.object_id(),
            (JValue::Array(a), JValue::Array(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! jvalue_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for JValue {
                fn from(v: $ty) -> Self {
                    JValue::$variant(v)
                }
            }
        )*
    };
}

jvalue_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    LocalRef => Object,
    HostArray => Array,
}

/// Host array with a declared element type.
///
/// Elements of primitive arrays are primitive `JValue`s; elements of object
/// arrays are `Object` or `Null`.
#[derive(Debug, PartialEq)]
pub struct HostArray {
    element: JavaTypeId,
    items: Vec<JValue>,
}

impl HostArray {
    /// Allocate an array of `len` default elements
    pub fn new(element: JavaTypeId, len: usize) -> Self {
        let items = (0..len).map(|_| JValue::zero_of(element)).collect();
        Self { element, items }
    }

    /// Build an array from existing elements
    pub fn from_items(element: JavaTypeId, items: Vec<JValue>) -> Self {
        Self { element, items }
    }

    /// Element type
    pub fn element(&self) -> JavaTypeId {
        self.element
    }

    /// Array length
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if array is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Borrow element at index
    pub fn get(&self, index: usize) -> Option<&JValue> {
        self.items.get(index)
    }

    /// Store an element, releasing whatever it replaces.
    ///
    /// Returns `false` (and releases `value`) when `index` is out of bounds.
    pub fn set(&mut self, index: usize, mut value: JValue) -> bool {
        match self.items.get_mut(index) {
            Some(slot) => {
                slot.release();
                *slot = value;
                true
            }
            None => {
                value.release();
                false
            }
        }
    }

    /// Borrow all elements
    pub fn items(&self) -> &[JValue] {
        &self.items
    }

    /// Take ownership of the elements
    pub fn into_items(self) -> Vec<JValue> {
        self.items
    }

    /// Release every element handle
    pub fn release(&mut self) {
        JValue::release_all(&mut self.items);
    }
}
