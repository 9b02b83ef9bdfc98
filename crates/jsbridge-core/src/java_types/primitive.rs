//! Numeric and boolean converters, unboxed and boxed
//!
//! Reads accept both integer- and float-tagged script numbers. A float is
//! truncated toward zero and then narrowed to the target width the way the
//! host's own casts do (`(byte) 300.7 == 44`). With `strict_numbers` set, a
//! float with a fractional part is a type mismatch for integer targets.
//!
//! `long` values leave the script side as integer-tagged numbers when they
//! fit in 32 bits and as float-tagged numbers otherwise, so they round-trip
//! exactly only within ±2^53.

use std::marker::PhantomData;

use jsbridge_sdk::{
    BridgeResult, FromJValue, HostObjectKind, IntoJValue, JValue, JavaTypeId, LocalRef, MethodId,
};

use super::{host_mismatch, invoke_host, script_mismatch, JavaType};
use crate::box_cache;
use crate::context::ConversionContext;
use crate::script::ScriptValue;

/// A host primitive type
pub trait PrimitiveKind: FromJValue + IntoJValue + Copy + 'static {
    /// The unboxed type identity
    const TYPE: JavaTypeId;

    /// Read from a script value; `None` on a type mismatch
    fn from_script(value: &ScriptValue, strict: bool) -> Option<Self>;

    /// Write as a script value
    fn to_script(self) -> ScriptValue;
}

fn script_number(value: &ScriptValue, strict: bool) -> Option<f64> {
    match value {
        ScriptValue::Int(i) => Some(*i as f64),
        ScriptValue::Float(f) if strict && (f.fract() != 0.0 || !f.is_finite()) => None,
        ScriptValue::Float(f) => Some(*f),
        _ => None,
    }
}

impl PrimitiveKind for bool {
    const TYPE: JavaTypeId = JavaTypeId::Boolean;

    fn from_script(value: &ScriptValue, _strict: bool) -> Option<Self> {
        match value {
            ScriptValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn to_script(self) -> ScriptValue {
        ScriptValue::Bool(self)
    }
}

macro_rules! narrow_integer {
    ($($ty:ty => $id:ident),* $(,)?) => {
        $(
            impl PrimitiveKind for $ty {
                const TYPE: JavaTypeId = JavaTypeId::$id;

                fn from_script(value: &ScriptValue, strict: bool) -> Option<Self> {
                    match value {
                        ScriptValue::Int(i) => Some(*i as $ty),
                        // Saturate into int first, then wrap to the narrow width.
                        other => script_number(other, strict).map(|f| f as i32 as $ty),
                    }
                }

                fn to_script(self) -> ScriptValue {
                    ScriptValue::Int(self as i32)
                }
            }
        )*
    };
}

narrow_integer! {
    i8 => Byte,
    i16 => Short,
    i32 => Int,
}

impl PrimitiveKind for i64 {
    const TYPE: JavaTypeId = JavaTypeId::Long;

    fn from_script(value: &ScriptValue, strict: bool) -> Option<Self> {
        match value {
            ScriptValue::Int(i) => Some(*i as i64),
            other => script_number(other, strict).map(|f| f as i64),
        }
    }

    fn to_script(self) -> ScriptValue {
        match i32::try_from(self) {
            Ok(i) => ScriptValue::Int(i),
            Err(_) => ScriptValue::Float(self as f64),
        }
    }
}

impl PrimitiveKind for f32 {
    const TYPE: JavaTypeId = JavaTypeId::Float;

    fn from_script(value: &ScriptValue, _strict: bool) -> Option<Self> {
        script_number(value, false).map(|f| f as f32)
    }

    fn to_script(self) -> ScriptValue {
        ScriptValue::Float(self as f64)
    }
}

impl PrimitiveKind for f64 {
    const TYPE: JavaTypeId = JavaTypeId::Double;

    fn from_script(value: &ScriptValue, _strict: bool) -> Option<Self> {
        script_number(value, false)
    }

    fn to_script(self) -> ScriptValue {
        ScriptValue::Float(self)
    }
}

/// Converter for a primitive type or its wrapper class
pub struct Primitive<P> {
    boxed: bool,
    _kind: PhantomData<P>,
}

impl<P: PrimitiveKind> Primitive<P> {
    /// Converter for the raw primitive
    pub fn unboxed() -> Self {
        Self {
            boxed: false,
            _kind: PhantomData,
        }
    }

    /// Converter for the wrapper class
    pub fn boxed() -> Self {
        Self {
            boxed: true,
            _kind: PhantomData,
        }
    }

    /// Whether this converter handles the wrapper class
    pub fn is_boxed(&self) -> bool {
        self.boxed
    }

    fn host_primitive(&self, cx: &ConversionContext, value: &JValue, in_script: bool) -> BridgeResult<P> {
        let unboxed;
        let primitive = match value {
            JValue::Object(obj) => {
                unboxed = box_cache::unbox_object(cx.host(), P::TYPE, obj)?;
                &unboxed
            }
            other => other,
        };
        P::from_jvalue(primitive).map_err(|_| host_mismatch(cx, value, self.id(), in_script))
    }

    fn wrapper_ref(&self, cx: &ConversionContext, value: &ScriptValue) -> Option<LocalRef> {
        let ScriptValue::HostObject(global) = value else {
            return None;
        };
        let local = cx.host().new_local_ref(global);
        if cx.host().object_kind(&local) == HostObjectKind::Typed(P::TYPE.boxed()) {
            Some(local)
        } else {
            None
        }
    }
}

impl<P: PrimitiveKind> JavaType for Primitive<P> {
    fn id(&self) -> JavaTypeId {
        if self.boxed {
            P::TYPE.boxed()
        } else {
            P::TYPE
        }
    }

    fn to_host(&self, cx: &ConversionContext, value: &ScriptValue, in_script: bool) -> BridgeResult<JValue> {
        if value.is_null_or_undefined() {
            return if self.boxed {
                Ok(JValue::Null)
            } else {
                Err(script_mismatch(value, self.id(), in_script))
            };
        }
        if let Some(wrapper) = self.wrapper_ref(cx, value) {
            let object = JValue::Object(wrapper);
            return if self.boxed {
                Ok(object)
            } else {
                self.unbox_value(cx, object)
            };
        }
        let primitive = P::from_script(value, cx.strict_numbers())
            .ok_or_else(|| script_mismatch(value, self.id(), in_script))?;
        let host = primitive.into_jvalue();
        if self.boxed {
            self.box_value(cx, host)
        } else {
            Ok(host)
        }
    }

    fn from_host(
        &self,
        cx: &ConversionContext,
        value: &JValue,
        in_script: bool,
    ) -> BridgeResult<Option<ScriptValue>> {
        if value.is_null() {
            return if self.boxed {
                Ok(Some(ScriptValue::Null))
            } else {
                Err(host_mismatch(cx, value, self.id(), in_script))
            };
        }
        let primitive = self.host_primitive(cx, value, in_script)?;
        Ok(Some(primitive.to_script()))
    }

    fn call_method(
        &self,
        cx: &ConversionContext,
        method: MethodId,
        this: &LocalRef,
        args: Vec<JValue>,
    ) -> BridgeResult<JValue> {
        let result = invoke_host(cx, method, this, args)?;
        match (self.boxed, result.is_primitive()) {
            (true, true) => self.box_value(cx, result),
            (false, false) if !result.is_null() => self.unbox_value(cx, result),
            _ => Ok(result),
        }
    }

    fn box_value(&self, cx: &ConversionContext, value: JValue) -> BridgeResult<JValue> {
        if value.is_primitive() {
            box_cache::box_primitive(cx.host(), P::TYPE, value)
        } else {
            Ok(value)
        }
    }

    fn unbox_value(&self, cx: &ConversionContext, value: JValue) -> BridgeResult<JValue> {
        match value {
            JValue::Object(mut obj) => {
                let primitive = box_cache::unbox_object(cx.host(), P::TYPE, &obj);
                obj.release();
                primitive
            }
            other => Ok(other),
        }
    }
}
