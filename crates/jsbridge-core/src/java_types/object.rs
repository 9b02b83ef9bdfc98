//! `java.lang.Object` converter
//!
//! Maps values by their runtime type rather than a declared one:
//!
//! | script            | host                               |
//! |-------------------|------------------------------------|
//! | null / undefined  | null                               |
//! | boolean           | `java.lang.Boolean`                |
//! | int-tagged number | `java.lang.Integer`                |
//! | float number      | `java.lang.Double`                 |
//! | string            | `java.lang.String`                 |
//! | array             | `Object[]` (elements mapped again) |
//! | host wrapper      | the wrapped object                 |
//!
//! In the other direction, wrapper objects unbox, strings and unit instances
//! map back to their script forms, and every other object is handed to script
//! as a host wrapper holding a global reference.

use jsbridge_sdk::{BridgeError, BridgeResult, HostArray, HostObjectKind, JValue, JavaTypeId};

use super::{host_mismatch, script_mismatch, JavaType};
use crate::box_cache;
use crate::context::ConversionContext;
use crate::script::{ScriptArray, ScriptValue};

/// Dynamically typed converter
pub struct ObjectType;

impl ObjectType {
    fn scalar_to_host(&self, cx: &ConversionContext, value: &ScriptValue, in_script: bool) -> BridgeResult<JValue> {
        let host = cx.host();
        match value {
            ScriptValue::Null | ScriptValue::Undefined => Ok(JValue::Null),
            ScriptValue::Bool(b) => box_cache::box_primitive(host, JavaTypeId::Boolean, JValue::Bool(*b)),
            ScriptValue::Int(i) => box_cache::box_primitive(host, JavaTypeId::Int, JValue::Int(*i)),
            ScriptValue::Float(f) => box_cache::box_primitive(host, JavaTypeId::Double, JValue::Double(*f)),
            ScriptValue::String(s) => Ok(JValue::Object(host.new_string(s))),
            ScriptValue::HostObject(global) => Ok(JValue::Object(host.new_local_ref(global))),
            ScriptValue::Array(_) => Err(BridgeError::unsupported(
                "nested arrays cannot be converted to host values",
            )),
            other => Err(script_mismatch(other, self.id(), in_script)),
        }
    }

    fn primitive_to_script(value: &JValue) -> Option<ScriptValue> {
        Some(match value {
            JValue::Bool(b) => ScriptValue::Bool(*b),
            JValue::Byte(v) => ScriptValue::Int(*v as i32),
            JValue::Short(v) => ScriptValue::Int(*v as i32),
            JValue::Int(v) => ScriptValue::Int(*v),
            JValue::Long(v) => match i32::try_from(*v) {
                Ok(i) => ScriptValue::Int(i),
                Err(_) => ScriptValue::Float(*v as f64),
            },
            JValue::Float(v) => ScriptValue::Float(*v as f64),
            JValue::Double(v) => ScriptValue::Float(*v),
            _ => return None,
        })
    }
}

impl JavaType for ObjectType {
    fn id(&self) -> JavaTypeId {
        JavaTypeId::Object
    }

    fn to_host(&self, cx: &ConversionContext, value: &ScriptValue, in_script: bool) -> BridgeResult<JValue> {
        let ScriptValue::Array(array) = value else {
            return self.scalar_to_host(cx, value, in_script);
        };
        let mut items = HostArray::new(JavaTypeId::Object, array.len());
        for (index, element) in array.to_vec().iter().enumerate() {
            items.set(index, self.scalar_to_host(cx, element, in_script)?);
        }
        Ok(JValue::Array(items))
    }

    fn from_host(
        &self,
        cx: &ConversionContext,
        value: &JValue,
        in_script: bool,
    ) -> BridgeResult<Option<ScriptValue>> {
        if let Some(primitive) = Self::primitive_to_script(value) {
            return Ok(Some(primitive));
        }
        let host = cx.host();
        let script = match value {
            JValue::Null => ScriptValue::Null,
            JValue::Object(obj) => match host.object_kind(obj) {
                HostObjectKind::Typed(JavaTypeId::String) => match host.string_value(obj) {
                    Some(s) => ScriptValue::string(&s),
                    None => return Err(host_mismatch(cx, value, self.id(), in_script)),
                },
                HostObjectKind::Typed(JavaTypeId::BoxedVoid | JavaTypeId::Unit) => ScriptValue::Undefined,
                HostObjectKind::Typed(id) if id.unboxed().is_some() => {
                    let primitive = box_cache::unbox_object(host, id, obj)?;
                    Self::primitive_to_script(&primitive)
                        .ok_or_else(|| host_mismatch(cx, value, self.id(), in_script))?
                }
                _ => ScriptValue::HostObject(host.new_global_ref(obj)),
            },
            JValue::Array(array) => {
                let elements = ScriptArray::new();
                for (index, item) in array.items().iter().enumerate() {
                    let element = self.from_host(cx, item, in_script)?.unwrap_or(ScriptValue::Undefined);
                    elements.set(index, element);
                }
                ScriptValue::Array(elements)
            }
            other => return Err(host_mismatch(cx, other, self.id(), in_script)),
        };
        Ok(Some(script))
    }
}
