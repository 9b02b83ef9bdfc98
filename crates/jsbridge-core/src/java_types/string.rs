//! `java.lang.String` converter

use jsbridge_sdk::{BridgeResult, HostObjectKind, JValue, JavaTypeId};

use super::{host_mismatch, script_mismatch, JavaType};
use crate::context::ConversionContext;
use crate::script::ScriptValue;

/// Converter between host strings and script strings
pub struct StringType;

impl JavaType for StringType {
    fn id(&self) -> JavaTypeId {
        JavaTypeId::String
    }

    fn to_host(&self, cx: &ConversionContext, value: &ScriptValue, in_script: bool) -> BridgeResult<JValue> {
        match value {
            ScriptValue::Null | ScriptValue::Undefined => Ok(JValue::Null),
            ScriptValue::String(s) => Ok(JValue::Object(cx.host().new_string(s))),
            ScriptValue::HostObject(global) => {
                let local = cx.host().new_local_ref(global);
                if cx.host().object_kind(&local) == HostObjectKind::Typed(JavaTypeId::String) {
                    Ok(JValue::Object(local))
                } else {
                    Err(script_mismatch(value, self.id(), in_script))
                }
            }
            other => Err(script_mismatch(other, self.id(), in_script)),
        }
    }

    fn from_host(
        &self,
        cx: &ConversionContext,
        value: &JValue,
        in_script: bool,
    ) -> BridgeResult<Option<ScriptValue>> {
        match value {
            JValue::Null => Ok(Some(ScriptValue::Null)),
            JValue::Object(obj) => cx
                .host()
                .string_value(obj)
                .map(|s| Some(ScriptValue::string(&s)))
                .ok_or_else(|| host_mismatch(cx, value, self.id(), in_script)),
            other => Err(host_mismatch(cx, other, self.id(), in_script)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManagedHeap;
    use jsbridge_sdk::BridgeError;

    #[test]
    fn test_roundtrip() {
        let heap = ManagedHeap::new();
        let cx = ConversionContext::new(heap.clone(), false);
        let host = StringType.to_host(&cx, &ScriptValue::string("héllo"), false).unwrap();
        let back = StringType.from_host(&cx, &host, false).unwrap().unwrap();
        assert_eq!(back.as_str(), Some("héllo"));
        drop(host);
        assert_eq!(heap.live_local_refs(), 0);
    }

    #[test]
    fn test_null_and_mismatch() {
        let heap = ManagedHeap::new();
        let cx = ConversionContext::new(heap.clone(), false);
        assert!(StringType.to_host(&cx, &ScriptValue::Null, false).unwrap().is_null());
        let err = StringType.to_host(&cx, &ScriptValue::Int(4), true).unwrap_err();
        assert_eq!(err, BridgeError::type_conversion("4", "java.lang.String", true));

        let not_a_string = JValue::Object(heap.new_instance("com.example.Thing"));
        let err = StringType.from_host(&cx, &not_a_string, false).unwrap_err();
        assert!(err.to_string().contains("com.example.Thing@"));
        assert!(StringType.from_host(&cx, &JValue::Int(1), false).is_err());
    }
}
