//! `void`, `java.lang.Void` and `kotlin.Unit`
//!
//! Unboxed `void` has no script representation: it produces and consumes no
//! script value and always reads as null. The boxed forms occupy one script
//! value, `undefined`, and read back as a fresh instance of the unit class.

use jsbridge_sdk::{BridgeError, BridgeResult, HostArray, JValue, JavaTypeId, LocalRef, MethodId};

use super::{invoke_host, JavaType};
use crate::context::ConversionContext;
use crate::engine::{ElementSink, ElementSource};
use crate::script::ScriptValue;

/// Converter for the void family
pub struct VoidType {
    id: JavaTypeId,
}

impl VoidType {
    /// Converter for `Void`, `BoxedVoid` or `Unit`
    pub fn new(id: JavaTypeId) -> Self {
        debug_assert!(matches!(
            id,
            JavaTypeId::Void | JavaTypeId::BoxedVoid | JavaTypeId::Unit
        ));
        Self { id }
    }

    fn is_boxed(&self) -> bool {
        self.id != JavaTypeId::Void
    }
}

impl JavaType for VoidType {
    fn id(&self) -> JavaTypeId {
        self.id
    }

    fn script_slots(&self) -> usize {
        if self.is_boxed() {
            1
        } else {
            0
        }
    }

    fn to_host(&self, cx: &ConversionContext, _value: &ScriptValue, _in_script: bool) -> BridgeResult<JValue> {
        if !self.is_boxed() {
            return Ok(JValue::Null);
        }
        cx.host()
            .new_object(self.id.class_name())
            .map(JValue::Object)
            .map_err(BridgeError::HostInvocation)
    }

    fn from_host(
        &self,
        _cx: &ConversionContext,
        _value: &JValue,
        _in_script: bool,
    ) -> BridgeResult<Option<ScriptValue>> {
        Ok(self.is_boxed().then_some(ScriptValue::Undefined))
    }

    fn to_host_array(
        &self,
        _cx: &ConversionContext,
        source: &mut dyn ElementSource,
        _in_script: bool,
    ) -> BridgeResult<JValue> {
        // Elements carry no payload; only the count survives.
        let mut len = 0;
        while source.next_element()?.is_some() {
            len += 1;
        }
        Ok(JValue::Array(HostArray::new(self.id, len)))
    }

    fn from_host_array(
        &self,
        _cx: &ConversionContext,
        _items: &[JValue],
        _sink: &mut dyn ElementSink,
        _in_script: bool,
    ) -> BridgeResult<()> {
        Err(BridgeError::unsupported(format!(
            "an array of {} has no script representation",
            self.id
        )))
    }

    fn call_method(
        &self,
        cx: &ConversionContext,
        method: MethodId,
        this: &LocalRef,
        args: Vec<JValue>,
    ) -> BridgeResult<JValue> {
        let mut result = invoke_host(cx, method, this, args)?;
        if self.is_boxed() {
            Ok(result)
        } else {
            result.release();
            Ok(JValue::Null)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ScriptArraySink, SliceSource};
    use crate::host::ManagedHeap;
    use jsbridge_sdk::{HostObjectKind, HostRuntime};

    #[test]
    fn test_unboxed_void() {
        let heap = ManagedHeap::new();
        let cx = ConversionContext::new(heap, false);
        let void = VoidType::new(JavaTypeId::Void);
        assert_eq!(void.script_slots(), 0);
        assert!(void.to_host(&cx, &ScriptValue::Int(5), false).unwrap().is_null());
        assert!(void.from_host(&cx, &JValue::Null, false).unwrap().is_none());
    }

    #[test]
    fn test_boxed_void_materializes_instance() {
        let heap = ManagedHeap::new();
        let cx = ConversionContext::new(heap.clone(), false);
        for id in [JavaTypeId::BoxedVoid, JavaTypeId::Unit] {
            let void = VoidType::new(id);
            assert_eq!(void.script_slots(), 1);
            let host = void.to_host(&cx, &ScriptValue::Undefined, false).unwrap();
            let obj = host.as_object().unwrap();
            assert_eq!(heap.object_kind(obj), HostObjectKind::Typed(id));
            assert!(matches!(
                void.from_host(&cx, &host, false).unwrap(),
                Some(ScriptValue::Undefined)
            ));
        }
    }

    #[test]
    fn test_void_arrays() {
        let heap = ManagedHeap::new();
        let cx = ConversionContext::new(heap, false);
        let void = VoidType::new(JavaTypeId::Unit);
        let items = [ScriptValue::Undefined, ScriptValue::Undefined];
        let mut source = SliceSource::new(&items);
        let host = void.to_host_array(&cx, &mut source, false).unwrap();
        let array = host.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array.element(), JavaTypeId::Unit);
        assert!(array.items().iter().all(JValue::is_null));
        assert!(source.next_element().unwrap().is_none());

        let mut sink = ScriptArraySink::new();
        let err = void
            .from_host_array(&cx, &[JValue::Null], &mut sink, false)
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedOperation { .. }));
        let err = void.from_host_array(&cx, &[], &mut sink, false).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedOperation { .. }));
    }
}
