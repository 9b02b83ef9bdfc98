//! Integration tests for the converter family on both backends
//!
//! Round trips every primitive in unboxed and boxed form, including boxed
//! null, and checks void and numeric truncation semantics.

use std::sync::Arc;

use jsbridge_core::{ConversionContext, HandleEngine, JavaTypeProvider, ManagedHeap, ScriptArray, ScriptValue, StackEngine};
use jsbridge_sdk::{BridgeError, HostArray, HostObjectKind, HostRuntime, JValue, JavaTypeId, TypeIdentity};

fn setup() -> (Arc<ManagedHeap>, ConversionContext, JavaTypeProvider) {
    let heap = ManagedHeap::new();
    let cx = ConversionContext::new(heap.clone(), false);
    (heap, cx, JavaTypeProvider::new())
}

fn samples() -> Vec<(JavaTypeId, JValue)> {
    vec![
        (JavaTypeId::Boolean, JValue::Bool(true)),
        (JavaTypeId::Byte, JValue::Byte(-7)),
        (JavaTypeId::Short, JValue::Short(12_345)),
        (JavaTypeId::Int, JValue::Int(i32::MIN)),
        (JavaTypeId::Long, JValue::Long(1 << 52)),
        (JavaTypeId::Float, JValue::Float(1.5)),
        (JavaTypeId::Double, JValue::Double(-0.125)),
    ]
}

fn copy(value: &JValue) -> JValue {
    value.copy_primitive().expect("primitive sample")
}

#[test]
fn test_primitive_round_trip_stack() {
    let (heap, cx, provider) = setup();
    let mut engine = StackEngine::new();
    for (id, sample) in samples() {
        let loader = provider.loader(TypeIdentity::Scalar(id));
        engine.push_host(&cx, &loader, &sample, false).unwrap();
        let back = engine.pop_host(&cx, &loader, false).unwrap();
        assert_eq!(back, sample, "{}", id);
    }
    assert!(engine.is_empty());
    assert_eq!(engine.balance_violations(), 0);
    assert_eq!(heap.live_local_refs(), 0);
}

#[test]
fn test_primitive_round_trip_handles() {
    let (heap, cx, provider) = setup();
    let mut engine = HandleEngine::new();
    for (id, sample) in samples() {
        let loader = provider.loader(TypeIdentity::Scalar(id));
        let handle = engine.to_script_handle(&cx, &loader, &sample, false).unwrap().unwrap();
        let back = engine.to_host_value(&cx, &loader, &handle, false).unwrap();
        engine.free_value(handle);
        assert_eq!(back, sample, "{}", id);
    }
    assert_eq!(engine.live_handles(), 0);
    assert_eq!(heap.live_local_refs(), 0);
}

#[test]
fn test_boxed_round_trip_and_null() {
    let (heap, cx, provider) = setup();
    let mut stack = StackEngine::new();
    let mut handles = HandleEngine::new();

    for (id, sample) in samples() {
        let boxed_id = id.boxed();
        let loader = provider.loader(TypeIdentity::Scalar(boxed_id));
        let boxed = JValue::Object(heap.new_boxed(copy(&sample)));

        stack.push_host(&cx, &loader, &boxed, false).unwrap();
        let from_stack = stack.pop_host(&cx, &loader, false).unwrap();
        let obj = from_stack.as_object().expect("boxed result");
        assert_eq!(heap.object_kind(obj), HostObjectKind::Typed(boxed_id));
        assert_eq!(heap.boxed_value(obj), Some(copy(&sample)));

        let handle = handles.to_script_handle(&cx, &loader, &boxed, false).unwrap().unwrap();
        let from_handles = handles.to_host_value(&cx, &loader, &handle, false).unwrap();
        handles.free_value(handle);
        assert_eq!(heap.boxed_value(from_handles.as_object().unwrap()), Some(copy(&sample)));

        // Boxed null survives both directions
        stack.push_host(&cx, &loader, &JValue::Null, false).unwrap();
        assert!(matches!(stack.peek(-1).unwrap(), ScriptValue::Null));
        assert!(stack.pop_host(&cx, &loader, false).unwrap().is_null());

        // Unboxed targets reject null
        let unboxed = provider.loader(TypeIdentity::Scalar(id));
        stack.push(ScriptValue::Null).unwrap();
        let err = stack.pop_host(&cx, &unboxed, false).unwrap_err();
        assert!(matches!(err, BridgeError::TypeConversion { .. }), "{}", id);
    }
    assert!(stack.is_empty());
    assert_eq!(stack.balance_violations(), 0);
    assert_eq!(handles.live_handles(), 0);
    assert_eq!(heap.live_local_refs(), 0);
    assert_eq!(heap.double_releases(), 0);
}

#[test]
fn test_truncation_toward_zero() {
    let (_heap, cx, provider) = setup();
    let mut engine = StackEngine::new();
    let cases = [
        (JavaTypeId::Int, 3.9, JValue::Int(3)),
        (JavaTypeId::Int, -3.9, JValue::Int(-3)),
        (JavaTypeId::Long, -3.9, JValue::Long(-3)),
        (JavaTypeId::Short, 3.9, JValue::Short(3)),
        (JavaTypeId::Byte, 300.7, JValue::Byte(44)),
        (JavaTypeId::Int, f64::NAN, JValue::Int(0)),
    ];
    for (id, input, expected) in cases {
        let loader = provider.loader(TypeIdentity::Scalar(id));
        engine.push(ScriptValue::Float(input)).unwrap();
        assert_eq!(engine.pop_host(&cx, &loader, false).unwrap(), expected, "{} from {}", id, input);
    }
}

#[test]
fn test_unboxed_void_produces_nothing() {
    let (_heap, cx, provider) = setup();
    let loader = provider.loader(TypeIdentity::Scalar(JavaTypeId::Void));
    assert_eq!(loader.script_slots(), 0);

    let mut stack = StackEngine::new();
    stack.push_host(&cx, &loader, &JValue::Null, false).unwrap();
    assert!(stack.is_empty());
    stack.push(ScriptValue::Int(1)).unwrap();
    assert!(stack.pop_host(&cx, &loader, false).unwrap().is_null());
    assert_eq!(stack.depth(), 1);
    assert_eq!(stack.balance_violations(), 0);

    let mut handles = HandleEngine::new();
    assert!(handles.to_script_handle(&cx, &loader, &JValue::Null, false).unwrap().is_none());
    assert_eq!(handles.live_handles(), 0);
}

#[test]
fn test_boxed_void_materializes_instance() {
    let (heap, cx, provider) = setup();
    for (id, class) in [(JavaTypeId::BoxedVoid, "java.lang.Void"), (JavaTypeId::Unit, "kotlin.Unit")] {
        let loader = provider.loader(TypeIdentity::Scalar(id));
        assert_eq!(loader.script_slots(), 1);

        let mut stack = StackEngine::new();
        stack.push_host(&cx, &loader, &JValue::Null, false).unwrap();
        assert!(matches!(stack.peek(-1).unwrap(), ScriptValue::Undefined));
        let unit = stack.pop_host(&cx, &loader, false).unwrap();
        assert_eq!(heap.class_of(unit.as_object().unwrap()).as_deref(), Some(class));
    }
}

#[test]
fn test_void_arrays() {
    let (_heap, cx, provider) = setup();
    let loader = provider.loader(TypeIdentity::ArrayOf(JavaTypeId::BoxedVoid));

    let host = JValue::Array(HostArray::new(JavaTypeId::BoxedVoid, 2));
    let mut stack = StackEngine::new();
    let err = stack.push_host(&cx, &loader, &host, false).unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedOperation { .. }));
    assert!(stack.is_empty());

    let mut handles = HandleEngine::new();
    let err = handles.to_script_handle(&cx, &loader, &host, false).unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedOperation { .. }));
    assert_eq!(handles.live_handles(), 0);

    // Script → host keeps the length, every element null
    stack.push(ScriptArray::from_vec(vec![ScriptValue::Undefined; 3]).into()).unwrap();
    let back = stack.pop_host(&cx, &loader, false).unwrap();
    let array = back.as_array().expect("host array");
    assert_eq!(array.len(), 3);
    assert_eq!(array.element(), JavaTypeId::BoxedVoid);
    assert!(array.items().iter().all(JValue::is_null));
    assert!(stack.is_empty());

    let h = handles.new_value(ScriptArray::from_vec(vec![ScriptValue::Undefined; 2]).into());
    let back = handles.to_host_value(&cx, &loader, &h, false).unwrap();
    assert_eq!(back.as_array().map(|a| a.len()), Some(2));
    handles.free_value(h);
    assert_eq!(handles.live_handles(), 0);
    assert_eq!(stack.balance_violations(), 0);
}

#[test]
fn test_object_and_string_through_handles() {
    let (heap, cx, provider) = setup();
    let object = provider.loader(TypeIdentity::Scalar(JavaTypeId::Object));
    let string = provider.loader(TypeIdentity::Scalar(JavaTypeId::String));
    let mut engine = HandleEngine::new();

    let thing = JValue::Object(heap.new_instance("com.example.Thing"));
    let handle = engine.to_script_handle(&cx, &object, &thing, false).unwrap().unwrap();
    assert!(matches!(engine.get(&handle).unwrap(), ScriptValue::HostObject(_)));
    let back = engine.to_host_value(&cx, &object, &handle, false).unwrap();
    assert_eq!(back, thing);
    engine.free_value(handle);

    let s = engine.new_value(ScriptValue::string("hello"));
    let host = engine.to_host_value(&cx, &string, &s, false).unwrap();
    assert_eq!(heap.string_value(host.as_object().unwrap()).as_deref(), Some("hello"));
    let err = engine.to_host_value(&cx, &provider.loader(TypeIdentity::Scalar(JavaTypeId::Int)), &s, false);
    assert!(err.is_err());
    engine.free_value(s);
    assert_eq!(engine.live_handles(), 0);
}
