//! Integration tests for host → script invocation
//!
//! Every scenario runs against both engine backends through the same generic
//! driver, then checks the backend is left balanced.

use std::sync::Arc;

use jsbridge_core::{
    Backend, BridgeConfig, Handle, HandleEngine, JsBridgeContext, ManagedHeap, ScriptFunction, ScriptObject,
    ScriptPromise, ScriptValue, StackEngine,
};
use jsbridge_sdk::{
    ErrorKind, HostArray, HostRuntime, JValue, JavaTypeId, MethodDescriptor, Phase, Position, TypeIdentity,
};

fn number_arg(args: &[ScriptValue], index: usize) -> f64 {
    args.get(index).and_then(ScriptValue::as_number).unwrap_or(0.0)
}

fn script_target() -> ScriptObject {
    let obj = ScriptObject::new();
    obj.set(
        "concat",
        ScriptFunction::new("concat", |_, _, args| {
            let parts: Vec<String> = args.iter().map(ScriptValue::to_js_string).collect();
            Ok(ScriptValue::string(&parts.concat()))
        }),
    );
    obj.set(
        "count",
        ScriptFunction::new("count", |_, _, args| Ok(ScriptValue::Int(args.len() as i32))),
    );
    obj.set(
        "fail",
        ScriptFunction::new("fail", |_, _, _| Err(ScriptValue::error("Error", "bad"))),
    );
    obj.set("nothing", ScriptFunction::new("nothing", |_, _, _| Ok(ScriptValue::Undefined)));
    obj.set(
        "wrongType",
        ScriptFunction::new("wrongType", |_, _, _| Ok(ScriptValue::string("abc"))),
    );
    obj.set(
        "later",
        ScriptFunction::new("later", |scope, _, args| {
            let promise = ScriptPromise::new();
            let settle = promise.clone();
            let n = number_arg(args, 0);
            scope.enqueue(move |_| {
                settle.resolve(ScriptValue::number(n + 1.0));
                Ok(())
            });
            Ok(promise.into())
        }),
    );
    obj.set(
        "reject",
        ScriptFunction::new("reject", |scope, _, _| {
            let promise = ScriptPromise::new();
            let settle = promise.clone();
            scope.enqueue(move |_| {
                settle.reject(ScriptValue::error("Error", "boom"));
                Ok(())
            });
            Ok(promise.into())
        }),
    );
    obj.set(
        "never",
        ScriptFunction::new("never", |_, _, _| Ok(ScriptPromise::new().into())),
    );
    obj
}

fn doubler() -> ScriptFunction {
    ScriptFunction::new("double", |_, _, args| Ok(ScriptValue::number(number_arg(args, 0) * 2.0)))
}

fn scalar(id: JavaTypeId) -> TypeIdentity {
    TypeIdentity::Scalar(id)
}

fn run_scenarios<B: Backend>(
    bridge: &mut JsBridgeContext<B>,
    heap: &ManagedHeap,
    target: &B::Target,
    lambda: &B::Target,
    after_each: impl Fn(&JsBridgeContext<B>),
) {
    // Plain call with a string and an int
    let concat = bridge
        .bind_method(&MethodDescriptor::new(
            "concat",
            JavaTypeId::String,
            vec![scalar(JavaTypeId::String), scalar(JavaTypeId::Int)],
        ))
        .unwrap();
    let result = bridge
        .invoke(&concat, target, vec![JValue::Object(heap.new_string("x")), JValue::Int(3)], false)
        .unwrap();
    assert_eq!(heap.string_value(result.as_object().unwrap()).as_deref(), Some("x3"));
    drop(result);
    after_each(bridge);

    // Argument 1 fails; argument 0 is released exactly once
    let first = JValue::Object(heap.new_string("a"));
    let first_ref = first.as_object().unwrap().ref_id();
    let err = bridge
        .invoke(&concat, target, vec![first, JValue::Bool(true)], false)
        .unwrap_err();
    assert_eq!(err.phase(), Phase::ArgumentConversion);
    assert_eq!(err.kind(), ErrorKind::TypeConversion);
    assert_eq!(err.argument_index(), Some(1));
    assert!(!err.in_script());
    assert_eq!(heap.release_count(first_ref), 1);
    after_each(bridge);

    // Await a promise that resolves from a job
    let later = bridge
        .bind_method(&MethodDescriptor::new("later", JavaTypeId::Int, vec![scalar(JavaTypeId::Int)]))
        .unwrap();
    let value = bridge.invoke(&later, target, vec![JValue::Int(41)], true).unwrap();
    assert_eq!(value, JValue::Int(42));
    after_each(bridge);

    // Await a rejection
    let reject = bridge
        .bind_method(&MethodDescriptor::new("reject", JavaTypeId::Int, vec![]))
        .unwrap();
    let err = bridge.invoke(&reject, target, vec![], true).unwrap_err();
    assert_eq!(err.phase(), Phase::Await);
    assert_eq!(err.kind(), ErrorKind::AsyncRejection);
    assert!(err.to_string().contains("boom"));
    assert!(err.in_script());
    after_each(bridge);

    // A promise that never settles exhausts the job budget
    let never = bridge
        .bind_method(&MethodDescriptor::new("never", JavaTypeId::Object, vec![]))
        .unwrap();
    let err = bridge.invoke(&never, target, vec![], true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AsyncRejection);
    after_each(bridge);

    // Script exception from the call itself
    let fail = bridge
        .bind_method(&MethodDescriptor::new("fail", JavaTypeId::Void, vec![]))
        .unwrap();
    let err = bridge.invoke(&fail, target, vec![], false).unwrap_err();
    assert_eq!(err.phase(), Phase::Invocation);
    assert_eq!(err.kind(), ErrorKind::Script);
    assert!(err.in_script());
    after_each(bridge);

    // Unknown method name
    let missing = bridge
        .bind_method(&MethodDescriptor::new("missing", JavaTypeId::Void, vec![]))
        .unwrap();
    let err = bridge.invoke(&missing, target, vec![], false).unwrap_err();
    assert_eq!(err.phase(), Phase::Invocation);
    assert_eq!(err.error().script_error_name(), "TypeError");
    after_each(bridge);

    // Return value of the wrong type
    let wrong = bridge
        .bind_method(&MethodDescriptor::new("wrongType", JavaTypeId::Int, vec![]))
        .unwrap();
    let err = bridge.invoke(&wrong, target, vec![], false).unwrap_err();
    assert_eq!(err.phase(), Phase::ReturnConversion);
    assert_eq!(err.position(), Some(Position::ReturnValue));
    assert_eq!(err.kind(), ErrorKind::TypeConversion);
    after_each(bridge);

    // Void returns
    let void = bridge
        .bind_method(&MethodDescriptor::new("nothing", JavaTypeId::Void, vec![]))
        .unwrap();
    assert!(bridge.invoke(&void, target, vec![], false).unwrap().is_null());
    for (id, class) in [(JavaTypeId::BoxedVoid, "java.lang.Void"), (JavaTypeId::Unit, "kotlin.Unit")] {
        let boxed = bridge
            .bind_method(&MethodDescriptor::new("nothing", id, vec![]))
            .unwrap();
        let unit = bridge.invoke(&boxed, target, vec![], false).unwrap();
        assert_eq!(heap.class_of(unit.as_object().unwrap()).as_deref(), Some(class));
    }
    after_each(bridge);

    // Variadic: expanded, packed, and an element failure
    let count = bridge
        .bind_method(
            &MethodDescriptor::new(
                "count",
                JavaTypeId::Int,
                vec![scalar(JavaTypeId::String), TypeIdentity::ArrayOf(JavaTypeId::Int)],
            )
            .varargs(),
        )
        .unwrap();
    let expanded = vec![
        JValue::Object(heap.new_string("head")),
        JValue::Int(1),
        JValue::Int(2),
        JValue::Int(3),
    ];
    assert_eq!(bridge.invoke(&count, target, expanded, false).unwrap(), JValue::Int(4));
    let packed = vec![
        JValue::Null,
        JValue::Array(HostArray::from_items(JavaTypeId::Int, vec![JValue::Int(1), JValue::Int(2), JValue::Int(3)])),
    ];
    assert_eq!(bridge.invoke(&count, target, packed, false).unwrap(), JValue::Int(2));
    let bad = vec![JValue::Null, JValue::Int(1), JValue::Bool(false)];
    let err = bridge.invoke(&count, target, bad, false).unwrap_err();
    assert_eq!(err.argument_index(), Some(2));
    after_each(bridge);

    // Lambda: the target itself is the callable
    let double = bridge
        .bind_method(&MethodDescriptor::new("apply", JavaTypeId::Double, vec![scalar(JavaTypeId::Double)]).lambda())
        .unwrap();
    assert_eq!(
        bridge.invoke(&double, lambda, vec![JValue::Double(1.25)], false).unwrap(),
        JValue::Double(2.5)
    );
    after_each(bridge);

    assert_eq!(heap.live_local_refs(), 0);
    assert_eq!(heap.double_releases(), 0);
}

fn stack_bridge() -> (Arc<ManagedHeap>, JsBridgeContext<StackEngine>) {
    let heap = ManagedHeap::new();
    let bridge = JsBridgeContext::with_stack_engine(heap.clone(), BridgeConfig::default());
    (heap, bridge)
}

fn handle_bridge() -> (Arc<ManagedHeap>, JsBridgeContext<HandleEngine>) {
    let heap = ManagedHeap::new();
    let config = BridgeConfig {
        await_job_limit: 50,
        ..BridgeConfig::default()
    };
    let bridge = JsBridgeContext::with_handle_engine(heap.clone(), config);
    (heap, bridge)
}

#[test]
fn test_scenarios_on_stack_engine() {
    let (heap, mut bridge) = stack_bridge();
    let target = ScriptValue::from(script_target());
    let lambda = ScriptValue::from(doubler());
    run_scenarios(&mut bridge, &heap, &target, &lambda, |bridge| {
        assert_eq!(bridge.backend().depth(), 0);
        assert_eq!(bridge.backend().balance_violations(), 0);
    });
}

#[test]
fn test_scenarios_on_handle_engine() {
    let (heap, mut bridge) = handle_bridge();
    let target: Handle = bridge.backend_mut().new_value(script_target().into());
    let lambda: Handle = bridge.backend_mut().new_value(doubler().into());
    run_scenarios(&mut bridge, &heap, &target, &lambda, |bridge| {
        assert_eq!(bridge.backend().live_handles(), 2);
    });
    bridge.backend_mut().free_value(target);
    bridge.backend_mut().free_value(lambda);
    assert_eq!(bridge.backend().live_handles(), 0);
}

#[test]
fn test_pending_job_error_after_success() {
    let (_heap, mut bridge) = handle_bridge();
    let obj = ScriptObject::new();
    obj.set(
        "schedule",
        ScriptFunction::new("schedule", |scope, _, _| {
            scope.enqueue(|_| Err(ScriptValue::error("Error", "from a job")));
            Ok(ScriptPromise::resolved(ScriptValue::Int(1)).into())
        }),
    );
    let target = bridge.backend_mut().new_value(obj.into());
    let schedule = bridge
        .bind_method(&MethodDescriptor::new("schedule", JavaTypeId::Void, vec![]))
        .unwrap();

    // Not awaited: the job stays queued and nothing is pending yet.
    assert!(bridge.invoke(&schedule, &target, vec![], false).unwrap().is_null());

    bridge.backend().jobs().run_until_idle(10);
    let err = bridge.check_rethrow_js_error().unwrap_err();
    assert!(err.to_string().contains("from a job"));
    bridge.backend_mut().free_value(target);
}

#[test]
fn test_strict_numbers_rejects_fractions() {
    let heap = ManagedHeap::new();
    let config = BridgeConfig {
        strict_numbers: true,
        ..BridgeConfig::default()
    };
    let mut bridge = JsBridgeContext::with_stack_engine(heap, config);
    let obj = ScriptObject::new();
    obj.set("half", ScriptFunction::new("half", |_, _, _| Ok(ScriptValue::Float(2.5))));
    let target = ScriptValue::from(obj);

    let as_int = bridge
        .bind_method(&MethodDescriptor::new("half", JavaTypeId::Int, vec![]))
        .unwrap();
    let err = bridge.invoke(&as_int, &target, vec![], false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeConversion);

    let as_double = bridge
        .bind_method(&MethodDescriptor::new("half", JavaTypeId::Double, vec![]))
        .unwrap();
    assert_eq!(bridge.invoke(&as_double, &target, vec![], false).unwrap(), JValue::Double(2.5));
    assert_eq!(bridge.backend().depth(), 0);
}
