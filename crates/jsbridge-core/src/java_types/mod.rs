//! Per-type converters
//!
//! A converter is built for exactly one host type and translates values of
//! that type between `JValue` and `ScriptValue`:
//!
//! ```text
//!                to_host / to_host_array
//!   ScriptValue ─────────────────────────►  JValue
//!               ◄─────────────────────────
//!               from_host / from_host_array
//! ```
//!
//! Converters never touch an engine. The stack and handle backends feed them
//! isolated values and element sources/sinks, and own all slot and handle
//! bookkeeping around them.

mod object;
mod primitive;
mod string;
mod void;

pub use object::ObjectType;
pub use primitive::{Primitive, PrimitiveKind};
pub use string::StringType;
pub use void::VoidType;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use jsbridge_sdk::{
    BridgeError, BridgeResult, HostArray, HostException, HostRuntime, JValue, JavaTypeId, LocalRef,
    MethodId, TypeIdentity,
};

use crate::context::ConversionContext;
use crate::engine::{ElementSink, ElementSource, ScriptArraySink, SliceSource};
use crate::script::ScriptValue;

/// Converter for one host type
pub trait JavaType {
    /// Host type this converter handles
    fn id(&self) -> JavaTypeId;

    /// Script values produced or consumed per host value (0 for `void`)
    fn script_slots(&self) -> usize {
        1
    }

    /// Convert a script value to a host value.
    ///
    /// # Errors
    ///
    /// `TypeConversion` when the script type does not fit, tagged with
    /// `in_script`.
    fn to_host(&self, cx: &ConversionContext, value: &ScriptValue, in_script: bool) -> BridgeResult<JValue>;

    /// Convert a host value to script. `None` means the type produces no
    /// script value at all.
    fn from_host(
        &self,
        cx: &ConversionContext,
        value: &JValue,
        in_script: bool,
    ) -> BridgeResult<Option<ScriptValue>>;

    /// Build a host array from a sequence of script values.
    ///
    /// The array is allocated with the source's length up front; a failing
    /// element drops the partial array, releasing what it already holds.
    fn to_host_array(
        &self,
        cx: &ConversionContext,
        source: &mut dyn ElementSource,
        in_script: bool,
    ) -> BridgeResult<JValue> {
        let mut array = HostArray::new(self.id(), source.len());
        while let Some((index, value)) = source.next_element()? {
            let item = self.to_host(cx, &value, in_script)?;
            array.set(index, item);
        }
        Ok(JValue::Array(array))
    }

    /// Write host array elements into a script sequence, in index order
    fn from_host_array(
        &self,
        cx: &ConversionContext,
        items: &[JValue],
        sink: &mut dyn ElementSink,
        in_script: bool,
    ) -> BridgeResult<()> {
        for (index, item) in items.iter().enumerate() {
            let value = self.from_host(cx, item, in_script)?.ok_or_else(|| {
                BridgeError::unsupported(format!("{} elements have no script representation", self.id()))
            })?;
            sink.put(index, value)?;
        }
        Ok(())
    }

    /// Call a host method returning this type. Consumes `args`.
    fn call_method(
        &self,
        cx: &ConversionContext,
        method: MethodId,
        this: &LocalRef,
        args: Vec<JValue>,
    ) -> BridgeResult<JValue> {
        invoke_host(cx, method, this, args)
    }

    /// Wrap a primitive in its host object form
    fn box_value(&self, _cx: &ConversionContext, value: JValue) -> BridgeResult<JValue> {
        Ok(value)
    }

    /// Read the primitive out of a host object form
    fn unbox_value(&self, _cx: &ConversionContext, value: JValue) -> BridgeResult<JValue> {
        Ok(value)
    }
}

/// Perform a host call and check for a pending exception.
///
/// The arguments are released exactly once, whatever the outcome.
pub fn invoke_host(
    cx: &ConversionContext,
    method: MethodId,
    this: &LocalRef,
    mut args: Vec<JValue>,
) -> BridgeResult<JValue> {
    let host = cx.host();
    let result = host.call_method(method, this, &args);
    JValue::release_all(&mut args);
    check_exception(host)?;
    Ok(result)
}

/// Turn a pending host exception into an error
pub(crate) fn check_exception(host: &dyn HostRuntime) -> BridgeResult<()> {
    if !host.exception_check() {
        return Ok(());
    }
    let exception = host
        .take_exception()
        .unwrap_or_else(|| HostException::new("java.lang.Throwable", "exception pending"));
    Err(BridgeError::HostInvocation(exception))
}

pub(crate) fn script_mismatch(value: &ScriptValue, target: impl fmt::Display, in_script: bool) -> BridgeError {
    BridgeError::type_conversion(value.describe(), target.to_string(), in_script)
}

pub(crate) fn host_mismatch(
    cx: &ConversionContext,
    value: &JValue,
    target: impl fmt::Display,
    in_script: bool,
) -> BridgeError {
    let description = match value {
        JValue::Object(obj) => cx.host().describe(obj),
        other => other.type_name().to_string(),
    };
    BridgeError::type_conversion(description, target.to_string(), in_script)
}

// ============================================================================
// Loaders
// ============================================================================

/// Converter bound to a declared parameter or return type.
///
/// For an array type the converter is the element converter.
#[derive(Clone)]
pub struct Loader {
    identity: TypeIdentity,
    converter: Rc<dyn JavaType>,
}

impl Loader {
    /// Pair a declared type with its (element) converter
    pub fn new(identity: TypeIdentity, converter: Rc<dyn JavaType>) -> Self {
        Self { identity, converter }
    }

    /// Declared type
    pub fn identity(&self) -> TypeIdentity {
        self.identity
    }

    /// Converter (element converter for arrays)
    pub fn converter(&self) -> &dyn JavaType {
        self.converter.as_ref()
    }

    /// Whether the declared type is an array
    pub fn is_array(&self) -> bool {
        self.identity.is_array()
    }

    /// Loader for a single element of this type
    pub fn element(&self) -> Loader {
        Loader {
            identity: TypeIdentity::Scalar(self.identity.element()),
            converter: self.converter.clone(),
        }
    }

    /// Script values per host value: arrays are one packed value
    pub fn script_slots(&self) -> usize {
        if self.is_array() {
            1
        } else {
            self.converter.script_slots()
        }
    }

    /// Script→host of one isolated script value
    pub fn to_host(&self, cx: &ConversionContext, value: &ScriptValue, in_script: bool) -> BridgeResult<JValue> {
        if !self.is_array() {
            return self.converter.to_host(cx, value, in_script);
        }
        match value {
            ScriptValue::Null | ScriptValue::Undefined => Ok(JValue::Null),
            ScriptValue::Array(array) => {
                let items = array.to_vec();
                let mut source = SliceSource::new(&items);
                self.converter.to_host_array(cx, &mut source, in_script)
            }
            other => Err(script_mismatch(other, self.identity, in_script)),
        }
    }

    /// Host→script of one value into an isolated script value
    pub fn from_host(
        &self,
        cx: &ConversionContext,
        value: &JValue,
        in_script: bool,
    ) -> BridgeResult<Option<ScriptValue>> {
        if !self.is_array() {
            return self.converter.from_host(cx, value, in_script);
        }
        match value {
            JValue::Null => Ok(Some(ScriptValue::Null)),
            JValue::Array(array) => {
                let mut sink = ScriptArraySink::new();
                self.converter
                    .from_host_array(cx, array.items(), &mut sink, in_script)?;
                Ok(Some(sink.into_value()))
            }
            other => Err(host_mismatch(cx, other, self.identity, in_script)),
        }
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loader({})", self.identity)
    }
}

/// Maps type identities to converters, creating each converter once
#[derive(Default)]
pub struct JavaTypeProvider {
    cache: RefCell<HashMap<JavaTypeId, Rc<dyn JavaType>>>,
}

impl JavaTypeProvider {
    /// Empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Converter for a single type
    pub fn converter(&self, id: JavaTypeId) -> Rc<dyn JavaType> {
        self.cache
            .borrow_mut()
            .entry(id)
            .or_insert_with(|| create_converter(id))
            .clone()
    }

    /// Loader for a declared type
    pub fn loader(&self, identity: TypeIdentity) -> Loader {
        Loader::new(identity, self.converter(identity.element()))
    }

    /// Number of converters created so far
    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}

fn create_converter(id: JavaTypeId) -> Rc<dyn JavaType> {
    match id {
        JavaTypeId::Void | JavaTypeId::BoxedVoid | JavaTypeId::Unit => Rc::new(VoidType::new(id)),
        JavaTypeId::Boolean => Rc::new(Primitive::<bool>::unboxed()),
        JavaTypeId::BoxedBoolean => Rc::new(Primitive::<bool>::boxed()),
        JavaTypeId::Byte => Rc::new(Primitive::<i8>::unboxed()),
        JavaTypeId::BoxedByte => Rc::new(Primitive::<i8>::boxed()),
        JavaTypeId::Short => Rc::new(Primitive::<i16>::unboxed()),
        JavaTypeId::BoxedShort => Rc::new(Primitive::<i16>::boxed()),
        JavaTypeId::Int => Rc::new(Primitive::<i32>::unboxed()),
        JavaTypeId::BoxedInt => Rc::new(Primitive::<i32>::boxed()),
        JavaTypeId::Long => Rc::new(Primitive::<i64>::unboxed()),
        JavaTypeId::BoxedLong => Rc::new(Primitive::<i64>::boxed()),
        JavaTypeId::Float => Rc::new(Primitive::<f32>::unboxed()),
        JavaTypeId::BoxedFloat => Rc::new(Primitive::<f32>::boxed()),
        JavaTypeId::Double => Rc::new(Primitive::<f64>::unboxed()),
        JavaTypeId::BoxedDouble => Rc::new(Primitive::<f64>::boxed()),
        JavaTypeId::String => Rc::new(StringType),
        JavaTypeId::Object => Rc::new(ObjectType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManagedHeap;
    use crate::script::ScriptArray;
    use jsbridge_sdk::ALL_TYPE_IDS;

    fn cx() -> (std::sync::Arc<ManagedHeap>, ConversionContext) {
        let heap = ManagedHeap::new();
        let cx = ConversionContext::new(heap.clone(), false);
        (heap, cx)
    }

    #[test]
    fn test_provider_covers_every_type() {
        let provider = JavaTypeProvider::new();
        for id in ALL_TYPE_IDS {
            assert_eq!(provider.converter(id).id(), id);
        }
        assert_eq!(provider.cached(), ALL_TYPE_IDS.len());
        let a = provider.converter(JavaTypeId::Int);
        let b = provider.converter(JavaTypeId::Int);
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_array_loader_roundtrip() {
        let (_heap, cx) = cx();
        let provider = JavaTypeProvider::new();
        let loader = provider.loader(TypeIdentity::ArrayOf(JavaTypeId::Int));
        let script = ScriptValue::from(ScriptArray::from_vec(vec![1.into(), 2.into(), 3.5.into()]));

        let host = loader.to_host(&cx, &script, false).unwrap();
        let items: Vec<i32> = host.as_array().unwrap().items().iter().filter_map(JValue::as_i32).collect();
        assert_eq!(items, vec![1, 2, 3]);

        let back = loader.from_host(&cx, &host, false).unwrap().unwrap();
        assert_eq!(back.describe(), "1,2,3");
    }

    #[test]
    fn test_array_loader_null_and_mismatch() {
        let (_heap, cx) = cx();
        let provider = JavaTypeProvider::new();
        let loader = provider.loader(TypeIdentity::ArrayOf(JavaTypeId::String));
        assert!(loader.to_host(&cx, &ScriptValue::Undefined, false).unwrap().is_null());
        let err = loader.to_host(&cx, &ScriptValue::Int(1), true).unwrap_err();
        assert_eq!(
            err,
            BridgeError::type_conversion("1", "Array<java.lang.String>", true)
        );
        assert!(matches!(
            loader.from_host(&cx, &JValue::Null, false).unwrap(),
            Some(ScriptValue::Null)
        ));
    }

    #[test]
    fn test_failed_array_element_releases_partial_array() {
        let (heap, cx) = cx();
        let provider = JavaTypeProvider::new();
        let loader = provider.loader(TypeIdentity::ArrayOf(JavaTypeId::String));
        let script = ScriptValue::from(ScriptArray::from_vec(vec!["a".into(), "b".into(), 3.into()]));
        assert!(loader.to_host(&cx, &script, false).is_err());
        assert_eq!(heap.live_local_refs(), 0);
        assert_eq!(heap.double_releases(), 0);
    }

    #[test]
    fn test_invoke_host_releases_args_on_exception() {
        let (heap, cx) = cx();
        let desc = jsbridge_sdk::MethodDescriptor::new(
            "fail",
            JavaTypeId::Void,
            vec![TypeIdentity::Scalar(JavaTypeId::String)],
        );
        let method = heap.register_method("com.example.T", desc, |_, _, _| {
            Err(HostException::new("java.lang.IllegalStateException", "nope"))
        });
        let this = heap.new_instance("com.example.T");
        let arg = JValue::Object(heap.new_string("x"));
        let arg_ref = arg.as_object().map(LocalRef::ref_id).unwrap();

        let err = invoke_host(&cx, method, &this, vec![arg]).unwrap_err();
        assert!(matches!(err, BridgeError::HostInvocation(ref e) if e.message == "nope"));
        assert_eq!(heap.release_count(arg_ref), 1);
        assert!(!heap.exception_check());
    }
}
