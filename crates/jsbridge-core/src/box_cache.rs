//! Process-wide cache of boxing accessors
//!
//! Converting between a primitive and its wrapper object goes through two host
//! methods per primitive type: the static `valueOf` factory and the instance
//! `xValue` accessor. Resolving them is a host lookup, so each one is resolved
//! on first use and memoized for the life of the process.
//!
//! ```text
//! (runtime id, primitive type, accessor)  ──►  MethodId
//! ```
//!
//! The runtime id is part of the key: method ids are only stable within one
//! host runtime instance.

use dashmap::DashMap;
use jsbridge_sdk::{
    BridgeError, BridgeResult, HostException, HostRuntime, JValue, JavaTypeId, LocalRef, MethodId,
};
use once_cell::sync::Lazy;
use tracing::trace;

use crate::java_types::check_exception;

/// Which boxing accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessor {
    /// Static factory: primitive → wrapper
    Box,
    /// Instance accessor: wrapper → primitive
    Unbox,
}

/// Lookup coordinates of one accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessorSpec {
    /// Wrapper class
    pub class: &'static str,
    /// Method name
    pub name: &'static str,
    /// Host type signature
    pub signature: &'static str,
    /// Whether the method is static
    pub is_static: bool,
}

type CacheKey = (u64, JavaTypeId, Accessor);

static ACCESSORS: Lazy<DashMap<CacheKey, MethodId>> = Lazy::new(DashMap::new);

const fn spec(class: &'static str, name: &'static str, signature: &'static str, is_static: bool) -> AccessorSpec {
    AccessorSpec {
        class,
        name,
        signature,
        is_static,
    }
}

/// Accessor coordinates for a primitive type (or its wrapper)
pub fn accessor_spec(id: JavaTypeId, accessor: Accessor) -> Option<AccessorSpec> {
    let primitive = if id.is_primitive() { id } else { id.unboxed()? };
    let (boxer, unboxer) = match primitive {
        JavaTypeId::Boolean => (
            spec("java.lang.Boolean", "valueOf", "(Z)Ljava/lang/Boolean;", true),
            spec("java.lang.Boolean", "booleanValue", "()Z", false),
        ),
        JavaTypeId::Byte => (
            spec("java.lang.Byte", "valueOf", "(B)Ljava/lang/Byte;", true),
            spec("java.lang.Byte", "byteValue", "()B", false),
        ),
        JavaTypeId::Short => (
            spec("java.lang.Short", "valueOf", "(S)Ljava/lang/Short;", true),
            spec("java.lang.Short", "shortValue", "()S", false),
        ),
        JavaTypeId::Int => (
            spec("java.lang.Integer", "valueOf", "(I)Ljava/lang/Integer;", true),
            spec("java.lang.Integer", "intValue", "()I", false),
        ),
        JavaTypeId::Long => (
            spec("java.lang.Long", "valueOf", "(J)Ljava/lang/Long;", true),
            spec("java.lang.Long", "longValue", "()J", false),
        ),
        JavaTypeId::Float => (
            spec("java.lang.Float", "valueOf", "(F)Ljava/lang/Float;", true),
            spec("java.lang.Float", "floatValue", "()F", false),
        ),
        JavaTypeId::Double => (
            spec("java.lang.Double", "valueOf", "(D)Ljava/lang/Double;", true),
            spec("java.lang.Double", "doubleValue", "()D", false),
        ),
        _ => return None,
    };
    Some(match accessor {
        Accessor::Box => boxer,
        Accessor::Unbox => unboxer,
    })
}

/// Resolve an accessor, consulting the cache first.
///
/// # Errors
///
/// Fails with `UnsupportedOperation` for types without a wrapper and with
/// `HostInvocation` when the host does not know the method.
pub fn resolve(host: &dyn HostRuntime, id: JavaTypeId, accessor: Accessor) -> BridgeResult<MethodId> {
    let spec = accessor_spec(id, accessor)
        .ok_or_else(|| BridgeError::unsupported(format!("{} has no boxing accessors", id)))?;
    let primitive = if id.is_primitive() { id } else { id.unboxed().unwrap_or(id) };
    let key = (host.runtime_id(), primitive, accessor);

    if let Some(method) = ACCESSORS.get(&key) {
        return Ok(*method);
    }

    let found = if spec.is_static {
        host.get_static_method_id(spec.class, spec.name, spec.signature)
    } else {
        host.get_method_id(spec.class, spec.name, spec.signature)
    };
    let method = found.ok_or_else(|| {
        BridgeError::HostInvocation(HostException::new(
            "java.lang.NoSuchMethodError",
            format!("{}.{}{}", spec.class, spec.name, spec.signature),
        ))
    })?;
    trace!(class = spec.class, name = spec.name, ?method, "resolved boxing accessor");
    // A racing resolver stores the same id; keep whichever landed first.
    Ok(*ACCESSORS.entry(key).or_insert(method))
}

/// Wrap a primitive `JValue` in its host wrapper object
pub fn box_primitive(host: &dyn HostRuntime, id: JavaTypeId, value: JValue) -> BridgeResult<JValue> {
    let method = resolve(host, id, Accessor::Box)?;
    let boxed = host.call_static_method(method, &[value]);
    check_exception(host)?;
    Ok(boxed)
}

/// Read the primitive out of a host wrapper object
pub fn unbox_object(host: &dyn HostRuntime, id: JavaTypeId, obj: &LocalRef) -> BridgeResult<JValue> {
    let method = resolve(host, id, Accessor::Unbox)?;
    let value = host.call_method(method, obj, &[]);
    check_exception(host)?;
    Ok(value)
}

/// Number of memoized accessors for one runtime
pub fn cached_accessors(runtime_id: u64) -> usize {
    ACCESSORS.iter().filter(|entry| entry.key().0 == runtime_id).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManagedHeap;

    #[test]
    fn test_spec_table() {
        let s = accessor_spec(JavaTypeId::Int, Accessor::Box).unwrap();
        assert_eq!(s.class, "java.lang.Integer");
        assert_eq!(s.signature, "(I)Ljava/lang/Integer;");
        assert!(s.is_static);
        let s = accessor_spec(JavaTypeId::BoxedDouble, Accessor::Unbox).unwrap();
        assert_eq!(s.name, "doubleValue");
        assert!(!s.is_static);
        assert!(accessor_spec(JavaTypeId::String, Accessor::Box).is_none());
        assert!(accessor_spec(JavaTypeId::Void, Accessor::Box).is_none());
    }

    #[test]
    fn test_resolve_is_memoized() {
        let heap = ManagedHeap::new();
        let before = heap.method_lookups();
        let first = resolve(heap.as_ref(), JavaTypeId::Int, Accessor::Box).unwrap();
        let second = resolve(heap.as_ref(), JavaTypeId::BoxedInt, Accessor::Box).unwrap();
        assert_eq!(first, second);
        assert_eq!(heap.method_lookups(), before + 1);
        assert_eq!(cached_accessors(heap.runtime_id()), 1);
    }

    #[test]
    fn test_cache_is_per_runtime() {
        let a = ManagedHeap::new();
        let b = ManagedHeap::new();
        resolve(a.as_ref(), JavaTypeId::Long, Accessor::Unbox).unwrap();
        resolve(b.as_ref(), JavaTypeId::Long, Accessor::Unbox).unwrap();
        assert_eq!(a.method_lookups(), 1);
        assert_eq!(b.method_lookups(), 1);
    }

    #[test]
    fn test_box_unbox() {
        let heap = ManagedHeap::new();
        let boxed = box_primitive(heap.as_ref(), JavaTypeId::Int, JValue::Int(42)).unwrap();
        let obj = boxed.as_object().unwrap();
        let value = unbox_object(heap.as_ref(), JavaTypeId::BoxedInt, obj).unwrap();
        assert_eq!(value, JValue::Int(42));
    }

    #[test]
    fn test_unsupported_type() {
        let heap = ManagedHeap::new();
        let err = resolve(heap.as_ref(), JavaTypeId::String, Accessor::Box).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedOperation { .. }));
    }
}
