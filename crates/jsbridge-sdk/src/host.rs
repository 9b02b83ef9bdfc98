//! Abstract host object model operations
//!
//! Defines the narrow interface the bridge needs from the managed host:
//! method lookup, the host-call primitive with its pending-exception check,
//! object creation, and reference management. Converters program against this
//! trait only.

use crate::refs::{GlobalRef, LocalRef};
use crate::types::JavaTypeId;
use crate::value::JValue;

/// Resolved callable identity on the host side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub u32);

/// Exception raised by host code
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{class}: {message}")]
pub struct HostException {
    /// Exception class name
    pub class: String,
    /// Exception message
    pub message: String,
    /// Wrapped cause, if any
    #[source]
    pub cause: Option<Box<HostException>>,
}

impl HostException {
    /// Create a new exception without a cause
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Attach a cause
    pub fn with_cause(mut self, cause: HostException) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

/// What a host object is, as far as the bridge cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostObjectKind {
    /// Instance of a type the bridge knows (boxed primitives, strings, unit)
    Typed(JavaTypeId),
    /// Any other object, with its class name
    Other(String),
}

/// Abstract host runtime.
///
/// Mirrors the calling convention of a managed runtime's native interface:
/// a call never returns an error directly; instead it leaves a pending
/// exception that the caller must check with [`HostRuntime::exception_check`]
/// immediately afterwards.
pub trait HostRuntime: Send + Sync {
    /// Process-unique identity of this runtime instance
    fn runtime_id(&self) -> u64;

    // ========================================================================
    // Method lookup
    // ========================================================================

    /// Resolve an instance method
    fn get_method_id(&self, class: &str, name: &str, signature: &str) -> Option<MethodId>;

    /// Resolve a static method
    fn get_static_method_id(&self, class: &str, name: &str, signature: &str) -> Option<MethodId>;

    // ========================================================================
    // Host calls
    // ========================================================================

    /// Call an instance method. On failure returns `JValue::Null` and leaves
    /// an exception pending.
    fn call_method(&self, method: MethodId, this: &LocalRef, args: &[JValue]) -> JValue;

    /// Call a static method. Same exception convention as `call_method`.
    fn call_static_method(&self, method: MethodId, args: &[JValue]) -> JValue;

    /// Whether an exception is pending
    fn exception_check(&self) -> bool;

    /// Take (and clear) the pending exception
    fn take_exception(&self) -> Option<HostException>;

    // ========================================================================
    // Objects
    // ========================================================================

    /// Instantiate a class through its no-argument constructor
    fn new_object(&self, class: &str) -> Result<LocalRef, HostException>;

    /// Allocate a host string
    fn new_string(&self, value: &str) -> LocalRef;

    /// Read the contents of a host string
    fn string_value(&self, obj: &LocalRef) -> Option<String>;

    /// Classify an object
    fn object_kind(&self, obj: &LocalRef) -> HostObjectKind;

    /// Human-readable description of an object, for diagnostics
    fn describe(&self, obj: &LocalRef) -> String;

    // ========================================================================
    // References
    // ========================================================================

    /// Promote a local reference to a global one
    fn new_global_ref(&self, obj: &LocalRef) -> GlobalRef;

    /// Create a fresh local reference from a global one
    fn new_local_ref(&self, obj: &GlobalRef) -> LocalRef;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_display_and_cause() {
        use std::error::Error;
        let e = HostException::new("java.lang.IllegalStateException", "bad state")
            .with_cause(HostException::new("java.io.IOException", "disk"));
        assert_eq!(e.to_string(), "java.lang.IllegalStateException: bad state");
        assert_eq!(e.source().map(|s| s.to_string()), Some("java.io.IOException: disk".to_string()));
    }
}
