//! jsbridge core - value marshalling between a managed host and a script engine
//!
//! This crate provides:
//! - Script value model and microtask job queue
//! - Two engine backends: operand stack (`StackEngine`) and owned handles
//!   (`HandleEngine`)
//! - Per-type converters (`JavaType` family) and their loaders
//! - Process-wide cache of boxing accessors
//! - Host → script invocation (`JavaScriptMethod`) and script → host exposure
//!   (`JavaMethod`)
//! - An in-process managed host heap (`ManagedHeap`)
//! - TOML configuration (`BridgeConfig`)
//!
//! # Example
//!
//! ```ignore
//! use jsbridge_core::{BridgeConfig, JsBridgeContext, ManagedHeap};
//! use jsbridge_sdk::{JValue, JavaTypeId, MethodDescriptor, TypeIdentity};
//!
//! let heap = ManagedHeap::new();
//! let mut bridge = JsBridgeContext::with_handle_engine(heap, BridgeConfig::default());
//! let desc = MethodDescriptor::new("add", JavaTypeId::Int, vec![
//!     TypeIdentity::Scalar(JavaTypeId::Int),
//!     TypeIdentity::Scalar(JavaTypeId::Int),
//! ]);
//! let add = bridge.bind_method(&desc)?;
//! let sum = bridge.invoke(&add, &target, vec![JValue::Int(1), JValue::Int(2)], false)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod box_cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod host;
pub mod java_method;
pub mod java_types;
pub mod method;
pub mod script;

pub use config::{BridgeConfig, ConfigError};
pub use context::{ConversionContext, JsBridgeContext};
pub use engine::{
    Backend, ElementSink, ElementSource, EngineError, EngineResult, Handle, HandleEngine, HandleGuard, StackDelta,
    StackEngine,
};
pub use host::{ManagedHeap, RefLedger};
pub use java_method::{to_script_error, JavaMethod};
pub use java_types::{JavaType, JavaTypeProvider, Loader};
pub use method::JavaScriptMethod;
pub use script::{
    JobQueue, PromiseState, Scope, ScriptArray, ScriptFunction, ScriptKind, ScriptObject, ScriptPromise, ScriptResult,
    ScriptValue,
};
