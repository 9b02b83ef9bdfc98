//! jsbridge SDK - host-side types for the script bridge
//!
//! This crate provides the leaf types shared by every part of the bridge
//! without depending on any script engine:
//!
//! - `JValue`: host value representation with explicit release semantics
//! - `LocalRef` / `GlobalRef`: owned references to host objects
//! - `JavaTypeId` / `TypeIdentity`: type identities for converters
//! - `MethodDescriptor`: what the reflection layer hands the bridge
//! - `HostRuntime`: the host-call primitive and object model operations
//! - `BridgeError` / `JsBridgeError`: the error taxonomy
//!
//! # Example
//!
//! ```ignore
//! use jsbridge_sdk::{JavaTypeId, MethodDescriptor, TypeIdentity};
//!
//! let desc = MethodDescriptor::new(
//!     "sum",
//!     JavaTypeId::Int,
//!     vec![TypeIdentity::ArrayOf(JavaTypeId::Int)],
//! )
//! .varargs();
//! ```

#![warn(missing_docs)]

pub mod convert;
pub mod descriptor;
pub mod error;
pub mod host;
pub mod refs;
pub mod types;
pub mod value;

pub use convert::{FromJValue, IntoJValue};
pub use descriptor::{type_signature, DescriptorSource, MethodDescriptor};
pub use error::{
    BridgeError, BridgeResult, ErrorKind, JsBridgeError, Phase, Position, ScriptException,
};
pub use host::{HostException, HostObjectKind, HostRuntime, MethodId};
pub use refs::{GlobalRef, LocalRef, ObjectId, RefId, RefTable};
pub use types::{JavaTypeId, TypeIdentity, ALL_TYPE_IDS};
pub use value::{HostArray, JValue};
