//! Owned references to host objects
//!
//! A `LocalRef` is the single owner of one host reference; releasing it hands
//! the reference back to the host's `RefTable`. The release happens exactly
//! once: either explicitly through [`LocalRef::release`] or when the value is
//! dropped. `LocalRef` is not `Clone`; a second owner has to be
//! requested from the host runtime.
//!
//! A `GlobalRef` is a shared, reference-counted handle used when a host object
//! is held by the script side beyond a single call.

use std::fmt;
use std::sync::Arc;

/// Identity of a host object
pub type ObjectId = u64;

/// Identity of one reference to a host object
pub type RefId = u64;

/// Host-side bookkeeping for outstanding references.
pub trait RefTable: Send + Sync {
    /// Delete a local reference. Called exactly once per `LocalRef`.
    fn delete_local_ref(&self, ref_id: RefId);

    /// Delete a global reference. Called once the last `GlobalRef` clone drops.
    fn delete_global_ref(&self, ref_id: RefId);
}

/// Exclusively owned local reference to a host object.
pub struct LocalRef {
    ref_id: RefId,
    object: ObjectId,
    table: Option<Arc<dyn RefTable>>,
}

impl LocalRef {
    /// Wrap a reference freshly created by the host runtime
    pub fn new(ref_id: RefId, object: ObjectId, table: Arc<dyn RefTable>) -> Self {
        Self {
            ref_id,
            object,
            table: Some(table),
        }
    }

    /// Reference identity
    pub fn ref_id(&self) -> RefId {
        self.ref_id
    }

    /// Identity of the referenced object
    pub fn object_id(&self) -> ObjectId {
        self.object
    }

    /// Whether this reference has already been released
    pub fn is_released(&self) -> bool {
        self.table.is_none()
    }

    /// Release the reference. Subsequent calls are no-ops.
    pub fn release(&mut self) {
        if let Some(table) = self.table.take() {
            table.delete_local_ref(self.ref_id);
        }
    }
}

impl Drop for LocalRef {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for LocalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalRef")
            .field("ref_id", &self.ref_id)
            .field("object", &self.object)
            .field("released", &self.is_released())
            .finish()
    }
}

struct GlobalRefInner {
    ref_id: RefId,
    object: ObjectId,
    table: Arc<dyn RefTable>,
}

impl Drop for GlobalRefInner {
    fn drop(&mut self) {
        self.table.delete_global_ref(self.ref_id);
    }
}

/// Shared global reference to a host object.
#[derive(Clone)]
pub struct GlobalRef(Arc<GlobalRefInner>);

impl GlobalRef {
    /// Wrap a global reference created by the host runtime
    pub fn new(ref_id: RefId, object: ObjectId, table: Arc<dyn RefTable>) -> Self {
        Self(Arc::new(GlobalRefInner {
            ref_id,
            object,
            table,
        }))
    }

    /// Reference identity
    pub fn ref_id(&self) -> RefId {
        self.0.ref_id
    }

    /// Identity of the referenced object
    pub fn object_id(&self) -> ObjectId {
        self.0.object
    }

    /// Whether two handles share the same global reference
    pub fn ptr_eq(&self, other: &GlobalRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for GlobalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GlobalRef({}→{})", self.0.ref_id, self.0.object)
    }
}
