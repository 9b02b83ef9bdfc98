//! In-process managed heap
//!
//! `ManagedHeap` is a small object model implementing [`HostRuntime`] and
//! [`DescriptorSource`]: wrapper classes for every primitive, strings,
//! `java.lang.Void` / `kotlin.Unit`, user classes and user methods backed by
//! closures. Host calls follow the pending-exception convention: a failing
//! method leaves its exception in a slot that the caller must check.
//!
//! ```text
//! MethodId ──► MethodEntry { class, name, signature, body }
//! ObjectId ──► HeapObject  { Boxed | Str | Unit | Instance }
//! RefId    ──► RefLedger   (live / released accounting)
//! ```
//!
//! An object lives as long as some local or global reference to it does.
//! Objects the ledger reports unreachable are swept from the object table
//! whenever the heap state is next locked.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use jsbridge_sdk::{
    DescriptorSource, GlobalRef, HostException, HostObjectKind, HostRuntime, JValue, JavaTypeId,
    LocalRef, MethodDescriptor, MethodId, ObjectId, RefId,
};
use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use super::ledger::RefLedger;
use crate::box_cache::{accessor_spec, Accessor};

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Body of a host method: `(heap, this, args)`. `this` is `None` for static
/// methods.
pub type MethodBody =
    Arc<dyn Fn(&ManagedHeap, Option<&LocalRef>, &[JValue]) -> Result<JValue, HostException> + Send + Sync>;

const PRIMITIVES: [JavaTypeId; 7] = [
    JavaTypeId::Boolean,
    JavaTypeId::Byte,
    JavaTypeId::Short,
    JavaTypeId::Int,
    JavaTypeId::Long,
    JavaTypeId::Float,
    JavaTypeId::Double,
];

enum HeapObject {
    Boxed(JValue),
    Str(String),
    Unit(JavaTypeId),
    Instance(String),
}

struct MethodEntry {
    class: String,
    name: String,
    signature: String,
    is_static: bool,
    descriptor: Option<MethodDescriptor>,
    body: MethodBody,
}

type MethodKey = (String, String, String, bool);

#[derive(Default)]
struct HeapState {
    objects: HashMap<ObjectId, HeapObject>,
    next_object: ObjectId,
    classes: HashSet<String>,
    methods: Vec<MethodEntry>,
    index: HashMap<MethodKey, MethodId>,
    pending: Option<HostException>,
    method_lookups: usize,
    host_calls: usize,
}

impl HeapState {
    fn alloc(&mut self, object: HeapObject) -> ObjectId {
        self.next_object += 1;
        self.objects.insert(self.next_object, object);
        self.next_object
    }
}

/// Managed host heap
pub struct ManagedHeap {
    id: u64,
    ledger: Arc<RefLedger>,
    state: Mutex<HeapState>,
}

impl ManagedHeap {
    /// Create a heap with the built-in wrapper classes registered
    pub fn new() -> Arc<Self> {
        let heap = Self {
            id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
            ledger: RefLedger::new(),
            state: Mutex::new(HeapState::default()),
        };
        heap.register_builtins();
        Arc::new(heap)
    }

    fn lock_state(&self) -> MutexGuard<'_, HeapState> {
        let mut state = self.state.lock();
        let unreachable = self.ledger.take_unreachable();
        if !unreachable.is_empty() {
            trace!(count = unreachable.len(), "sweeping unreachable objects");
            for object in unreachable {
                state.objects.remove(&object);
            }
        }
        state
    }

    fn register_builtins(&self) {
        {
            let mut state = self.lock_state();
            for id in [JavaTypeId::BoxedVoid, JavaTypeId::Unit, JavaTypeId::Object, JavaTypeId::String] {
                state.classes.insert(id.class_name().to_string());
            }
        }

        for primitive in PRIMITIVES {
            let (Some(boxer), Some(unboxer)) = (
                accessor_spec(primitive, Accessor::Box),
                accessor_spec(primitive, Accessor::Unbox),
            ) else {
                continue;
            };
            self.register_class(boxer.class);

            let value_of: MethodBody = Arc::new(move |heap: &ManagedHeap, _this: Option<&LocalRef>, args: &[JValue]| {
                match args.first().and_then(JValue::copy_primitive) {
                    Some(value) if primitive_type_of(&value) == Some(primitive) => {
                        Ok(JValue::Object(heap.new_boxed(value)))
                    }
                    _ => Err(HostException::new(
                        "java.lang.IllegalArgumentException",
                        format!("valueOf expects a {}", primitive),
                    )),
                }
            });
            self.insert_method(boxer.class, boxer.name, boxer.signature, true, None, value_of);

            let x_value: MethodBody = Arc::new(move |heap: &ManagedHeap, this: Option<&LocalRef>, _args: &[JValue]| {
                this.and_then(|obj| heap.boxed_value(obj))
                    .filter(|value| primitive_type_of(value) == Some(primitive))
                    .ok_or_else(|| {
                        HostException::new(
                            "java.lang.ClassCastException",
                            format!("receiver is not a {}", primitive.boxed()),
                        )
                    })
            });
            self.insert_method(unboxer.class, unboxer.name, unboxer.signature, false, None, x_value);
        }
    }

    fn insert_method(
        &self,
        class: &str,
        name: &str,
        signature: &str,
        is_static: bool,
        descriptor: Option<MethodDescriptor>,
        body: MethodBody,
    ) -> MethodId {
        let mut state = self.lock_state();
        let id = MethodId(state.methods.len() as u32);
        state.methods.push(MethodEntry {
            class: class.to_string(),
            name: name.to_string(),
            signature: signature.to_string(),
            is_static,
            descriptor,
            body,
        });
        state.index.insert(
            (class.to_string(), name.to_string(), signature.to_string(), is_static),
            id,
        );
        id
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Declare a class instantiable through `new_object`
    pub fn register_class(&self, class: &str) {
        self.lock_state().classes.insert(class.to_string());
    }

    /// Register an instance method described by `descriptor`
    pub fn register_method<F>(&self, class: &str, descriptor: MethodDescriptor, body: F) -> MethodId
    where
        F: Fn(&ManagedHeap, &LocalRef, &[JValue]) -> Result<JValue, HostException> + Send + Sync + 'static,
    {
        self.register_class(class);
        let name = descriptor.name.clone();
        let signature = descriptor.signature();
        let body: MethodBody = Arc::new(move |heap: &ManagedHeap, this: Option<&LocalRef>, args: &[JValue]| {
            match this {
                Some(this) => body(heap, this, args),
                None => Err(HostException::new(
                    "java.lang.NullPointerException",
                    "instance method called without a receiver",
                )),
            }
        });
        self.insert_method(class, &name, &signature, false, Some(descriptor), body)
    }

    /// Register a static method described by `descriptor`
    pub fn register_static_method<F>(&self, class: &str, descriptor: MethodDescriptor, body: F) -> MethodId
    where
        F: Fn(&ManagedHeap, &[JValue]) -> Result<JValue, HostException> + Send + Sync + 'static,
    {
        self.register_class(class);
        let name = descriptor.name.clone();
        let signature = descriptor.signature();
        let body: MethodBody =
            Arc::new(move |heap: &ManagedHeap, _this: Option<&LocalRef>, args: &[JValue]| body(heap, args));
        self.insert_method(class, &name, &signature, true, Some(descriptor), body)
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Allocate a wrapper object around a primitive
    pub fn new_boxed(&self, value: JValue) -> LocalRef {
        let object = self.lock_state().alloc(HeapObject::Boxed(value));
        self.ledger.new_local(object)
    }

    /// Allocate an instance of `class`, registering the class if needed
    pub fn new_instance(&self, class: &str) -> LocalRef {
        let object = {
            let mut state = self.lock_state();
            state.classes.insert(class.to_string());
            state.alloc(HeapObject::Instance(class.to_string()))
        };
        self.ledger.new_local(object)
    }

    /// Primitive held by a wrapper object
    pub fn boxed_value(&self, obj: &LocalRef) -> Option<JValue> {
        match self.lock_state().objects.get(&obj.object_id()) {
            Some(HeapObject::Boxed(value)) => value.copy_primitive(),
            _ => None,
        }
    }

    /// Class name of an object
    pub fn class_of(&self, obj: &LocalRef) -> Option<String> {
        let state = self.lock_state();
        Some(match state.objects.get(&obj.object_id())? {
            HeapObject::Boxed(value) => primitive_type_of(value)?.boxed().class_name().to_string(),
            HeapObject::Str(_) => JavaTypeId::String.class_name().to_string(),
            HeapObject::Unit(id) => id.class_name().to_string(),
            HeapObject::Instance(class) => class.clone(),
        })
    }

    // ========================================================================
    // Accounting
    // ========================================================================

    /// Reference ledger of this heap
    pub fn ledger(&self) -> &Arc<RefLedger> {
        &self.ledger
    }

    /// Local references not yet released
    pub fn live_local_refs(&self) -> usize {
        self.ledger.live_local_refs()
    }

    /// Global references not yet released
    pub fn live_global_refs(&self) -> usize {
        self.ledger.live_global_refs()
    }

    /// How many times a reference was deleted
    pub fn release_count(&self, ref_id: RefId) -> u32 {
        self.ledger.release_count(ref_id)
    }

    /// Deletions of references that were already deleted
    pub fn double_releases(&self) -> usize {
        self.ledger.double_releases()
    }

    /// Objects still reachable through a live reference
    pub fn live_objects(&self) -> usize {
        self.lock_state().objects.len()
    }

    /// Number of method lookups performed
    pub fn method_lookups(&self) -> usize {
        self.lock_state().method_lookups
    }

    /// Number of host calls performed
    pub fn host_calls(&self) -> usize {
        self.lock_state().host_calls
    }

    fn lookup(&self, class: &str, name: &str, signature: &str, is_static: bool) -> Option<MethodId> {
        let mut state = self.lock_state();
        state.method_lookups += 1;
        state
            .index
            .get(&(class.to_string(), name.to_string(), signature.to_string(), is_static))
            .copied()
    }

    fn dispatch(&self, method: MethodId, this: Option<&LocalRef>, args: &[JValue]) -> JValue {
        // The lock must not be held while the body runs: bodies allocate.
        let body = {
            let mut state = self.lock_state();
            state.host_calls += 1;
            match state.methods.get(method.0 as usize) {
                Some(entry) if entry.is_static == this.is_none() => {
                    trace!(class = %entry.class, name = %entry.name, "host call");
                    Ok(entry.body.clone())
                }
                Some(entry) => Err(HostException::new(
                    "java.lang.IncompatibleClassChangeError",
                    format!("{}.{}{}", entry.class, entry.name, entry.signature),
                )),
                None => Err(HostException::new(
                    "java.lang.NoSuchMethodError",
                    format!("method id {}", method.0),
                )),
            }
        };

        let result = match (body, this) {
            (Ok(_), Some(this)) if this.is_released() => Err(HostException::new(
                "java.lang.NullPointerException",
                "receiver reference was released",
            )),
            (Ok(body), this) => body(self, this, args),
            (Err(e), _) => Err(e),
        };

        match result {
            Ok(value) => value,
            Err(exception) => {
                trace!(%exception, "host call left a pending exception");
                self.lock_state().pending = Some(exception);
                JValue::Null
            }
        }
    }
}

fn primitive_type_of(value: &JValue) -> Option<JavaTypeId> {
    Some(match value {
        JValue::Bool(_) => JavaTypeId::Boolean,
        JValue::Byte(_) => JavaTypeId::Byte,
        JValue::Short(_) => JavaTypeId::Short,
        JValue::Int(_) => JavaTypeId::Int,
        JValue::Long(_) => JavaTypeId::Long,
        JValue::Float(_) => JavaTypeId::Float,
        JValue::Double(_) => JavaTypeId::Double,
        _ => return None,
    })
}

fn describe_primitive(value: &JValue) -> String {
    match value {
        JValue::Bool(v) => v.to_string(),
        JValue::Byte(v) => v.to_string(),
        JValue::Short(v) => v.to_string(),
        JValue::Int(v) => v.to_string(),
        JValue::Long(v) => v.to_string(),
        JValue::Float(v) => v.to_string(),
        JValue::Double(v) => v.to_string(),
        other => other.type_name().to_string(),
    }
}

impl HostRuntime for ManagedHeap {
    fn runtime_id(&self) -> u64 {
        self.id
    }

    fn get_method_id(&self, class: &str, name: &str, signature: &str) -> Option<MethodId> {
        self.lookup(class, name, signature, false)
    }

    fn get_static_method_id(&self, class: &str, name: &str, signature: &str) -> Option<MethodId> {
        self.lookup(class, name, signature, true)
    }

    fn call_method(&self, method: MethodId, this: &LocalRef, args: &[JValue]) -> JValue {
        self.dispatch(method, Some(this), args)
    }

    fn call_static_method(&self, method: MethodId, args: &[JValue]) -> JValue {
        self.dispatch(method, None, args)
    }

    fn exception_check(&self) -> bool {
        self.lock_state().pending.is_some()
    }

    fn take_exception(&self) -> Option<HostException> {
        self.lock_state().pending.take()
    }

    fn new_object(&self, class: &str) -> Result<LocalRef, HostException> {
        let object = {
            let mut state = self.lock_state();
            let object = match JavaTypeId::from_class_name(class) {
                Some(id @ (JavaTypeId::BoxedVoid | JavaTypeId::Unit)) => HeapObject::Unit(id),
                _ if state.classes.contains(class) => HeapObject::Instance(class.to_string()),
                _ => {
                    return Err(HostException::new(
                        "java.lang.InstantiationException",
                        class.to_string(),
                    ))
                }
            };
            state.alloc(object)
        };
        Ok(self.ledger.new_local(object))
    }

    fn new_string(&self, value: &str) -> LocalRef {
        let object = self.lock_state().alloc(HeapObject::Str(value.to_string()));
        self.ledger.new_local(object)
    }

    fn string_value(&self, obj: &LocalRef) -> Option<String> {
        match self.lock_state().objects.get(&obj.object_id()) {
            Some(HeapObject::Str(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn object_kind(&self, obj: &LocalRef) -> HostObjectKind {
        let state = self.lock_state();
        match state.objects.get(&obj.object_id()) {
            Some(HeapObject::Boxed(value)) => match primitive_type_of(value) {
                Some(id) => HostObjectKind::Typed(id.boxed()),
                None => HostObjectKind::Other(JavaTypeId::Object.class_name().to_string()),
            },
            Some(HeapObject::Str(_)) => HostObjectKind::Typed(JavaTypeId::String),
            Some(HeapObject::Unit(id)) => HostObjectKind::Typed(*id),
            Some(HeapObject::Instance(class)) => match JavaTypeId::from_class_name(class) {
                Some(JavaTypeId::Object) | None => HostObjectKind::Other(class.clone()),
                Some(id) => HostObjectKind::Typed(id),
            },
            None => HostObjectKind::Other(JavaTypeId::Object.class_name().to_string()),
        }
    }

    fn describe(&self, obj: &LocalRef) -> String {
        let state = self.lock_state();
        match state.objects.get(&obj.object_id()) {
            Some(HeapObject::Boxed(value)) => describe_primitive(value),
            Some(HeapObject::Str(s)) => format!("\"{}\"", s),
            Some(HeapObject::Unit(id)) => id.class_name().to_string(),
            Some(HeapObject::Instance(class)) => format!("{}@{}", class, obj.object_id()),
            None => format!("<unknown object {}>", obj.object_id()),
        }
    }

    fn new_global_ref(&self, obj: &LocalRef) -> GlobalRef {
        self.ledger.new_global(obj.object_id())
    }

    fn new_local_ref(&self, obj: &GlobalRef) -> LocalRef {
        self.ledger.new_local(obj.object_id())
    }
}

impl DescriptorSource for ManagedHeap {
    fn method_descriptor(&self, method: MethodId) -> Option<MethodDescriptor> {
        self.lock_state()
            .methods
            .get(method.0 as usize)
            .and_then(|entry| entry.descriptor.clone())
    }
}
