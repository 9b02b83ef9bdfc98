//! Handle-discipline engine
//!
//! Every script value the bridge touches is addressed through an owned
//! [`Handle`]. A handle is move-only and is given back with
//! [`HandleEngine::free_value`], which consumes it, so a handle cannot be
//! freed twice. Operations that take a value handle by value
//! (`set_property_u32`) consume it as well.
//!
//! Conversions that allocate several handles hold them in a [`HandleGuard`]
//! and commit only the ones transferred to the caller; everything else is
//! freed when the guard drops, on success and failure alike.

use std::mem;

use jsbridge_sdk::{BridgeError, BridgeResult, JValue};
use tracing::{trace, warn};

use super::{Backend, ElementSink, ElementSource, EngineError, EngineResult};
use crate::context::ConversionContext;
use crate::java_types::{host_mismatch, script_mismatch, Loader};
use crate::script::{settle, JobQueue, Scope, ScriptArray, ScriptValue};

/// Owned reference to a script value
#[must_use = "handles must be freed with HandleEngine::free_value"]
#[derive(Debug, PartialEq, Eq)]
pub struct Handle(usize);

impl Handle {
    /// Slot index of the handle
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Slab of script values addressed by handles
#[derive(Default)]
pub struct HandleEngine {
    values: Vec<Option<ScriptValue>>,
    free: Vec<usize>,
    live: usize,
    jobs: JobQueue,
}

impl HandleEngine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle for `value`
    pub fn new_value(&mut self, value: ScriptValue) -> Handle {
        self.live += 1;
        match self.free.pop() {
            Some(slot) => {
                self.values[slot] = Some(value);
                Handle(slot)
            }
            None => {
                self.values.push(Some(value));
                Handle(self.values.len() - 1)
            }
        }
    }

    /// Free a handle
    pub fn free_value(&mut self, handle: Handle) {
        match self.values.get_mut(handle.0) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.free.push(handle.0);
                self.live -= 1;
            }
            _ => warn!(handle = handle.0, "free of a handle that is not live"),
        }
    }

    /// Borrow the value behind a handle
    pub fn get(&self, handle: &Handle) -> EngineResult<&ScriptValue> {
        self.values
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(EngineError::InvalidHandle(handle.0))
    }

    /// New handle to the same value
    pub fn dup_value(&mut self, handle: &Handle) -> EngineResult<Handle> {
        let value = self.get(handle)?.clone();
        Ok(self.new_value(value))
    }

    /// New empty array
    pub fn new_array(&mut self) -> Handle {
        self.new_value(ScriptValue::Array(ScriptArray::new()))
    }

    /// Whether the handle holds an array
    pub fn is_array(&self, handle: &Handle) -> bool {
        matches!(self.get(handle), Ok(ScriptValue::Array(_)))
    }

    /// Store `value` at `index` of `array`, consuming the value handle
    pub fn set_property_u32(&mut self, array: &Handle, index: u32, value: Handle) -> EngineResult<()> {
        let stored = self.get(&value).cloned();
        self.free_value(value);
        let stored = stored?;
        match self.get(array)? {
            ScriptValue::Array(items) => {
                items.set(index as usize, stored);
                Ok(())
            }
            other => Err(EngineError::NotAnArray(other.describe())),
        }
    }

    /// New handle to element `index` of `array`
    pub fn get_property_u32(&mut self, array: &Handle, index: u32) -> EngineResult<Handle> {
        let element = match self.get(array)? {
            ScriptValue::Array(items) => items.get(index as usize),
            other => return Err(EngineError::NotAnArray(other.describe())),
        };
        Ok(self.new_value(element))
    }

    /// New handle to property `name` of `obj` (`undefined` when absent)
    pub fn get_property_str(&mut self, obj: &Handle, name: &str) -> EngineResult<Handle> {
        let property = match self.get(obj)? {
            ScriptValue::Object(object) => object.get(name),
            ScriptValue::Array(items) if name == "length" => ScriptValue::number(items.len() as f64),
            ScriptValue::String(s) if name == "length" => ScriptValue::number(s.chars().count() as f64),
            _ => ScriptValue::Undefined,
        };
        Ok(self.new_value(property))
    }

    /// `length` property of an array-like value
    pub fn array_length(&mut self, handle: &Handle) -> EngineResult<usize> {
        let length = self.get_property_str(handle, "length")?;
        let value = self.get(&length).map(|v| v.as_number().unwrap_or(0.0));
        self.free_value(length);
        Ok(value? as usize)
    }

    /// Call `function` with `this` and `args`.
    ///
    /// Returns a new handle to the result, or to the thrown value.
    pub fn call_function(&mut self, function: &Handle, this: &Handle, args: &[Handle]) -> Result<Handle, Handle> {
        let prepared = (|| -> EngineResult<_> {
            let function = self.get(function)?.clone();
            let this = self.get(this)?.clone();
            let args = args
                .iter()
                .map(|h| self.get(h).cloned())
                .collect::<EngineResult<Vec<_>>>()?;
            Ok((function, this, args))
        })();

        let outcome = match prepared {
            Ok((function, this, args)) => {
                let mut scope = Scope::new(&self.jobs);
                scope.call(&function, &this, &args)
            }
            Err(err) => Err(ScriptValue::error("InternalError", err.to_string())),
        };
        match outcome {
            Ok(value) => Ok(self.new_value(value)),
            Err(thrown) => Err(self.new_value(thrown)),
        }
    }

    /// Number of handles not yet freed
    pub fn live_handles(&self) -> usize {
        self.live
    }

    /// Job queue of this engine
    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    // ========================================================================
    // Conversions
    // ========================================================================

    /// Convert a host value into a new handle. `None` for types without a
    /// script representation (unboxed `void`).
    ///
    /// A failure frees every handle allocated on the way.
    pub fn to_script_handle(
        &mut self,
        cx: &ConversionContext,
        loader: &Loader,
        value: &JValue,
        in_script: bool,
    ) -> BridgeResult<Option<Handle>> {
        if !loader.is_array() {
            let script = loader.converter().from_host(cx, value, in_script)?;
            return Ok(script.map(|s| self.new_value(s)));
        }
        let array = match value {
            JValue::Null => return Ok(Some(self.new_value(ScriptValue::Null))),
            JValue::Array(array) => array,
            other => return Err(host_mismatch(cx, other, loader.identity(), in_script)),
        };

        let mut guard = HandleGuard::new(self);
        let target = guard.engine().new_array();
        guard.adopt(target);
        let mut sink = PackedSink { guard: &mut guard };
        loader
            .converter()
            .from_host_array(cx, array.items(), &mut sink, in_script)?;
        Ok(guard.commit().pop())
    }

    /// Convert the value behind a handle to a host value. The handle stays
    /// owned by the caller.
    pub fn to_host_value(
        &mut self,
        cx: &ConversionContext,
        loader: &Loader,
        handle: &Handle,
        in_script: bool,
    ) -> BridgeResult<JValue> {
        if !loader.is_array() {
            let value = self.get(handle)?.clone();
            return loader.converter().to_host(cx, &value, in_script);
        }
        let value = self.get(handle)?;
        if value.is_null_or_undefined() {
            return Ok(JValue::Null);
        }
        if !self.is_array(handle) {
            let value = value.clone();
            return Err(script_mismatch(&value, loader.identity(), in_script));
        }
        let len = self.array_length(handle)?;
        let mut source = PackedSource {
            engine: self,
            array: handle,
            len,
            next: 0,
        };
        loader.converter().to_host_array(cx, &mut source, in_script)
    }

    /// Convert individually held elements to a host array of the loader's
    /// element type. Consumes (frees) every element handle.
    pub fn to_host_array_expanded(
        &mut self,
        cx: &ConversionContext,
        loader: &Loader,
        elements: Vec<Handle>,
        in_script: bool,
    ) -> BridgeResult<JValue> {
        let mut guard = HandleGuard::new(self);
        for handle in elements {
            guard.adopt(handle);
        }
        let mut source = ExpandedSource { guard: &guard, next: 0 };
        loader.converter().to_host_array(cx, &mut source, in_script)
    }
}

/// Handles freed together when the guard drops, unless committed
pub struct HandleGuard<'e> {
    engine: &'e mut HandleEngine,
    handles: Vec<Handle>,
}

impl<'e> HandleGuard<'e> {
    /// Empty guard over `engine`
    pub fn new(engine: &'e mut HandleEngine) -> Self {
        Self {
            engine,
            handles: Vec::new(),
        }
    }

    /// The guarded engine
    pub fn engine(&mut self) -> &mut HandleEngine {
        self.engine
    }

    /// Take ownership of a handle, returning its position in the guard
    pub fn adopt(&mut self, handle: Handle) -> usize {
        self.handles.push(handle);
        self.handles.len() - 1
    }

    /// Borrow a guarded handle
    pub fn handle(&self, index: usize) -> Option<&Handle> {
        self.handles.get(index)
    }

    /// Release the handles to the caller instead of freeing them
    pub fn commit(mut self) -> Vec<Handle> {
        mem::take(&mut self.handles)
    }
}

impl Drop for HandleGuard<'_> {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            trace!(count = self.handles.len(), "freeing guarded handles");
        }
        for handle in self.handles.drain(..) {
            self.engine.free_value(handle);
        }
    }
}

/// Elements of an array handle, read in increasing index order
struct PackedSource<'e, 'h> {
    engine: &'e mut HandleEngine,
    array: &'h Handle,
    len: usize,
    next: usize,
}

impl ElementSource for PackedSource<'_, '_> {
    fn len(&self) -> usize {
        self.len
    }

    fn next_element(&mut self) -> BridgeResult<Option<(usize, ScriptValue)>> {
        if self.next >= self.len {
            return Ok(None);
        }
        let index = self.next;
        self.next += 1;
        let element = self.engine.get_property_u32(self.array, index as u32)?;
        let value = self.engine.get(&element).cloned();
        self.engine.free_value(element);
        Ok(Some((index, value?)))
    }
}

/// Elements held one handle each, in increasing index order
struct ExpandedSource<'g, 'e> {
    guard: &'g HandleGuard<'e>,
    next: usize,
}

impl ElementSource for ExpandedSource<'_, '_> {
    fn len(&self) -> usize {
        self.guard.handles.len()
    }

    fn next_element(&mut self) -> BridgeResult<Option<(usize, ScriptValue)>> {
        let index = self.next;
        let Some(handle) = self.guard.handle(index) else {
            return Ok(None);
        };
        self.next += 1;
        let value = self.guard.engine.get(handle)?.clone();
        Ok(Some((index, value)))
    }
}

/// Writes elements into the first handle of a guard
struct PackedSink<'g, 'e> {
    guard: &'g mut HandleGuard<'e>,
}

impl ElementSink for PackedSink<'_, '_> {
    fn put(&mut self, index: usize, value: ScriptValue) -> BridgeResult<()> {
        let guard = &mut *self.guard;
        let element = guard.engine.new_value(value);
        let array = guard
            .handles
            .first()
            .ok_or(EngineError::InvalidHandle(usize::MAX))?;
        guard.engine.set_property_u32(array, index as u32, element)?;
        Ok(())
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Call under construction
#[derive(Debug)]
pub struct HandleCallSite {
    function: Handle,
    this: Handle,
    args: Vec<Handle>,
}

impl HandleCallSite {
    /// Number of script arguments pushed so far
    pub fn nargs(&self) -> usize {
        self.args.len()
    }
}

impl HandleEngine {
    fn free_site(&mut self, site: HandleCallSite) {
        self.free_value(site.function);
        self.free_value(site.this);
        for arg in site.args {
            self.free_value(arg);
        }
    }
}

impl Backend for HandleEngine {
    type Target = Handle;
    type CallSite = HandleCallSite;
    type Outcome = Handle;

    fn begin_call(&mut self, target: &Handle, method: &str, is_lambda: bool) -> BridgeResult<HandleCallSite> {
        let (function, this) = if is_lambda {
            let function = self.dup_value(target)?;
            (function, self.new_value(ScriptValue::Undefined))
        } else {
            let function = self.get_property_str(target, method)?;
            match self.dup_value(target) {
                Ok(this) => (function, this),
                Err(err) => {
                    self.free_value(function);
                    return Err(err.into());
                }
            }
        };
        Ok(HandleCallSite {
            function,
            this,
            args: Vec::new(),
        })
    }

    fn push_argument(
        &mut self,
        site: &mut HandleCallSite,
        cx: &ConversionContext,
        loader: &Loader,
        value: &JValue,
    ) -> BridgeResult<()> {
        if let Some(handle) = self.to_script_handle(cx, loader, value, false)? {
            site.args.push(handle);
        }
        Ok(())
    }

    fn abandon_call(&mut self, site: HandleCallSite) {
        self.free_site(site);
    }

    fn call(&mut self, site: HandleCallSite) -> BridgeResult<Handle> {
        let outcome = self.call_function(&site.function, &site.this, &site.args);
        self.free_site(site);
        match outcome {
            Ok(result) => Ok(result),
            Err(thrown) => {
                let exception = self.get(&thrown).map(ScriptValue::to_exception);
                self.free_value(thrown);
                Err(BridgeError::Script(exception?))
            }
        }
    }

    fn await_outcome(&mut self, outcome: Handle, job_limit: usize) -> BridgeResult<Handle> {
        let promise = match self.get(&outcome) {
            Ok(ScriptValue::Promise(promise)) => promise.clone(),
            Ok(_) => return Ok(outcome),
            Err(err) => {
                self.free_value(outcome);
                return Err(err.into());
            }
        };
        let settled = settle(&self.jobs, &promise, job_limit);
        self.free_value(outcome);
        Ok(self.new_value(settled?))
    }

    fn read_outcome(&mut self, outcome: Handle, cx: &ConversionContext, loader: &Loader) -> BridgeResult<JValue> {
        let result = self.to_host_value(cx, loader, &outcome, false);
        self.free_value(outcome);
        result
    }

    fn take_pending_error(&mut self) -> Option<ScriptValue> {
        self.jobs.take_pending_error()
    }
}
