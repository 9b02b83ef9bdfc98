//! Stack-discipline engine
//!
//! Values live on one operand stack. Calls follow the protected-call layout:
//!
//! ```text
//! ┌─────────────────────┐
//! │ argN-1              │  ← top (index -1)
//! │ ...                 │
//! │ arg0                │
//! │ this                │
//! │ function            │  ← call site base
//! ├─────────────────────┤
//! │ caller values       │
//! └─────────────────────┘
//! ```
//!
//! `pcall_method` replaces the whole call site with a single slot holding the
//! result or the thrown value. Indices are absolute when non-negative and
//! relative to the top when negative.
//!
//! Conversions between stack slots and host values are wrapped in the balance
//! guard (see [`super::guard`]): each leaves the stack at its documented net
//! delta on success and on failure.

use jsbridge_sdk::{BridgeError, BridgeResult, JValue};
use tracing::{trace, warn};

use super::guard::{balanced, StackDelta};
use super::{Backend, ElementSink, ElementSource, EngineError, EngineResult};
use crate::config::DEFAULT_STACK_LIMIT;
use crate::context::ConversionContext;
use crate::java_types::{script_mismatch, Loader};
use crate::script::{settle, JobQueue, Scope, ScriptArray, ScriptValue};

/// Outcome of a protected call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// The result is on top of the stack
    Success,
    /// The thrown value is on top of the stack
    Error,
}

/// Operand stack engine
pub struct StackEngine {
    slots: Vec<ScriptValue>,
    max_size: usize,
    jobs: JobQueue,
    balance_violations: usize,
}

impl Default for StackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StackEngine {
    /// Create an engine with the default stack size
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_STACK_LIMIT)
    }

    /// Create an engine with a specific stack size (in slots)
    pub fn with_limit(max_size: usize) -> Self {
        Self {
            slots: Vec::with_capacity(max_size.min(1024)),
            max_size,
            jobs: JobQueue::new(),
            balance_violations: 0,
        }
    }

    // ========================================================================
    // Operand Stack Operations
    // ========================================================================

    /// Push a value onto the stack
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StackOverflow` if the stack is full.
    #[inline]
    pub fn push(&mut self, value: ScriptValue) -> EngineResult<()> {
        if self.slots.len() >= self.max_size {
            return Err(EngineError::StackOverflow);
        }
        self.slots.push(value);
        Ok(())
    }

    /// Pop a value from the stack
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StackUnderflow` if the stack is empty.
    #[inline]
    pub fn pop(&mut self) -> EngineResult<ScriptValue> {
        self.slots.pop().ok_or(EngineError::StackUnderflow)
    }

    /// Pop `n` values, returned bottom-first
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StackUnderflow` if fewer than `n` values are on
    /// the stack; nothing is popped in that case.
    pub fn pop_n(&mut self, n: usize) -> EngineResult<Vec<ScriptValue>> {
        if n > self.slots.len() {
            return Err(EngineError::StackUnderflow);
        }
        let at = self.slots.len() - n;
        Ok(self.slots.split_off(at))
    }

    /// Peek at a slot
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidIndex` if the index addresses no slot.
    pub fn peek(&self, index: isize) -> EngineResult<&ScriptValue> {
        let at = self.normalize(index)?;
        Ok(&self.slots[at])
    }

    /// Overwrite a slot
    pub fn replace(&mut self, index: isize, value: ScriptValue) -> EngineResult<()> {
        let at = self.normalize(index)?;
        self.slots[at] = value;
        Ok(())
    }

    /// Swap two slots
    pub fn swap(&mut self, a: isize, b: isize) -> EngineResult<()> {
        let (a, b) = (self.normalize(a)?, self.normalize(b)?);
        self.slots.swap(a, b);
        Ok(())
    }

    /// Resolve an index to an absolute slot position
    pub fn normalize(&self, index: isize) -> EngineResult<usize> {
        let len = self.slots.len() as isize;
        let at = if index < 0 { len + index } else { index };
        if at < 0 || at >= len {
            return Err(EngineError::InvalidIndex(index));
        }
        Ok(at as usize)
    }

    /// Get current stack depth
    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Check if stack is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Get maximum stack size
    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Drop every slot above `depth`
    pub fn truncate(&mut self, depth: usize) {
        self.slots.truncate(depth);
    }

    // ========================================================================
    // Arrays and properties
    // ========================================================================

    /// Push a new empty array, returning its absolute index
    pub fn push_array(&mut self) -> EngineResult<usize> {
        self.push(ScriptValue::Array(ScriptArray::new()))?;
        Ok(self.slots.len() - 1)
    }

    /// Pop the top value and store it at `index` of the array at `obj`
    ///
    /// # Errors
    ///
    /// `NotAnArray` if `obj` does not hold an array; the value is popped
    /// either way.
    pub fn put_prop_index(&mut self, obj: isize, index: usize) -> EngineResult<()> {
        let at = self.normalize(obj)?;
        if at == self.slots.len() - 1 {
            return Err(EngineError::InvalidIndex(obj));
        }
        let value = self.pop()?;
        match &self.slots[at] {
            ScriptValue::Array(array) => {
                array.set(index, value);
                Ok(())
            }
            other => Err(EngineError::NotAnArray(other.describe())),
        }
    }

    /// Push element `index` of the array at `obj`
    pub fn get_prop_index(&mut self, obj: isize, index: usize) -> EngineResult<()> {
        let element = match self.peek(obj)? {
            ScriptValue::Array(array) => array.get(index),
            other => return Err(EngineError::NotAnArray(other.describe())),
        };
        self.push(element)
    }

    /// Push property `name` of the value at `obj` (`undefined` when absent)
    pub fn get_prop_string(&mut self, obj: isize, name: &str) -> EngineResult<()> {
        let property = match self.peek(obj)? {
            ScriptValue::Object(object) => object.get(name),
            ScriptValue::Array(array) if name == "length" => ScriptValue::number(array.len() as f64),
            _ => ScriptValue::Undefined,
        };
        self.push(property)
    }

    /// `length` of the value at `obj` (0 for values without one)
    pub fn get_length(&self, obj: isize) -> EngineResult<usize> {
        Ok(match self.peek(obj)? {
            ScriptValue::Array(array) => array.len(),
            ScriptValue::String(s) => s.chars().count(),
            _ => 0,
        })
    }

    /// Whether the value at `obj` is an array
    pub fn is_array(&self, obj: isize) -> bool {
        matches!(self.peek(obj), Ok(ScriptValue::Array(_)))
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Protected call of `[function, this, arg0 .. argN-1]` on top of the
    /// stack. The call site is replaced by the result or the thrown value.
    ///
    /// # Errors
    ///
    /// `StackUnderflow` if the call site is incomplete.
    pub fn pcall_method(&mut self, nargs: usize) -> EngineResult<CallStatus> {
        if self.slots.len() < nargs + 2 {
            return Err(EngineError::StackUnderflow);
        }
        let args = self.pop_n(nargs)?;
        let this = self.pop()?;
        let function = self.pop()?;

        let outcome = {
            let mut scope = Scope::new(&self.jobs);
            scope.call(&function, &this, &args)
        };
        let (status, value) = match outcome {
            Ok(value) => (CallStatus::Success, value),
            Err(thrown) => (CallStatus::Error, thrown),
        };
        trace!(?status, nargs, "pcall");
        self.push(value)?;
        Ok(status)
    }

    /// Job queue of this engine
    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    /// Number of operations that left the stack off their documented depth
    pub fn balance_violations(&self) -> usize {
        self.balance_violations
    }

    pub(crate) fn note_balance_violation(&mut self) {
        self.balance_violations += 1;
    }

    // ========================================================================
    // Conversions
    // ========================================================================

    /// Convert a host value and push it.
    ///
    /// Net delta: `+loader.script_slots()` on success, 0 on failure.
    pub fn push_host(
        &mut self,
        cx: &ConversionContext,
        loader: &Loader,
        value: &JValue,
        in_script: bool,
    ) -> BridgeResult<()> {
        balanced(self, "push_host", StackDelta::produces(loader.script_slots()), |engine| {
            if !loader.is_array() {
                if let Some(script) = loader.converter().from_host(cx, value, in_script)? {
                    engine.push(script)?;
                }
                return Ok(());
            }
            match value {
                JValue::Null => Ok(engine.push(ScriptValue::Null)?),
                JValue::Array(array) => {
                    let at = engine.push_array()?;
                    let mut sink = StackArraySink { engine, array: at };
                    loader
                        .converter()
                        .from_host_array(cx, array.items(), &mut sink, in_script)
                }
                other => Err(crate::java_types::host_mismatch(cx, other, loader.identity(), in_script)),
            }
        })
    }

    /// Pop the top value(s) and convert them to a host value.
    ///
    /// Net delta: `-loader.script_slots()` on success and on failure.
    pub fn pop_host(&mut self, cx: &ConversionContext, loader: &Loader, in_script: bool) -> BridgeResult<JValue> {
        if loader.is_array() {
            return self.pop_host_array(cx, loader, 1, false, in_script);
        }
        let slots = loader.script_slots();
        balanced(self, "pop_host", StackDelta::both(-(slots as isize)), |engine| {
            if slots == 0 {
                return loader.converter().to_host(cx, &ScriptValue::Undefined, in_script);
            }
            let value = engine.pop()?;
            loader.converter().to_host(cx, &value, in_script)
        })
    }

    /// Convert a sequence to a host array of the loader's element type.
    ///
    /// Expanded: the `count` topmost values are the elements. Packed: the top
    /// value is one array (`count` is ignored); null or undefined yields a
    /// null array. Elements are read from the highest index down.
    ///
    /// Net delta: `-count` (expanded) or `-1` (packed), on success and on
    /// failure.
    pub fn pop_host_array(
        &mut self,
        cx: &ConversionContext,
        loader: &Loader,
        count: usize,
        expanded: bool,
        in_script: bool,
    ) -> BridgeResult<JValue> {
        let consumed = if expanded { count } else { 1 };
        balanced(self, "pop_host_array", StackDelta::both(-(consumed as isize)), |engine| {
            if expanded {
                if count > engine.depth() {
                    return Err(EngineError::StackUnderflow.into());
                }
                let mut source = ExpandedSource {
                    engine,
                    len: count,
                    remaining: count,
                };
                return loader.converter().to_host_array(cx, &mut source, in_script);
            }

            let top = engine.peek(-1)?;
            if top.is_null_or_undefined() {
                engine.pop()?;
                return Ok(JValue::Null);
            }
            if !engine.is_array(-1) {
                let value = engine.pop()?;
                return Err(script_mismatch(&value, loader.identity(), in_script));
            }
            let len = engine.get_length(-1)?;
            let array = engine.normalize(-1)?;
            let mut source = PackedSource {
                engine: &mut *engine,
                array,
                len,
                next: len,
            };
            let result = loader.converter().to_host_array(cx, &mut source, in_script)?;
            engine.pop()?;
            Ok(result)
        })
    }
}

/// Elements already on the stack, popped from the top (highest index first)
struct ExpandedSource<'e> {
    engine: &'e mut StackEngine,
    len: usize,
    remaining: usize,
}

impl ElementSource for ExpandedSource<'_> {
    fn len(&self) -> usize {
        self.len
    }

    fn next_element(&mut self) -> BridgeResult<Option<(usize, ScriptValue)>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let value = self.engine.pop()?;
        Ok(Some((self.remaining, value)))
    }
}

/// Elements of an array slot, read from the highest index down
struct PackedSource<'e> {
    engine: &'e mut StackEngine,
    array: usize,
    len: usize,
    next: usize,
}

impl ElementSource for PackedSource<'_> {
    fn len(&self) -> usize {
        self.len
    }

    fn next_element(&mut self) -> BridgeResult<Option<(usize, ScriptValue)>> {
        if self.next == 0 {
            return Ok(None);
        }
        self.next -= 1;
        self.engine.get_prop_index(self.array as isize, self.next)?;
        let value = self.engine.pop()?;
        Ok(Some((self.next, value)))
    }
}

/// Writes elements into an array slot
struct StackArraySink<'e> {
    engine: &'e mut StackEngine,
    array: usize,
}

impl ElementSink for StackArraySink<'_> {
    fn put(&mut self, index: usize, value: ScriptValue) -> BridgeResult<()> {
        self.engine.push(value)?;
        self.engine.put_prop_index(self.array as isize, index)?;
        Ok(())
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Call under construction: function and `this` sit at `base`
#[derive(Debug)]
pub struct StackCallSite {
    base: usize,
    nargs: usize,
}

impl StackCallSite {
    /// Number of script arguments pushed so far
    pub fn nargs(&self) -> usize {
        self.nargs
    }
}

/// Call result sitting in one slot at the top of the stack
#[derive(Debug)]
pub struct StackOutcome {
    slot: usize,
}

impl StackEngine {
    fn check_top(&mut self, slot: usize, what: &'static str) {
        if self.depth() != slot + 1 {
            self.note_balance_violation();
            warn!(what, slot, depth = self.depth(), "call outcome is not on top of the stack");
        }
    }
}

impl Backend for StackEngine {
    type Target = ScriptValue;
    type CallSite = StackCallSite;
    type Outcome = StackOutcome;

    fn begin_call(&mut self, target: &ScriptValue, method: &str, is_lambda: bool) -> BridgeResult<StackCallSite> {
        let base = self.depth();
        balanced(self, "begin_call", StackDelta::produces(2), |engine| {
            if is_lambda {
                engine.push(target.clone())?;
                engine.push(ScriptValue::Undefined)?;
            } else {
                engine.push(target.clone())?;
                engine.get_prop_string(-1, method)?;
                engine.swap(-2, -1)?;
            }
            Ok(())
        })?;
        Ok(StackCallSite { base, nargs: 0 })
    }

    fn push_argument(
        &mut self,
        site: &mut StackCallSite,
        cx: &ConversionContext,
        loader: &Loader,
        value: &JValue,
    ) -> BridgeResult<()> {
        self.push_host(cx, loader, value, false)?;
        site.nargs += loader.script_slots();
        Ok(())
    }

    fn abandon_call(&mut self, site: StackCallSite) {
        if self.depth() != site.base + 2 + site.nargs {
            self.note_balance_violation();
        }
        self.truncate(site.base);
    }

    fn call(&mut self, site: StackCallSite) -> BridgeResult<StackOutcome> {
        let expected = site.base + 2 + site.nargs;
        if self.depth() != expected {
            self.note_balance_violation();
            warn!(expected, depth = self.depth(), "call site out of balance");
        }
        match self.pcall_method(site.nargs)? {
            CallStatus::Success => {
                self.check_top(site.base, "call");
                Ok(StackOutcome { slot: site.base })
            }
            CallStatus::Error => {
                let thrown = self.pop()?;
                Err(BridgeError::Script(thrown.to_exception()))
            }
        }
    }

    fn await_outcome(&mut self, outcome: StackOutcome, job_limit: usize) -> BridgeResult<StackOutcome> {
        self.check_top(outcome.slot, "await_outcome");
        let promise = match self.peek(-1)? {
            ScriptValue::Promise(promise) => promise.clone(),
            _ => return Ok(outcome),
        };
        match settle(&self.jobs, &promise, job_limit) {
            Ok(value) => {
                self.replace(-1, value)?;
                Ok(outcome)
            }
            Err(err) => {
                self.pop()?;
                Err(err)
            }
        }
    }

    fn read_outcome(&mut self, outcome: StackOutcome, cx: &ConversionContext, loader: &Loader) -> BridgeResult<JValue> {
        self.check_top(outcome.slot, "read_outcome");
        let result = self.pop_host(cx, loader, false);
        if loader.script_slots() == 0 {
            // Unboxed void consumes no slot; the call result is discarded here.
            self.pop()?;
        }
        result
    }

    fn take_pending_error(&mut self) -> Option<ScriptValue> {
        self.jobs.take_pending_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{ScriptFunction, ScriptObject};

    #[test]
    fn test_push_pop() {
        let mut engine = StackEngine::new();
        engine.push(ScriptValue::Int(1)).unwrap();
        engine.push(ScriptValue::Int(2)).unwrap();
        assert_eq!(engine.depth(), 2);
        assert!(matches!(engine.peek(-1).unwrap(), ScriptValue::Int(2)));
        assert!(matches!(engine.peek(0).unwrap(), ScriptValue::Int(1)));
        assert!(matches!(engine.pop().unwrap(), ScriptValue::Int(2)));
        assert!(matches!(engine.pop().unwrap(), ScriptValue::Int(1)));
        assert_eq!(engine.pop().unwrap_err(), EngineError::StackUnderflow);
    }

    #[test]
    fn test_stack_overflow() {
        let mut engine = StackEngine::with_limit(2);
        engine.push(ScriptValue::Null).unwrap();
        engine.push(ScriptValue::Null).unwrap();
        assert_eq!(engine.push(ScriptValue::Null).unwrap_err(), EngineError::StackOverflow);
    }

    #[test]
    fn test_invalid_index() {
        let engine = StackEngine::new();
        assert_eq!(engine.peek(-1).unwrap_err(), EngineError::InvalidIndex(-1));
        assert!(!engine.is_array(0));
    }

    #[test]
    fn test_array_props() {
        let mut engine = StackEngine::new();
        let at = engine.push_array().unwrap();
        engine.push(ScriptValue::Int(10)).unwrap();
        engine.put_prop_index(at as isize, 1).unwrap();
        assert_eq!(engine.depth(), 1);
        assert_eq!(engine.get_length(-1).unwrap(), 2);
        engine.get_prop_index(-1, 1).unwrap();
        assert!(matches!(engine.pop().unwrap(), ScriptValue::Int(10)));
        engine.get_prop_string(-1, "length").unwrap();
        assert!(matches!(engine.pop().unwrap(), ScriptValue::Int(2)));

        engine.push(ScriptValue::Int(1)).unwrap();
        engine.push(ScriptValue::Int(2)).unwrap();
        assert!(matches!(engine.put_prop_index(-2, 0), Err(EngineError::NotAnArray(_))));
        assert_eq!(engine.depth(), 2);
    }

    #[test]
    fn test_pcall_method() {
        let mut engine = StackEngine::new();
        let obj = ScriptObject::new();
        obj.set("base", 100);
        let add = ScriptFunction::new("add", |_, this, args| {
            let ScriptValue::Object(this) = this else {
                return Err(ScriptValue::error("TypeError", "bad this"));
            };
            let base = this.get("base").as_number().unwrap_or(0.0);
            Ok(ScriptValue::number(base + args[0].as_number().unwrap_or(0.0)))
        });
        engine.push(add.into()).unwrap();
        engine.push(obj.into()).unwrap();
        engine.push(ScriptValue::Int(5)).unwrap();
        assert_eq!(engine.pcall_method(1).unwrap(), CallStatus::Success);
        assert_eq!(engine.depth(), 1);
        assert!(matches!(engine.pop().unwrap(), ScriptValue::Int(105)));

        engine.push(ScriptValue::Null).unwrap();
        engine.push(ScriptValue::Undefined).unwrap();
        assert_eq!(engine.pcall_method(0).unwrap(), CallStatus::Error);
        assert_eq!(engine.depth(), 1);
        assert_eq!(engine.pop().unwrap().to_exception().name, "TypeError");

        assert_eq!(engine.pcall_method(0).unwrap_err(), EngineError::StackUnderflow);
    }
}
