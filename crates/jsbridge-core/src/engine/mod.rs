//! Script engine backends
//!
//! Two calling conventions sit behind one [`Backend`] contract:
//!
//! ```text
//!              ┌──────────────────────────────┐
//!              │ JavaScriptMethod::invoke     │
//!              └──────────────┬───────────────┘
//!                             │ begin_call / push_argument / call /
//!                             │ await_outcome / read_outcome
//!              ┌──────────────┴───────────────┐
//!     ┌────────▼────────┐            ┌────────▼────────┐
//!     │ StackEngine     │            │ HandleEngine    │
//!     │ operand stack,  │            │ owned handles,  │
//!     │ net-delta       │            │ freed exactly   │
//!     │ bookkeeping     │            │ once            │
//!     └─────────────────┘            └─────────────────┘
//! ```
//!
//! Converters only ever see isolated `ScriptValue`s plus an [`ElementSource`]
//! or [`ElementSink`] for arrays; each backend decides traversal order and
//! cleanup behind those traits.

mod guard;
mod handle;
mod stack;

pub use guard::StackDelta;
pub use handle::{Handle, HandleCallSite, HandleEngine, HandleGuard};
pub use stack::{CallStatus, StackCallSite, StackEngine, StackOutcome};

use jsbridge_sdk::{BridgeError, BridgeResult, JValue, ScriptException};
use thiserror::Error;

use crate::context::ConversionContext;
use crate::java_types::Loader;
use crate::script::{ScriptArray, ScriptValue};

/// Engine-level failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Operand stack is full
    #[error("Stack overflow")]
    StackOverflow,

    /// Not enough values on the operand stack
    #[error("Stack underflow")]
    StackUnderflow,

    /// Stack index does not address a live slot
    #[error("Invalid stack index: {0}")]
    InvalidIndex(isize),

    /// Value is not an array
    #[error("Not an array: {0}")]
    NotAnArray(String),

    /// Value is not callable
    #[error("{0} is not a function")]
    NotCallable(String),

    /// Handle does not address a live value
    #[error("Invalid handle: {0}")]
    InvalidHandle(usize),
}

/// Result type for engine primitives
pub type EngineResult<T> = Result<T, EngineError>;

impl From<EngineError> for BridgeError {
    fn from(err: EngineError) -> Self {
        let name = match err {
            EngineError::StackOverflow => "RangeError",
            EngineError::NotAnArray(_) | EngineError::NotCallable(_) => "TypeError",
            _ => "InternalError",
        };
        BridgeError::Script(ScriptException::new(name, err.to_string()))
    }
}

// ============================================================================
// Element sources and sinks
// ============================================================================

/// Supplies the elements of a script sequence, in an order of its choosing
pub trait ElementSource {
    /// Number of elements, read once up front
    fn len(&self) -> usize;

    /// Check if the source has no elements
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Next `(index, value)` pair, or `None` once exhausted
    fn next_element(&mut self) -> BridgeResult<Option<(usize, ScriptValue)>>;
}

/// Receives the elements of a script sequence under construction
pub trait ElementSink {
    /// Store `value` at `index`
    fn put(&mut self, index: usize, value: ScriptValue) -> BridgeResult<()>;
}

/// Source over a borrowed slice, in increasing index order
pub struct SliceSource<'a> {
    items: &'a [ScriptValue],
    next: usize,
}

impl<'a> SliceSource<'a> {
    /// Source over `items`
    pub fn new(items: &'a [ScriptValue]) -> Self {
        Self { items, next: 0 }
    }
}

impl ElementSource for SliceSource<'_> {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn next_element(&mut self) -> BridgeResult<Option<(usize, ScriptValue)>> {
        let index = self.next;
        let Some(value) = self.items.get(index) else {
            return Ok(None);
        };
        self.next += 1;
        Ok(Some((index, value.clone())))
    }
}

/// Sink building a fresh script array
#[derive(Default)]
pub struct ScriptArraySink {
    array: ScriptArray,
}

impl ScriptArraySink {
    /// Sink over a new empty array
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished array as a script value
    pub fn into_value(self) -> ScriptValue {
        ScriptValue::Array(self.array)
    }
}

impl ElementSink for ScriptArraySink {
    fn put(&mut self, index: usize, value: ScriptValue) -> BridgeResult<()> {
        self.array.set(index, value);
        Ok(())
    }
}

// ============================================================================
// Backend contract
// ============================================================================

/// One engine calling convention.
///
/// A call goes through `begin_call`, one `push_argument` per script argument,
/// then `call`. Whatever the backend allocated for a call site is reclaimed by
/// `abandon_call` or `call`; whatever it allocated for an outcome is reclaimed
/// by `await_outcome` on failure or by `read_outcome`.
pub trait Backend {
    /// What a method is called on
    type Target;
    /// A call being assembled
    type CallSite;
    /// The raw result of a call
    type Outcome;

    /// Start a call: resolve the callable (`target` itself for a lambda,
    /// otherwise its `method` property) and bind `this`.
    fn begin_call(&mut self, target: &Self::Target, method: &str, is_lambda: bool) -> BridgeResult<Self::CallSite>;

    /// Convert one host argument and append it to the call site. A failed
    /// conversion leaves the call site as it was.
    fn push_argument(
        &mut self,
        site: &mut Self::CallSite,
        cx: &ConversionContext,
        loader: &Loader,
        value: &JValue,
    ) -> BridgeResult<()>;

    /// Drop a call site without calling
    fn abandon_call(&mut self, site: Self::CallSite);

    /// Perform the call. A thrown value becomes `BridgeError::Script`.
    fn call(&mut self, site: Self::CallSite) -> BridgeResult<Self::Outcome>;

    /// Run jobs until a promise outcome settles; other outcomes pass through.
    fn await_outcome(&mut self, outcome: Self::Outcome, job_limit: usize) -> BridgeResult<Self::Outcome>;

    /// Convert the outcome to a host value, consuming it
    fn read_outcome(
        &mut self,
        outcome: Self::Outcome,
        cx: &ConversionContext,
        loader: &Loader,
    ) -> BridgeResult<JValue>;

    /// Take a script error left behind by a job, if any
    fn take_pending_error(&mut self) -> Option<ScriptValue>;
}
