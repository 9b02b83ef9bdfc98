//! Script-side value model shared by both engine backends
//!
//! Both backends store `ScriptValue`s; they differ only in how values are
//! addressed (operand stack slots vs. owned handles). Heap values (arrays,
//! objects, functions, promises) are reference-counted and share identity when
//! cloned, like values of a garbage-collected script heap.

mod promise;

pub use promise::{settle, JobQueue, PromiseState, ScriptPromise};

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use jsbridge_sdk::{GlobalRef, ScriptException};

/// Result of a script function: a value, or a thrown value
pub type ScriptResult = Result<ScriptValue, ScriptValue>;

/// Coarse script-level type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// boolean
    Boolean,
    /// number (integer- or float-tagged)
    Number,
    /// string
    String,
    /// array
    Array,
    /// plain object
    Object,
    /// callable
    Function,
    /// promise
    Promise,
    /// error object
    Error,
    /// wrapper around a host object
    HostObject,
}

/// A script value
#[derive(Clone)]
pub enum ScriptValue {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// boolean
    Bool(bool),
    /// integer-tagged number
    Int(i32),
    /// float-tagged number
    Float(f64),
    /// string
    String(Rc<str>),
    /// array
    Array(ScriptArray),
    /// plain object
    Object(ScriptObject),
    /// function
    Function(ScriptFunction),
    /// promise
    Promise(ScriptPromise),
    /// error object
    Error(ScriptException),
    /// host object held by the script side
    HostObject(GlobalRef),
}

impl ScriptValue {
    /// Create a string value
    pub fn string(s: &str) -> Self {
        ScriptValue::String(Rc::from(s))
    }

    /// Create an error value
    pub fn error(name: &str, message: impl Into<String>) -> Self {
        ScriptValue::Error(ScriptException::new(name, message))
    }

    /// Number value, integer-tagged when it fits
    pub fn number(n: f64) -> Self {
        if n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64 && !(n == 0.0 && n.is_sign_negative()) {
            ScriptValue::Int(n as i32)
        } else {
            ScriptValue::Float(n)
        }
    }

    /// Script-level type tag
    pub fn kind(&self) -> ScriptKind {
        match self {
            ScriptValue::Undefined => ScriptKind::Undefined,
            ScriptValue::Null => ScriptKind::Null,
            ScriptValue::Bool(_) => ScriptKind::Boolean,
            ScriptValue::Int(_) | ScriptValue::Float(_) => ScriptKind::Number,
            ScriptValue::String(_) => ScriptKind::String,
            ScriptValue::Array(_) => ScriptKind::Array,
            ScriptValue::Object(_) => ScriptKind::Object,
            ScriptValue::Function(_) => ScriptKind::Function,
            ScriptValue::Promise(_) => ScriptKind::Promise,
            ScriptValue::Error(_) => ScriptKind::Error,
            ScriptValue::HostObject(_) => ScriptKind::HostObject,
        }
    }

    /// Check for `null` or `undefined`
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, ScriptValue::Null | ScriptValue::Undefined)
    }

    /// Check for a number of either tag
    pub fn is_number(&self) -> bool {
        matches!(self, ScriptValue::Int(_) | ScriptValue::Float(_))
    }

    /// Numeric value of a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScriptValue::Int(i) => Some(*i as f64),
            ScriptValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Borrow the array
    pub fn as_array(&self) -> Option<&ScriptArray> {
        match self {
            ScriptValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow the promise
    pub fn as_promise(&self) -> Option<&ScriptPromise> {
        match self {
            ScriptValue::Promise(p) => Some(p),
            _ => None,
        }
    }

    /// Borrow the string contents
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// String conversion as script code would see it (`String(value)`)
    pub fn to_js_string(&self) -> String {
        match self {
            ScriptValue::String(s) => s.to_string(),
            other => other.describe(),
        }
    }

    /// Description used in diagnostics; strings are quoted.
    pub fn describe(&self) -> String {
        match self {
            ScriptValue::Undefined => "undefined".to_string(),
            ScriptValue::Null => "null".to_string(),
            ScriptValue::Bool(b) => b.to_string(),
            ScriptValue::Int(i) => i.to_string(),
            ScriptValue::Float(f) => format_number(*f),
            ScriptValue::String(s) => format!("\"{}\"", s),
            ScriptValue::Array(a) => {
                let items: Vec<String> = a.to_vec().iter().map(|v| v.to_js_string()).collect();
                items.join(",")
            }
            ScriptValue::Object(_) => "[object Object]".to_string(),
            ScriptValue::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
            ScriptValue::Promise(_) => "[object Promise]".to_string(),
            ScriptValue::Error(e) => e.to_string(),
            ScriptValue::HostObject(r) => format!("[host object {}]", r.object_id()),
        }
    }

    /// Turn a thrown value into an exception description
    pub fn to_exception(&self) -> ScriptException {
        match self {
            ScriptValue::Error(e) => e.clone(),
            other => ScriptException::new("Error", other.to_js_string()),
        }
    }

    /// Identity/value equality (`===` semantics, NaN aside)
    pub fn strict_equals(&self, other: &ScriptValue) -> bool {
        match (self, other) {
            (ScriptValue::Undefined, ScriptValue::Undefined) => true,
            (ScriptValue::Null, ScriptValue::Null) => true,
            (ScriptValue::Bool(a), ScriptValue::Bool(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => a.as_number() == b.as_number(),
            (ScriptValue::String(a), ScriptValue::String(b)) => a == b,
            (ScriptValue::Array(a), ScriptValue::Array(b)) => a.ptr_eq(b),
            (ScriptValue::Object(a), ScriptValue::Object(b)) => Rc::ptr_eq(&a.0, &b.0),
            (ScriptValue::Function(a), ScriptValue::Function(b)) => Rc::ptr_eq(&a.body, &b.body),
            (ScriptValue::Promise(a), ScriptValue::Promise(b)) => a.ptr_eq(b),
            (ScriptValue::Error(a), ScriptValue::Error(b)) => a == b,
            (ScriptValue::HostObject(a), ScriptValue::HostObject(b)) => a.object_id() == b.object_id(),
            _ => false,
        }
    }
}

fn format_number(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        format!("{}", f)
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptValue({})", self.describe())
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Bool(b)
    }
}

impl From<i32> for ScriptValue {
    fn from(i: i32) -> Self {
        ScriptValue::Int(i)
    }
}

impl From<f64> for ScriptValue {
    fn from(f: f64) -> Self {
        ScriptValue::Float(f)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::string(s)
    }
}

impl From<ScriptArray> for ScriptValue {
    fn from(a: ScriptArray) -> Self {
        ScriptValue::Array(a)
    }
}

impl From<ScriptObject> for ScriptValue {
    fn from(o: ScriptObject) -> Self {
        ScriptValue::Object(o)
    }
}

impl From<ScriptFunction> for ScriptValue {
    fn from(f: ScriptFunction) -> Self {
        ScriptValue::Function(f)
    }
}

impl From<ScriptPromise> for ScriptValue {
    fn from(p: ScriptPromise) -> Self {
        ScriptValue::Promise(p)
    }
}

// ============================================================================
// Arrays
// ============================================================================

/// Script array (shared, growable)
#[derive(Clone, Default)]
pub struct ScriptArray(Rc<RefCell<Vec<ScriptValue>>>);

impl ScriptArray {
    /// Empty array
    pub fn new() -> Self {
        Self::default()
    }

    /// Array holding the given elements
    pub fn from_vec(items: Vec<ScriptValue>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    /// `length`
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Check if array is empty
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Element at index (`undefined` when absent)
    pub fn get(&self, index: usize) -> ScriptValue {
        self.0
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or(ScriptValue::Undefined)
    }

    /// Store at index, growing with `undefined` holes
    pub fn set(&self, index: usize, value: ScriptValue) {
        let mut items = self.0.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, ScriptValue::Undefined);
        }
        items[index] = value;
    }

    /// Append an element
    pub fn push(&self, value: ScriptValue) {
        self.0.borrow_mut().push(value);
    }

    /// Snapshot of the elements
    pub fn to_vec(&self) -> Vec<ScriptValue> {
        self.0.borrow().clone()
    }

    /// Whether both values are the same array
    pub fn ptr_eq(&self, other: &ScriptArray) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

// ============================================================================
// Objects
// ============================================================================

/// Plain script object with string-keyed properties
#[derive(Clone, Default)]
pub struct ScriptObject(Rc<RefCell<BTreeMap<String, ScriptValue>>>);

impl ScriptObject {
    /// Empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Property value (`undefined` when absent)
    pub fn get(&self, name: &str) -> ScriptValue {
        self.0
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or(ScriptValue::Undefined)
    }

    /// Set a property
    pub fn set(&self, name: &str, value: impl Into<ScriptValue>) {
        self.0.borrow_mut().insert(name.to_string(), value.into());
    }

    /// Check whether a property exists
    pub fn has(&self, name: &str) -> bool {
        self.0.borrow().contains_key(name)
    }
}

// ============================================================================
// Functions
// ============================================================================

type FunctionBody = dyn Fn(&mut Scope<'_>, &ScriptValue, &[ScriptValue]) -> ScriptResult;

/// Execution scope handed to a running script function
pub struct Scope<'a> {
    jobs: &'a JobQueue,
}

impl<'a> Scope<'a> {
    /// Scope over an engine's job queue
    pub fn new(jobs: &'a JobQueue) -> Self {
        Self { jobs }
    }

    /// Queue a job to run on the next turn of the job loop
    pub fn enqueue<F>(&mut self, job: F)
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), ScriptValue> + 'static,
    {
        self.jobs.enqueue(job);
    }

    /// Call another function from within a running one
    pub fn call(&mut self, function: &ScriptValue, this: &ScriptValue, args: &[ScriptValue]) -> ScriptResult {
        match function {
            ScriptValue::Function(f) => f.call(self, this, args),
            other => Err(ScriptValue::error(
                "TypeError",
                format!("{} is not a function", other.describe()),
            )),
        }
    }
}

/// Callable script value backed by a native body
#[derive(Clone)]
pub struct ScriptFunction {
    name: Rc<str>,
    body: Rc<FunctionBody>,
}

impl ScriptFunction {
    /// Create a function
    pub fn new<F>(name: &str, body: F) -> Self
    where
        F: Fn(&mut Scope<'_>, &ScriptValue, &[ScriptValue]) -> ScriptResult + 'static,
    {
        Self {
            name: Rc::from(name),
            body: Rc::new(body),
        }
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function
    pub fn call(&self, scope: &mut Scope<'_>, this: &ScriptValue, args: &[ScriptValue]) -> ScriptResult {
        (self.body)(scope, this, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_tagging() {
        assert!(matches!(ScriptValue::number(3.0), ScriptValue::Int(3)));
        assert!(matches!(ScriptValue::number(3.5), ScriptValue::Float(_)));
        assert!(matches!(ScriptValue::number(1e12), ScriptValue::Float(_)));
        assert!(matches!(ScriptValue::number(-0.0), ScriptValue::Float(_)));
    }

    #[test]
    fn test_describe() {
        assert_eq!(ScriptValue::string("abc").describe(), "\"abc\"");
        assert_eq!(ScriptValue::string("abc").to_js_string(), "abc");
        assert_eq!(ScriptValue::Float(3.0).describe(), "3");
        assert_eq!(ScriptValue::Float(f64::NAN).describe(), "NaN");
        let arr = ScriptArray::from_vec(vec![1.into(), "x".into()]);
        assert_eq!(ScriptValue::from(arr).describe(), "1,x");
        assert_eq!(ScriptValue::error("TypeError", "bad").describe(), "TypeError: bad");
    }

    #[test]
    fn test_array_holes() {
        let arr = ScriptArray::new();
        arr.set(2, 7.into());
        assert_eq!(arr.len(), 3);
        assert!(matches!(arr.get(0), ScriptValue::Undefined));
        assert!(matches!(arr.get(2), ScriptValue::Int(7)));
        assert!(matches!(arr.get(10), ScriptValue::Undefined));
    }

    #[test]
    fn test_shared_identity() {
        let arr = ScriptArray::new();
        let a = ScriptValue::from(arr.clone());
        arr.push(1.into());
        assert!(a.strict_equals(&ScriptValue::Array(arr)));
        assert!(ScriptValue::Int(2).strict_equals(&ScriptValue::Float(2.0)));
    }

    #[test]
    fn test_function_call() {
        let jobs = JobQueue::new();
        let mut scope = Scope::new(&jobs);
        let add = ScriptFunction::new("add", |_, _, args| {
            let a = args.first().and_then(|v| v.as_number()).unwrap_or(0.0);
            let b = args.get(1).and_then(|v| v.as_number()).unwrap_or(0.0);
            Ok(ScriptValue::number(a + b))
        });
        let result = scope
            .call(&add.into(), &ScriptValue::Undefined, &[1.into(), 2.into()])
            .unwrap();
        assert!(matches!(result, ScriptValue::Int(3)));

        let err = scope.call(&ScriptValue::Null, &ScriptValue::Undefined, &[]).unwrap_err();
        assert_eq!(err.to_exception().name, "TypeError");
    }
}
