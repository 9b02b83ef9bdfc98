//! Promises and the microtask job queue
//!
//! Script code settles promises from queued jobs. The await step of an
//! invocation drives the queue until the awaited promise leaves the pending
//! state, or until the configured job budget is spent.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use jsbridge_sdk::{BridgeError, BridgeResult};
use tracing::{trace, warn};

use super::{Scope, ScriptValue};

type Job = Box<dyn FnOnce(&mut Scope<'_>) -> Result<(), ScriptValue>>;

/// Settlement state of a promise
#[derive(Debug, Clone)]
pub enum PromiseState {
    /// Not settled yet
    Pending,
    /// Resolved with a value
    Fulfilled(ScriptValue),
    /// Rejected with a reason
    Rejected(ScriptValue),
}

/// Shared promise handle
#[derive(Clone)]
pub struct ScriptPromise(Rc<RefCell<PromiseState>>);

impl ScriptPromise {
    /// New pending promise
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(PromiseState::Pending)))
    }

    /// Promise already fulfilled with `value`
    pub fn resolved(value: ScriptValue) -> Self {
        Self(Rc::new(RefCell::new(PromiseState::Fulfilled(value))))
    }

    /// Promise already rejected with `reason`
    pub fn rejected(reason: ScriptValue) -> Self {
        Self(Rc::new(RefCell::new(PromiseState::Rejected(reason))))
    }

    /// Fulfil the promise. Ignored once settled.
    pub fn resolve(&self, value: ScriptValue) {
        let mut state = self.0.borrow_mut();
        if matches!(*state, PromiseState::Pending) {
            *state = PromiseState::Fulfilled(value);
        }
    }

    /// Reject the promise. Ignored once settled.
    pub fn reject(&self, reason: ScriptValue) {
        let mut state = self.0.borrow_mut();
        if matches!(*state, PromiseState::Pending) {
            *state = PromiseState::Rejected(reason);
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> PromiseState {
        self.0.borrow().clone()
    }

    /// Check whether the promise is still pending
    pub fn is_pending(&self) -> bool {
        matches!(*self.0.borrow(), PromiseState::Pending)
    }

    /// Whether both handles refer to the same promise
    pub fn ptr_eq(&self, other: &ScriptPromise) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for ScriptPromise {
    fn default() -> Self {
        Self::new()
    }
}

/// FIFO queue of microtasks owned by an engine
#[derive(Default)]
pub struct JobQueue {
    jobs: RefCell<VecDeque<Job>>,
    pending_error: RefCell<Option<ScriptValue>>,
}

impl JobQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a job
    pub fn enqueue<F>(&self, job: F)
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), ScriptValue> + 'static,
    {
        self.jobs.borrow_mut().push_back(Box::new(job));
    }

    /// Number of queued jobs
    pub fn len(&self) -> usize {
        self.jobs.borrow().len()
    }

    /// Check whether no job is queued
    pub fn is_empty(&self) -> bool {
        self.jobs.borrow().is_empty()
    }

    /// Run the oldest job. Returns `false` when the queue was empty.
    ///
    /// A job that throws leaves its error pending on the queue, where the
    /// error bridge picks it up.
    pub fn run_next(&self) -> bool {
        // The borrow must end before the job runs: jobs enqueue more jobs.
        let job = self.jobs.borrow_mut().pop_front();
        let Some(job) = job else {
            return false;
        };
        let mut scope = Scope::new(self);
        if let Err(thrown) = job(&mut scope) {
            trace!(error = %thrown.describe(), "job threw");
            self.set_pending_error(thrown);
        }
        true
    }

    /// Drain the queue, running at most `limit` jobs
    pub fn run_until_idle(&self, limit: usize) -> usize {
        let mut ran = 0;
        while ran < limit && self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Record an uncaught script error. The first error wins.
    pub fn set_pending_error(&self, error: ScriptValue) {
        let mut slot = self.pending_error.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        } else {
            warn!(error = %error.describe(), "dropping script error, another one is already pending");
        }
    }

    /// Take the pending script error, if any
    pub fn take_pending_error(&self) -> Option<ScriptValue> {
        self.pending_error.borrow_mut().take()
    }
}

/// Drive `jobs` until `promise` settles.
///
/// # Errors
///
/// Returns `BridgeError::AsyncRejection` when the promise rejects, carrying the
/// rejection reason as text, or when it is still pending after `limit` jobs.
pub fn settle(jobs: &JobQueue, promise: &ScriptPromise, limit: usize) -> BridgeResult<ScriptValue> {
    let mut ran = 0usize;
    loop {
        match promise.state() {
            PromiseState::Fulfilled(value) => {
                trace!(jobs = ran, "promise fulfilled");
                return Ok(value);
            }
            PromiseState::Rejected(reason) => {
                trace!(jobs = ran, "promise rejected");
                return Err(BridgeError::AsyncRejection {
                    message: rejection_message(&reason),
                });
            }
            PromiseState::Pending => {
                if ran >= limit || !jobs.run_next() {
                    warn!(jobs = ran, limit, "awaited promise never settled");
                    return Err(BridgeError::AsyncRejection {
                        message: format!("promise still pending after {} jobs", ran),
                    });
                }
                ran += 1;
            }
        }
    }
}

fn rejection_message(reason: &ScriptValue) -> String {
    match reason {
        ScriptValue::Error(e) => e.to_string(),
        other => other.to_js_string(),
    }
}
