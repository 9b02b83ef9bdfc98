//! Stack balance checker and unwinder
//!
//! Every stack-engine conversion documents its net effect on the operand
//! stack, separately for success and failure:
//!
//! ```text
//! push_host          ok: +slots   err: 0
//! pop_host           ok: -slots   err: -slots
//! pop_host_array(n)  ok: -n       err: -n      (expanded)
//! pop_host_array     ok: -1       err: -1      (packed)
//! ```
//!
//! [`balanced`] runs a conversion, unwinds any slots a failure left behind
//! down to the documented depth, and records a violation if the final depth
//! still differs.

use jsbridge_sdk::BridgeResult;
use tracing::warn;

use super::StackEngine;

/// Documented net stack effect of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackDelta {
    /// Effect when the operation succeeds
    pub ok: isize,
    /// Effect when the operation fails
    pub err: isize,
}

impl StackDelta {
    /// Same effect on both paths
    pub const fn both(delta: isize) -> Self {
        Self { ok: delta, err: delta }
    }

    /// Pushes `n` values on success, nothing on failure
    pub const fn produces(n: usize) -> Self {
        Self {
            ok: n as isize,
            err: 0,
        }
    }
}

/// Run `f` and enforce `delta` on the stack.
pub(crate) fn balanced<T>(
    engine: &mut StackEngine,
    what: &'static str,
    delta: StackDelta,
    f: impl FnOnce(&mut StackEngine) -> BridgeResult<T>,
) -> BridgeResult<T> {
    let base = engine.depth() as isize;
    let result = f(engine);
    let expected = base + if result.is_ok() { delta.ok } else { delta.err };

    if result.is_err() && expected >= 0 && engine.depth() as isize > expected {
        engine.truncate(expected as usize);
    }

    let actual = engine.depth() as isize;
    if actual != expected {
        engine.note_balance_violation();
        warn!(what, base, expected, actual, "operand stack out of balance");
    }
    result
}
