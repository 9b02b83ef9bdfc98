//! Managed host runtime used by the bridge's tests and embedders without a
//! real virtual machine.

mod heap;
mod ledger;

pub use heap::{ManagedHeap, MethodBody};
pub use ledger::RefLedger;
