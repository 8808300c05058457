//! Dispatch bus and persistence worker pool.
//!
//! The gateway sends an `OperationMessage` to a bus address; the bus hands it
//! to exactly one worker registered at that address and routes the worker's
//! `WorkerResult` back to the sender only. Workers run one message at a time
//! from their own queue.

pub mod bus;
pub mod pool;
pub mod worker;

pub use bus::{DispatchBus, DispatchError, Envelope};
pub use pool::WorkerPool;
pub use worker::PersistenceWorker;
