//! Runtime hosting cart processes.
//!
//! Each cart runs as its own tokio task that owns its [`cart::CartProcess`].
//! Signals reach the task through a bounded inbox and are acknowledged once
//! their events are journalled. Queries read the last published snapshot
//! without going through the inbox.
//!
//! Every decision is written to the [`journal`] before it takes effect, so a
//! fresh [`CartRuntime`] can [`recover`](CartRuntime::recover) every process
//! from the journal after a crash.

pub mod error;
pub mod handle;
pub mod history;
pub mod options;
pub mod runtime;
mod worker;

pub use error::{Result, WorkflowError};
pub use handle::{CartHandle, ProcessSnapshot, SignalAck, SignalOutcome};
pub use history::History;
pub use options::ProcessOptions;
pub use runtime::{CartRuntime, RecoveryReport};
