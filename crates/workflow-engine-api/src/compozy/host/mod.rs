//! Durable workflow host (§4.11, §5): the signal gate and the adapter that
//! drives `Activity`/`SignalChannel` implementations through a running
//! workflow's task sequence.

pub mod durable_host;
pub mod parallel_runner;
pub mod signal_gate;

pub use durable_host::{Activity, ActivityOptions, DurableWorkflowHost, InProcessDurableHost, RetryPolicy, SignalChannel, WorkflowSignal};
pub use parallel_runner::ParallelRunner;
pub use signal_gate::{GateState, SignalGate};
