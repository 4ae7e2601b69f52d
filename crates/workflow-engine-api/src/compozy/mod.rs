//! API-crate compozy surface: configuration, durable persistence, the
//! response-handler pipeline, and the durable workflow host adapter.
//!
//! The algorithmic core (normalization, strategies, the task tree's own
//! types) lives in `workflow_engine_core::compozy`; this module is the
//! ambient stack around it — config loading, diesel repositories, and the
//! host that actually drives a run.

pub mod config;
pub mod host;
pub mod repositories;
pub mod response_handlers;

pub use config::{ConfigError, CompozyConfig};
