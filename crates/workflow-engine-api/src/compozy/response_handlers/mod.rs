//! Response handlers (§4.10): invoked after each activity completes.

pub mod base;
pub mod parent_status;
pub mod wait;

pub use base::{NextAction, ResponseHandler, ResponseOutput};
