//! Core types for fnstack
//!
//! This crate provides the error taxonomy and request identifiers shared by the
//! runtime and the server binary.

pub mod error;
pub mod request_id;

pub use error::{ErrorCode, RuntimeError};
pub use request_id::RequestId;
