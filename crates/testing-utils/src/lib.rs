//! Testing utilities for the analytics workspace
//!
//! In-memory mock implementations of the repository and compute-service
//! ports, with seedable state, failure injection and call counting. Used by
//! unit tests and workspace integration tests without external services.

pub mod mocks;

pub use mocks::*;
