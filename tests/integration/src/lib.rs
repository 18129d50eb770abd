//! Integration test utilities for the panel link clients
//!
//! This crate provides an in-process WebSocket server that stands in for the
//! panel backend and the RPC socket, plus reusable frames for the tests.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
