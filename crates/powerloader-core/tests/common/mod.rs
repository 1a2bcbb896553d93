//! Shared helpers for integration tests.

pub mod range_server;
