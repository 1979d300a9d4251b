//! Test support utilities for end-to-end testing
//!
//! Starts a complete Klaxon instance on ephemeral ports so tests can drive
//! the HTTP API the way a real client would.

pub mod harness;

pub use harness::TestHarness;
