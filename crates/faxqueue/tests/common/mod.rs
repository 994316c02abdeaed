//! Shared test utilities for faxqueue integration tests.
//!
//! - `TestHarness` wires a store, materializer and engine over temp directories
//! - mock gateways and notifiers that record what they were asked to do
//! - document fixture builders

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::TestHarness;
pub use mocks::*;
