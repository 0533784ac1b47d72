//! Shared test utilities for globalize integration tests.
//!
//! This module provides:
//! - `PipelineHarness` for isolated runs over an in-memory SQLite store
//! - A Next.js project fixture and matching fake hosting and rewriter setups
//!
//! The fakes themselves live in `globalize::test_support`.

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::PipelineHarness;
