//! Test helpers module
//!
//! Database setup, provider mocks and the shared test context.

#![allow(dead_code)]

pub mod database_helper;
pub mod provider_mock;
pub mod test_context;

pub use database_helper::*;
pub use provider_mock::*;
pub use test_context::*;
