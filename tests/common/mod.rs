//! Shared helpers for the integration test suites.

#![allow(dead_code, unused_imports)]

pub mod builders;
pub mod mock_drivers;
pub mod strategies;

pub use builders::*;
pub use mock_drivers::*;
