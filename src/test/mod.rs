//! Shared fixtures for unit tests.

mod factories;

pub use factories::*;
