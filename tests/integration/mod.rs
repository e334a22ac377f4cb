//! Shared infrastructure for the end-to-end test files.

pub mod helpers;
