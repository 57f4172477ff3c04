//! Shared library surface for the grading service and its tests.

pub mod api;
pub mod config;
pub mod state;
