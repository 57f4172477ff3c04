//! Application state shared by all handlers.

pub mod store;

pub use store::{AppState, MemoryResultStore};
