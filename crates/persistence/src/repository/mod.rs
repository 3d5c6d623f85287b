//! Repository implementations for database operations

pub mod games;

pub use games::*;
