// livecode-common: shared types and utilities for the livecode workspace

pub mod color;
pub mod handle;
pub mod names;
pub mod types;
