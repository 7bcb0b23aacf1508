pub mod compose;
pub mod config;
pub mod core;
pub mod dedup;
pub mod error;
pub mod memory;
pub mod models;
pub mod normalize;
pub mod pacing;
pub mod providers;
pub mod relationships;

#[cfg(test)]
mod testing;
