pub mod config;
pub mod core;
pub mod harness;

// Re-export commonly used items for convenience
pub use config::Settings;
pub use core::*;
pub use harness::{CloseScope, Latch, wait_for_condition, wait_until};
