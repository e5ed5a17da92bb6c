//! Test harness primitives: condition waits, event latches and scoped
//! resource teardown.

pub mod condition;
pub mod scope;

pub use condition::{
    DEFAULT_POLL_INTERVAL, Latch, wait_for_condition, wait_for_condition_every, wait_until,
};
pub use scope::{Close, CloseScope};
