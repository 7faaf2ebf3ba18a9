//! Background switch bus
//!
//! Debounced, single-flight background jobs triggered by DB mutations.
//! Mutation paths activate a named switch instead of doing slow work inline;
//! the single worker task drains activations one at a time, so a handler is
//! never invoked concurrently with itself and repeated activations collapse
//! into one run.

pub mod switches;

pub use switches::{SwitchBus, SwitchHandler};
