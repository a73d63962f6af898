//! Event system for the schema generation pipeline
//!
//! This crate provides the event bus and event types used to notify
//! presentation and persistence collaborators of every session change.

mod bus;
mod types;

pub use bus::{EventBus, EventSubscriber};
pub use types::*;
