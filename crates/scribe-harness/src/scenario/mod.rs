//! Scenario-based testing with the Oracle Pattern.
//!
//! A scenario is a scripted sequence of link events, owner calls, and clock
//! advances applied to a real [`scribe_core::Session`] inside a [`World`].
//! Every scenario must end with an oracle that checks the final world; a
//! scenario without one does not have a `run` method.

mod builder;
mod world;

pub use builder::{RunnableScenario, Scenario};
pub use world::World;

/// Verification run against the final world.
pub type OracleFn = Box<dyn FnOnce(&World) -> Result<(), String>>;
