//! Application layer: the decision coordinator and its process-wide state.

pub mod engine;
pub mod locks;
pub mod registry;

pub use engine::SlashingProtection;
pub use locks::ValidatorLocks;
pub use registry::ValidatorRegistry;
