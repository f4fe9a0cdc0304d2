// Re-export core modules for use by the binary or other consumers
pub mod components;
pub mod core;
pub mod data;
pub mod logger;
pub mod pathfinding;
pub mod project;
pub mod simulation;
pub mod systems;
pub mod world;

// Expose the main Game wrapper and types needed for interaction
pub use crate::core::serialization::SaveState;
pub use crate::core::world::{ActionIntent, Game, GameError, RunnerSummary, Snapshot};
pub use crate::data::config::GameConfig;
