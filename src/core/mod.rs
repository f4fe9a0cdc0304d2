pub mod ecs;
pub mod serialization;
pub mod world;

pub use ecs::{create_schedule, create_world, TickSet};
pub use serialization::{SaveError, SaveState};
pub use world::{ActionIntent, ActionQueue, Game, GameError, IdAllocator, RunnerSummary, Snapshot};
