pub mod runner;
pub mod world;

pub use runner::{Runner, RunnerState};
pub use world::{planar_distance, EntityId, Heading, Player, Position, PowerUp};
