use bevy_ecs::prelude::*;
use bevy_ecs::schedule::SystemSet;

use crate::core::world::{ActionQueue, IdAllocator};
use crate::data::config::GameConfig;
use crate::simulation::danger::DangerMap;
use crate::simulation::navigation::NavigationService;
use crate::simulation::rng::SimRng;
use crate::simulation::spawn::{SpawnManager, SpawnQueue};
use crate::simulation::tag::{GameEventLog, TagGameState};
use crate::simulation::time::{advance_time_system, GameTime};
use crate::systems::navigation::danger_map_system;
use crate::systems::runner::{
    fell_out_of_world_system, follow_path_system, path_delivery_system, path_request_system,
};
use crate::systems::spawn::{power_up_spawn_system, spawn_runner_system};
use crate::systems::tag::{catch_system, countdown_system, power_up_pickup_system};
use crate::systems::{event_log_cleanup_system, player_intent_system};

/// Canonical tick ordering for the simulation.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum TickSet {
    Intake,
    Navigation,
    Movement,
    Rules,
    Time,
    Cleanup,
}

/// Build the ECS world with baseline resources.
pub fn create_world(config: &GameConfig, nav: NavigationService) -> World {
    let mut world = World::new();
    world.insert_resource(GameTime::default());
    world.insert_resource(ActionQueue::default());
    world.insert_resource(IdAllocator::default());
    world.insert_resource(TagGameState::new(config.tag.round_seconds));
    world.insert_resource(SpawnManager::default());
    world.insert_resource(SpawnQueue::default());
    world.insert_resource(nav);
    world.insert_resource(DangerMap::default());
    world.insert_resource(SimRng::with_label(config.seed, "runners"));
    world.insert_resource(GameEventLog::default());
    world.insert_resource(config.debug);
    world.insert_resource(config.runner.clone());
    world.insert_resource(config.tag.clone());
    world.insert_resource(config.navigation.clone());
    world.insert_resource(config.spawn.clone());
    world
}

/// Build the system schedule in the canonical order.
pub fn create_schedule() -> Schedule {
    let mut schedule = Schedule::default();

    schedule.configure_sets(
        (
            TickSet::Intake,
            TickSet::Navigation,
            TickSet::Movement,
            TickSet::Rules,
            TickSet::Time,
            TickSet::Cleanup,
        )
            .chain(),
    );

    schedule.add_systems((
        player_intent_system.in_set(TickSet::Intake),
        (danger_map_system, path_delivery_system, path_request_system)
            .chain()
            .in_set(TickSet::Navigation),
        (follow_path_system, fell_out_of_world_system)
            .chain()
            .in_set(TickSet::Movement),
        (
            catch_system,
            power_up_pickup_system,
            spawn_runner_system,
            power_up_spawn_system,
        )
            .chain()
            .in_set(TickSet::Rules),
        (countdown_system, advance_time_system)
            .chain()
            .in_set(TickSet::Time),
        event_log_cleanup_system.in_set(TickSet::Cleanup),
    ));

    schedule
}
