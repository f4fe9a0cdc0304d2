use bevy_ecs::prelude::*;
use nalgebra::Vector3;
use tracing::{debug, warn};

use crate::components::runner::{Runner, RunnerState};
use crate::components::world::{EntityId, Heading, Player, Position, PowerUp};
use crate::core::world::IdAllocator;
use crate::data::config::{RunnerSettings, SpawnSettings};
use crate::simulation::danger::DangerMap;
use crate::simulation::navigation::NavigationService;
use crate::simulation::rng::SimRng;
use crate::simulation::spawn::{SpawnManager, SpawnQueue};
use crate::simulation::tag::{GameEvent, GameEventLog};
use crate::simulation::time::GameTime;
use crate::systems::runner::choose_target;

/// System: Spawns queued runners at random walkable spots.
#[allow(clippy::too_many_arguments)]
pub fn spawn_runner_system(
    mut commands: Commands,
    time: Res<GameTime>,
    settings: Res<RunnerSettings>,
    danger: Res<DangerMap>,
    mut queue: ResMut<SpawnQueue>,
    mut ids: ResMut<IdAllocator>,
    mut nav: ResMut<NavigationService>,
    mut rng: ResMut<SimRng>,
    mut log: ResMut<GameEventLog>,
    players: Query<&Position, With<Player>>,
) {
    if queue.runners == 0 {
        return;
    }
    if nav.grid().walkable_count() == 0 {
        warn!(queued = queue.runners, "no walkable nodes, runners stay queued");
        return;
    }
    let player = players
        .iter()
        .next()
        .map(|pos| pos.0)
        .unwrap_or_else(Vector3::zeros);

    for _ in 0..queue.runners {
        let spawn = nav.grid().random_location(true, &mut rng);
        let id = ids.alloc();
        let agent = nav.register_runner(id);
        let target = choose_target(&nav, &danger, &mut rng, &player, &settings);
        commands.spawn((
            Runner,
            EntityId(id),
            Position(spawn),
            Heading::default(),
            RunnerState::new(agent, spawn, target),
        ));
        debug!(runner = id, agent = agent.0, "runner spawned");
        log.push(time.tick, GameEvent::RunnerSpawned { id });
    }
    queue.runners = 0;
}

/// System: Drops time pickups on the spawn manager's interval.
#[allow(clippy::too_many_arguments)]
pub fn power_up_spawn_system(
    mut commands: Commands,
    time: Res<GameTime>,
    settings: Res<SpawnSettings>,
    nav: Res<NavigationService>,
    mut spawner: ResMut<SpawnManager>,
    mut ids: ResMut<IdAllocator>,
    mut rng: ResMut<SimRng>,
    pickups: Query<&PowerUp>,
) {
    let current = pickups.iter().count() as u32;
    let grid_valid = nav.grid().walkable_count() > 0;
    let count = spawner.tick(time.delta, current, grid_valid);

    for _ in 0..count {
        let spot = nav.grid().random_location(true, &mut rng);
        let id = ids.alloc();
        commands.spawn((
            EntityId(id),
            Position(spot),
            PowerUp {
                bonus_seconds: settings.bonus_seconds,
            },
        ));
        debug!(pickup = id, x = spot.x, y = spot.y, "pickup spawned");
    }
}
