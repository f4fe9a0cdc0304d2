use bevy_ecs::prelude::*;
use tracing::{info, warn};

use crate::components::runner::{Runner, RunnerState};
use crate::components::world::{planar_distance, EntityId, Player, Position, PowerUp};
use crate::data::config::{SpawnSettings, TagSettings};
use crate::simulation::navigation::NavigationService;
use crate::simulation::spawn::{SpawnManager, SpawnQueue};
use crate::simulation::tag::{GameEvent, GameEventLog, TagGameState};
use crate::simulation::time::GameTime;

/// System: Catches runners that come within reach of the player once the
/// round is past its opening grace period.
#[allow(clippy::too_many_arguments)]
pub fn catch_system(
    mut commands: Commands,
    time: Res<GameTime>,
    settings: Res<TagSettings>,
    mut tag: ResMut<TagGameState>,
    mut nav: ResMut<NavigationService>,
    mut queue: ResMut<SpawnQueue>,
    mut log: ResMut<GameEventLog>,
    players: Query<&Position, With<Player>>,
    runners: Query<(Entity, &EntityId, &Position, &RunnerState), With<Runner>>,
) {
    if tag.game_over || time.elapsed < settings.catch_grace_seconds {
        return;
    }
    let Some(player) = players.iter().next() else {
        return;
    };

    for (entity, id, pos, state) in runners.iter() {
        if planar_distance(&pos.0, &player.0) > settings.catch_radius {
            continue;
        }

        commands.entity(entity).despawn();
        if nav.release_agent(state.agent).is_none() {
            warn!(runner = id.0, agent = state.agent.0, "caught runner held no navigation agent");
        }
        tag.runners_caught += 1;
        let remaining = tag.add_extra_time(settings.catch_bonus_seconds);
        queue.runners += 1;

        info!(runner = id.0, caught = tag.runners_caught, "runner caught");
        log.push(time.tick, GameEvent::RunnerCaught { id: id.0 });
        log.push(
            time.tick,
            GameEvent::TimeAdded {
                seconds: settings.catch_bonus_seconds,
                remaining,
            },
        );
    }
}

/// System: Collects pickups the player walks over.
pub fn power_up_pickup_system(
    mut commands: Commands,
    time: Res<GameTime>,
    settings: Res<SpawnSettings>,
    mut tag: ResMut<TagGameState>,
    mut log: ResMut<GameEventLog>,
    players: Query<&Position, With<Player>>,
    pickups: Query<(Entity, &EntityId, &Position, &PowerUp)>,
) {
    if tag.game_over {
        return;
    }
    let Some(player) = players.iter().next() else {
        return;
    };

    for (entity, id, pos, power_up) in pickups.iter() {
        if planar_distance(&pos.0, &player.0) > settings.pickup_radius {
            continue;
        }
        commands.entity(entity).despawn();
        tag.add_extra_time(power_up.bonus_seconds);
        log.push(
            time.tick,
            GameEvent::PickupCollected {
                id: id.0,
                bonus: power_up.bonus_seconds,
            },
        );
    }
}

/// System: Runs the round countdown and ends the game at zero.
pub fn countdown_system(
    time: Res<GameTime>,
    mut tag: ResMut<TagGameState>,
    mut spawner: ResMut<SpawnManager>,
    mut log: ResMut<GameEventLog>,
) {
    if !tag.advance_countdown(time.delta) {
        return;
    }
    spawner.stop();
    info!(
        caught = tag.runners_caught,
        run_time = tag.run_time,
        "round over"
    );
    log.push(
        time.tick,
        GameEvent::GameOver {
            caught: tag.runners_caught,
            run_time: tag.run_time,
        },
    );
}
