use std::fs;
use std::path::Path;

use bevy_ecs::prelude::*;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::components::runner::{Runner, RunnerState};
use crate::components::world::{EntityId, Heading, Position, PowerUp};
use crate::core::world::IdAllocator;
use crate::data::config::SpawnSettings;
use crate::simulation::danger::DangerMap;
use crate::simulation::navigation::NavigationService;
use crate::simulation::rng::SimRng;
use crate::simulation::spawn::{SpawnManager, SpawnQueue};
use crate::simulation::tag::TagGameState;
use crate::simulation::time::GameTime;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to access save file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse save file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Save state capturing the round: clock, score, player and runners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveState {
    #[serde(default = "default_save_version")]
    pub version: u32,
    pub seed: u64,
    pub time: GameTime,
    pub tag: TagGameState,
    pub rng: SimRng,
    pub player: SavedPlayer,
    pub runners: Vec<SavedRunner>,
    #[serde(default)]
    pub pickups: Vec<SavedPickup>,
}

fn default_save_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPlayer {
    pub uid: u32,
    pub position: Vector3<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRunner {
    pub uid: u32,
    pub position: Vector3<f32>,
    pub target: Vector3<f32>,
    pub initial_spawn: Vector3<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPickup {
    pub uid: u32,
    pub position: Vector3<f32>,
    pub bonus_seconds: f32,
}

/// Extract a serializable snapshot of the world.
pub fn extract_state_from_world(world: &World, player: Entity, seed: u64) -> SaveState {
    let time = world.resource::<GameTime>().clone();
    let tag = world.resource::<TagGameState>().clone();
    let rng = world.resource::<SimRng>().clone();

    let player = SavedPlayer {
        uid: world.get::<EntityId>(player).map(|id| id.0).unwrap_or(0),
        position: world
            .get::<Position>(player)
            .map(|pos| pos.0)
            .unwrap_or_else(Vector3::zeros),
    };

    let mut runners: Vec<SavedRunner> = world
        .iter_entities()
        .filter(|entity_ref| entity_ref.contains::<Runner>())
        .filter_map(|entity_ref| {
            let state = entity_ref.get::<RunnerState>()?;
            Some(SavedRunner {
                uid: entity_ref.get::<EntityId>()?.0,
                position: entity_ref.get::<Position>()?.0,
                target: state.target,
                initial_spawn: state.initial_spawn,
            })
        })
        .collect();
    runners.sort_by_key(|runner| runner.uid);

    let mut pickups: Vec<SavedPickup> = world
        .iter_entities()
        .filter_map(|entity_ref| {
            Some(SavedPickup {
                bonus_seconds: entity_ref.get::<PowerUp>()?.bonus_seconds,
                uid: entity_ref.get::<EntityId>()?.0,
                position: entity_ref.get::<Position>()?.0,
            })
        })
        .collect();
    pickups.sort_by_key(|pickup| pickup.uid);

    SaveState {
        version: default_save_version(),
        seed,
        time,
        tag,
        rng,
        player,
        runners,
        pickups,
    }
}

/// Apply a save state back into a live world. Runners are respawned and
/// re-registered with navigation; their paths are requested again.
pub fn apply_state_to_world(state: SaveState, world: &mut World, player: Entity) {
    if state.version != default_save_version() {
        warn!(version = state.version, "loading save with unexpected version");
    }

    let stale: Vec<(Entity, Option<RunnerState>)> = world
        .iter_entities()
        .filter(|entity_ref| entity_ref.id() != player)
        .filter(|entity_ref| entity_ref.contains::<Runner>() || entity_ref.contains::<PowerUp>())
        .map(|entity_ref| (entity_ref.id(), entity_ref.get::<RunnerState>().cloned()))
        .collect();
    for (entity, runner) in stale {
        if let Some(runner) = runner {
            world.resource_mut::<NavigationService>().release_agent(runner.agent);
        }
        world.despawn(entity);
    }

    let game_over = state.tag.game_over;
    world.insert_resource(state.time);
    world.insert_resource(state.tag);
    world.insert_resource(state.rng);
    world.insert_resource(DangerMap::default());
    world.resource_mut::<SpawnQueue>().runners = 0;
    let spawn = world.resource::<SpawnSettings>().clone();
    {
        let mut spawner = world.resource_mut::<SpawnManager>();
        if game_over {
            spawner.stop();
        } else if spawn.enabled && !spawner.is_active() {
            spawner.start(spawn.interval_seconds, spawn.max_concurrent, spawn.spawn_per_tick);
        }
    }

    if let Some(mut id) = world.get_mut::<EntityId>(player) {
        id.0 = state.player.uid;
    }
    if let Some(mut pos) = world.get_mut::<Position>(player) {
        pos.0 = state.player.position;
    }

    let mut max_uid = state.player.uid;
    let runner_count = state.runners.len();
    for runner in state.runners {
        max_uid = max_uid.max(runner.uid);
        let agent = world
            .resource_mut::<NavigationService>()
            .register_runner(runner.uid);
        let mut runner_state = RunnerState::new(agent, runner.initial_spawn, runner.target);
        runner_state.request_timer = 0.0;
        world.spawn((
            Runner,
            EntityId(runner.uid),
            Position(runner.position),
            Heading::default(),
            runner_state,
        ));
    }
    for pickup in state.pickups {
        max_uid = max_uid.max(pickup.uid);
        world.spawn((
            EntityId(pickup.uid),
            Position(pickup.position),
            PowerUp {
                bonus_seconds: pickup.bonus_seconds,
            },
        ));
    }

    world
        .resource_mut::<IdAllocator>()
        .bump_to_at_least(max_uid.saturating_add(1));
    info!(runners = runner_count, "save state applied");
}

pub fn save_state_to_path<P: AsRef<Path>>(state: &SaveState, path: P) -> Result<(), SaveError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(state).map_err(|source| SaveError::Json {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, json).map_err(|source| SaveError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_state_from_path<P: AsRef<Path>>(path: P) -> Result<SaveState, SaveError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| SaveError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SaveError::Json {
        path: path.display().to_string(),
        source,
    })
}
