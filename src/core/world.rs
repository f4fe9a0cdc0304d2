use std::path::Path;
use std::sync::Arc;

use bevy_ecs::prelude::*;
use nalgebra::Vector3;
use thiserror::Error;
use tracing::info;

use crate::components::runner::{Runner, RunnerState};
use crate::components::world::{EntityId, Heading, Player, Position, PowerUp};
use crate::core::ecs::{create_schedule, create_world};
use crate::core::serialization::{
    apply_state_to_world, extract_state_from_world, load_state_from_path, save_state_to_path,
    SaveError, SaveState,
};
use crate::data::config::{DebugSettings, GameConfig};
use crate::pathfinding::grid::NavGrid;
use crate::pathfinding::terrain::Surface;
use crate::simulation::debug::{render_ascii, DebugOverlay};
use crate::simulation::navigation::{NavigationError, NavigationService};
use crate::simulation::spawn::{SpawnManager, SpawnQueue};
use crate::simulation::tag::{GameEventLog, TagGameState};
use crate::simulation::time::GameTime;
use crate::world::sqlite::SessionResult;

/// Events included in each snapshot.
const SNAPSHOT_EVENTS: usize = 8;

#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Save(#[from] SaveError),
}

/// Intent-driven commands fed into the ECS each tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionIntent {
    MovePlayer { dx: f32, dy: f32 },
    TeleportPlayer { x: f32, y: f32 },
    SetTagger { entity_id: Option<u32> },
    Wait,
}

/// Resource storing the intents for the next tick.
#[derive(Resource, Default, Debug)]
pub struct ActionQueue(pub Vec<ActionIntent>);

/// Data snapshot returned to the UI layer after each tick.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub time_str: String,
    pub time_remaining: f32,
    pub runners_caught: u32,
    pub game_over: bool,
    pub player_pos: Vector3<f32>,
    pub runners: Vec<RunnerSummary>,
    pub pickups: usize,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSummary {
    pub id: u32,
    pub position: Vector3<f32>,
    pub following: bool,
    pub waypoints: usize,
}

/// Wrapper around the ECS world and schedule.
pub struct Game {
    world: World,
    schedule: Schedule,
    player: Entity,
    player_uid: u32,
    seed: u64,
}

impl Game {
    /// Build the grid, start navigation and queue the first wave of runners.
    pub fn new(config: GameConfig, surface: &dyn Surface) -> Result<Self, GameError> {
        let grid = NavGrid::build(config.grid.clone(), surface);
        let player_start = grid_origin_on_floor(&grid);
        let nav = NavigationService::new(grid, &config.navigation)?;

        let mut world = create_world(&config, nav);
        let player_uid = allocate_entity_id(&mut world);
        let player = world
            .spawn((
                Player,
                EntityId(player_uid),
                Position(player_start),
                Heading::default(),
            ))
            .id();

        world.resource_mut::<SpawnQueue>().runners = config.navigation.runners_always_active;
        if config.spawn.enabled {
            world.resource_mut::<SpawnManager>().start(
                config.spawn.interval_seconds,
                config.spawn.max_concurrent,
                config.spawn.spawn_per_tick,
            );
        }
        info!(
            seed = config.seed,
            runners = config.navigation.runners_always_active,
            "game ready"
        );

        Ok(Self {
            world,
            schedule: create_schedule(),
            player,
            player_uid,
            seed: config.seed,
        })
    }

    /// Run a simulation tick of `delta` seconds and return a snapshot for rendering.
    pub fn tick(&mut self, delta: f32, intents: Vec<ActionIntent>) -> Snapshot {
        self.world.resource_mut::<ActionQueue>().0 = intents;
        self.world.resource_mut::<GameTime>().begin_tick(delta);
        self.schedule.run(&mut self.world);
        Snapshot::capture(self.player, &self.world)
    }

    /// Snapshot of the current state without advancing the simulation.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(self.player, &self.world)
    }

    /// Expose the player's entity id for intent addressing.
    pub fn get_player_id(&self) -> u32 {
        self.player_uid
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn grid(&self) -> Arc<NavGrid> {
        Arc::clone(self.world.resource::<NavigationService>().grid())
    }

    pub fn tag_state(&self) -> &TagGameState {
        self.world.resource::<TagGameState>()
    }

    pub fn time(&self) -> &GameTime {
        self.world.resource::<GameTime>()
    }

    pub fn is_over(&self) -> bool {
        self.tag_state().game_over
    }

    pub fn events(&self) -> &GameEventLog {
        self.world.resource::<GameEventLog>()
    }

    pub fn runner_count(&mut self) -> usize {
        self.world
            .query_filtered::<(), With<Runner>>()
            .iter(&self.world)
            .count()
    }

    pub fn navigation(&self) -> &NavigationService {
        self.world.resource::<NavigationService>()
    }

    /// Markers for the debug view: player, runners, their remaining path points and pickups.
    pub fn debug_overlay(&self) -> DebugOverlay {
        let mut overlay = DebugOverlay {
            player: self.world.get::<Position>(self.player).map(|pos| pos.0),
            ..DebugOverlay::default()
        };
        for entity_ref in self.world.iter_entities() {
            let Some(pos) = entity_ref.get::<Position>() else {
                continue;
            };
            if entity_ref.contains::<PowerUp>() {
                overlay.pickups.push(pos.0);
            }
            if let Some(state) = entity_ref.get::<RunnerState>() {
                overlay.runners.push(pos.0);
                if let Some(path) = &state.path {
                    overlay
                        .path_points
                        .extend(path.look_points.iter().skip(state.path_index).copied());
                }
            }
        }
        overlay
    }

    pub fn render_grid(&self) -> String {
        let settings = *self.world.resource::<DebugSettings>();
        render_ascii(&self.grid(), &self.debug_overlay(), &settings)
    }

    /// Final score of the round for the session history.
    pub fn session_result(&self) -> SessionResult {
        let tag = self.tag_state();
        SessionResult {
            seed: self.seed,
            runners_caught: tag.runners_caught,
            run_time: tag.run_time,
            time_remaining: tag.time_remaining.max(0.0),
            finished_tick: self.time().tick,
        }
    }

    /// Extract a serializable save state from the current world.
    pub fn save_state(&self) -> SaveState {
        extract_state_from_world(&self.world, self.player, self.seed)
    }

    /// Apply a saved state back into the live world.
    pub fn load_state(&mut self, state: SaveState) {
        self.seed = state.seed;
        apply_state_to_world(state, &mut self.world, self.player);
        self.player_uid = self
            .world
            .get::<EntityId>(self.player)
            .map(|id| id.0)
            .unwrap_or(self.player_uid);
    }

    /// Save state directly to a file path.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), GameError> {
        save_state_to_path(&self.save_state(), path)?;
        Ok(())
    }

    /// Load state directly from a file path.
    pub fn load_from_path<P: AsRef<Path>>(&mut self, path: P) -> Result<(), GameError> {
        let state = load_state_from_path(path)?;
        self.load_state(state);
        Ok(())
    }
}

#[derive(Resource, Debug)]
pub struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub fn alloc(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn bump_to_at_least(&mut self, min_next: u32) {
        if self.next < min_next {
            self.next = min_next;
        }
    }
}

fn allocate_entity_id(world: &mut World) -> u32 {
    world.resource_mut::<IdAllocator>().alloc()
}

/// The grid origin lifted onto the floor of its node.
fn grid_origin_on_floor(grid: &NavGrid) -> Vector3<f32> {
    let origin = grid.origin();
    let floor = grid
        .node(grid.node_from_world_point(&origin))
        .map(|node| node.world_position.z)
        .unwrap_or(origin.z);
    Vector3::new(origin.x, origin.y, floor)
}

impl Snapshot {
    fn capture(player: Entity, world: &World) -> Self {
        let time = world.resource::<GameTime>();
        let tag = world.resource::<TagGameState>();

        let player_pos = world
            .get::<Position>(player)
            .map(|pos| pos.0)
            .unwrap_or_else(Vector3::zeros);

        let mut runners: Vec<RunnerSummary> = world
            .iter_entities()
            .filter_map(|e| {
                let state = e.get::<RunnerState>()?;
                Some(RunnerSummary {
                    id: e.get::<EntityId>()?.0,
                    position: e.get::<Position>()?.0,
                    following: state.following,
                    waypoints: state.waypoint_count(),
                })
            })
            .collect();
        runners.sort_by_key(|runner| runner.id);

        let pickups = world
            .iter_entities()
            .filter(|e| e.contains::<PowerUp>())
            .count();

        let events = world
            .get_resource::<GameEventLog>()
            .map(|log| {
                log.recent(SNAPSHOT_EVENTS)
                    .iter()
                    .map(|(tick, event)| format!("[{}] {}", tick, event))
                    .collect()
            })
            .unwrap_or_default();

        Snapshot {
            time_str: time.to_string(),
            time_remaining: tag.time_remaining,
            runners_caught: tag.runners_caught,
            game_over: tag.game_over,
            player_pos,
            runners,
            pickups,
            events,
        }
    }
}
