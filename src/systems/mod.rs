pub mod navigation;
pub mod runner;
pub mod spawn;
pub mod tag;

use bevy_ecs::prelude::*;
use nalgebra::Vector3;
use tracing::debug;

use crate::components::world::{Player, Position};
use crate::core::world::{ActionIntent, ActionQueue};
use crate::pathfinding::grid::NavGrid;
use crate::simulation::navigation::NavigationService;
use crate::simulation::tag::{GameEvent, GameEventLog, TagGameState, EVENT_LOG_LIMIT};
use crate::simulation::time::GameTime;

/// System: Applies player intents.
pub fn player_intent_system(
    intents: Res<ActionQueue>,
    nav: Res<NavigationService>,
    time: Res<GameTime>,
    mut tag: ResMut<TagGameState>,
    mut log: ResMut<GameEventLog>,
    mut players: Query<&mut Position, With<Player>>,
) {
    for intent in intents.0.iter() {
        match intent {
            ActionIntent::MovePlayer { dx, dy } => {
                for mut pos in players.iter_mut() {
                    let destination = pos.0 + Vector3::new(*dx, *dy, 0.0);
                    if let Some(moved) = settle_on_grid(nav.grid(), destination) {
                        pos.0 = moved;
                    } else {
                        debug!(x = destination.x, y = destination.y, "player move blocked");
                    }
                }
            }
            ActionIntent::TeleportPlayer { x, y } => {
                for mut pos in players.iter_mut() {
                    if let Some(moved) = settle_on_grid(nav.grid(), Vector3::new(*x, *y, pos.0.z)) {
                        pos.0 = moved;
                    }
                }
            }
            ActionIntent::SetTagger { entity_id } => {
                if tag.set_tagger(*entity_id) {
                    log.push(time.tick, GameEvent::TaggerChanged { id: *entity_id });
                }
            }
            ActionIntent::Wait => {}
        }
    }
}

/// Snap a destination onto the floor of its node, or `None` when the node is blocked.
pub fn settle_on_grid(grid: &NavGrid, destination: Vector3<f32>) -> Option<Vector3<f32>> {
    let node = grid.node(grid.node_from_world_point(&destination))?;
    if !node.walkable {
        return None;
    }
    Some(Vector3::new(
        destination.x,
        destination.y,
        node.world_position.z,
    ))
}

/// System: Keeps the event log bounded.
pub fn event_log_cleanup_system(mut log: ResMut<GameEventLog>) {
    log.trim(EVENT_LOG_LIMIT);
}
