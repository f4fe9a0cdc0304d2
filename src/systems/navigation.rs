use bevy_ecs::prelude::*;
use tracing::trace;

use crate::components::world::{Player, Position};
use crate::data::config::NavigationSettings;
use crate::simulation::danger::DangerMap;
use crate::simulation::navigation::NavigationService;
use crate::simulation::time::GameTime;

/// System: Recomputes the danger map around the player on a fixed cadence.
pub fn danger_map_system(
    mut until_refresh: Local<f32>,
    time: Res<GameTime>,
    settings: Res<NavigationSettings>,
    nav: Res<NavigationService>,
    mut danger: ResMut<DangerMap>,
    players: Query<&Position, With<Player>>,
) {
    *until_refresh -= time.delta;
    if *until_refresh > 0.0 && danger.is_computed() {
        return;
    }
    let Some(player) = players.iter().next() else {
        return;
    };
    *danger = DangerMap::compute(nav.grid(), &player.0);
    *until_refresh = settings.danger_refresh_seconds;
    trace!(source = ?danger.source(), "danger map refreshed");
}
