use bevy_ecs::prelude::*;
use bevy_utils::HashMap;
use nalgebra::{Vector2, Vector3};
use tracing::{debug, warn};

use crate::components::runner::{Runner, RunnerState};
use crate::components::world::{planar_distance, EntityId, Heading, Player, Position};
use crate::data::config::RunnerSettings;
use crate::pathfinding::path::{safe_normal, PathScript};
use crate::simulation::danger::DangerMap;
use crate::simulation::navigation::NavigationService;
use crate::simulation::rng::SimRng;
use crate::simulation::tag::{GameEvent, GameEventLog};
use crate::simulation::time::GameTime;

/// Leading waypoints closer than this (2D) are dropped from a fresh path.
const ARRIVED_EPSILON: f32 = 1.0;

/// Result of advancing a runner along its path for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FollowOutcome {
    Idle,
    Moving(Vector2<f32>),
    Finished,
}

type RunnerQuery<'w, 's> = Query<
    'w,
    's,
    (&'static EntityId, &'static mut Position, &'static mut Heading, &'static mut RunnerState),
    (With<Runner>, Without<Player>),
>;
type PlayerQuery<'w, 's> = Query<'w, 's, &'static Position, (With<Player>, Without<Runner>)>;

/// System: Re-requests paths for runners whose target moved.
pub fn path_request_system(
    time: Res<GameTime>,
    settings: Res<RunnerSettings>,
    mut nav: ResMut<NavigationService>,
    mut runners: Query<(&EntityId, &Position, &mut RunnerState), With<Runner>>,
) {
    for (id, pos, mut state) in runners.iter_mut() {
        state.request_timer -= time.delta;
        if state.request_timer > 0.0 {
            continue;
        }
        state.request_timer = settings.path_request_cooldown;
        request_if_target_moved(id.0, pos.0, &mut state, &settings, &mut nav);
    }
}

/// Request a path when the target drifted past the update threshold. Returns true if a request went out.
pub fn request_if_target_moved(
    id: u32,
    position: Vector3<f32>,
    state: &mut RunnerState,
    settings: &RunnerSettings,
    nav: &mut NavigationService,
) -> bool {
    if !state.target_moved(settings.path_update_threshold) {
        return false;
    }
    match nav.request_path(state.agent, position, state.target) {
        Ok(()) => {
            state.target_old = state.target;
            true
        }
        Err(err) => {
            warn!(runner = id, error = %err, "path request rejected");
            false
        }
    }
}

/// System: Applies finished searches to their runners. A failed search leaves
/// the runner on whatever path it already had.
pub fn path_delivery_system(
    settings: Res<RunnerSettings>,
    time: Res<GameTime>,
    mut nav: ResMut<NavigationService>,
    mut log: ResMut<GameEventLog>,
    mut runners: RunnerQuery,
) {
    let mut deliveries: HashMap<u32, _> = nav
        .drain_results()
        .into_iter()
        .map(|delivery| (delivery.owner, delivery.result))
        .collect();
    if deliveries.is_empty() {
        return;
    }

    for (id, pos, mut heading, mut state) in runners.iter_mut() {
        let Some(result) = deliveries.remove(&id.0) else {
            continue;
        };
        match result {
            Ok(waypoints) => {
                apply_path(&mut state, &mut heading, pos.0, waypoints, &settings);
            }
            Err(err) => {
                debug!(runner = id.0, error = %err, "path search failed");
                log.push(
                    time.tick,
                    GameEvent::PathFailed {
                        id: id.0,
                        reason: err.to_string(),
                    },
                );
            }
        }
    }
}

/// Install a fresh path on a runner and face its first waypoint.
pub fn apply_path(
    state: &mut RunnerState,
    heading: &mut Heading,
    position: Vector3<f32>,
    waypoints: Vec<Vector3<f32>>,
    settings: &RunnerSettings,
) {
    let waypoints: Vec<Vector3<f32>> = waypoints
        .into_iter()
        .skip_while(|point| planar_distance(point, &position) < ARRIVED_EPSILON)
        .collect();

    let script = PathScript::new(
        waypoints,
        position,
        settings.turn_distance,
        settings.stopping_distance,
    );
    state.path_index = 0;
    state.following = true;

    let direction = script
        .look_points
        .first()
        .map(|first| safe_normal(first.xy() - position.xy()))
        .filter(|direction| *direction != Vector2::zeros())
        .unwrap_or_else(|| Vector2::new(1.0, 0.0));
    state.move_direction = direction;
    *heading = Heading::facing(direction);
    state.path = Some(script);
}

/// Advance one runner along its path.
pub fn follow_path(
    state: &mut RunnerState,
    position: &mut Vector3<f32>,
    settings: &RunnerSettings,
    delta: f32,
) -> FollowOutcome {
    if !state.following {
        return FollowOutcome::Idle;
    }
    let Some(path) = state.path.as_ref() else {
        return FollowOutcome::Finished;
    };

    let mut waypoint = match path.look_points.get(state.path_index) {
        Some(point) => *point,
        None => return FollowOutcome::Finished,
    };
    if planar_distance(&waypoint, position) <= settings.waypoint_reach_distance {
        state.path_index += 1;
        match path.look_points.get(state.path_index) {
            Some(point) => waypoint = *point,
            None => return FollowOutcome::Finished,
        }
    }

    let desired = safe_normal(waypoint.xy() - position.xy());
    let t = (settings.turn_speed * delta).clamp(0.0, 1.0);
    let blended = safe_normal(state.move_direction.lerp(&desired, t));
    state.move_direction = if blended == Vector2::zeros() {
        desired
    } else {
        blended
    };

    let step = state.move_direction * settings.speed * delta;
    position.x += step.x;
    position.y += step.y;
    position.z = waypoint.z;
    FollowOutcome::Moving(state.move_direction)
}

/// Pick a new flee target: the danger map when it is ready, else any spot far from the player.
pub fn choose_target(
    nav: &NavigationService,
    danger: &DangerMap,
    rng: &mut SimRng,
    player: &Vector3<f32>,
    settings: &RunnerSettings,
) -> Vector3<f32> {
    if danger.is_computed() {
        if let Some(target) = danger.pick_safe_target(nav.grid(), rng, settings.min_target_safety) {
            if planar_distance(&target, player) > settings.min_target_distance_from_player {
                return target;
            }
        }
    }
    nav.random_position_away_from(player, settings.min_target_distance_from_player, rng)
}

/// System: Moves runners along their paths and retargets them at the end.
#[allow(clippy::too_many_arguments)]
pub fn follow_path_system(
    time: Res<GameTime>,
    settings: Res<RunnerSettings>,
    danger: Res<DangerMap>,
    mut nav: ResMut<NavigationService>,
    mut rng: ResMut<SimRng>,
    players: PlayerQuery,
    mut runners: RunnerQuery,
) {
    let player = players
        .iter()
        .next()
        .map(|pos| pos.0)
        .unwrap_or_else(Vector3::zeros);

    for (id, mut pos, mut heading, mut state) in runners.iter_mut() {
        let mut position = pos.0;
        match follow_path(&mut state, &mut position, &settings, time.delta) {
            FollowOutcome::Idle => {
                if is_stranded(&state, &settings, &nav) {
                    debug!(runner = id.0, "runner has no path, picking a new target");
                    state.target = choose_target(&nav, &danger, &mut rng, &player, &settings);
                    state.force_path_request();
                }
            }
            FollowOutcome::Moving(direction) => {
                pos.0 = position;
                *heading = Heading::facing(direction);
            }
            FollowOutcome::Finished => {
                state.target = choose_target(&nav, &danger, &mut rng, &player, &settings);
                state.clear_path();
                state.force_path_request();
                state.request_timer = settings.path_request_cooldown;
                request_if_target_moved(id.0, pos.0, &mut state, &settings, &mut nav);
            }
        }
    }
}

/// A runner with no path, no search in flight and no request waiting on its
/// cooldown would idle forever.
pub fn is_stranded(state: &RunnerState, settings: &RunnerSettings, nav: &NavigationService) -> bool {
    state.path.is_none()
        && !nav.is_request_pending(state.agent)
        && !state.target_moved(settings.path_update_threshold)
}

/// System: Returns runners that dropped below the kill height to their spawn point.
pub fn fell_out_of_world_system(
    settings: Res<RunnerSettings>,
    mut runners: Query<(&EntityId, &mut Position, &mut RunnerState), With<Runner>>,
) {
    for (id, mut pos, mut state) in runners.iter_mut() {
        if pos.0.z >= settings.kill_z {
            continue;
        }
        warn!(runner = id.0, z = pos.0.z, "runner fell out of the world, respawning");
        pos.0 = state.initial_spawn;
        state.clear_path();
        state.force_path_request();
        state.request_timer = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::config::NavigationSettings;
    use crate::pathfinding::grid::{GridSettings, NavGrid, ResolutionMode};
    use crate::pathfinding::terrain::TerrainMap;
    use crate::simulation::navigation::AgentHandle;

    fn settings() -> RunnerSettings {
        RunnerSettings::default()
    }

    fn inline_nav(layout: &str) -> NavigationService {
        let map = TerrainMap::parse_ascii("test", layout, 100.0, 10.0).unwrap();
        let grid = NavGrid::build(
            GridSettings {
                resolution_mode: ResolutionMode::ByNodeCount,
                grid_size_x: map.width as u32,
                grid_size_y: map.height as u32,
                node_radius: 50.0,
                ..GridSettings::default()
            },
            &map,
        );
        let nav_settings = NavigationSettings {
            worker_threads: 0,
            runners_always_active: 1,
            ..NavigationSettings::default()
        };
        NavigationService::new(grid, &nav_settings).unwrap()
    }

    fn node(nav: &NavigationService, x: usize, y: usize) -> Vector3<f32> {
        nav.grid().node_at(x, y).unwrap().world_position
    }

    fn runner_with_path(points: Vec<Vector3<f32>>, start: Vector3<f32>) -> (RunnerState, Heading) {
        let mut state = RunnerState::new(AgentHandle(0), start, Vector3::zeros());
        let mut heading = Heading::default();
        apply_path(&mut state, &mut heading, start, points, &settings());
        (state, heading)
    }

    #[test]
    fn apply_path_drops_points_under_the_runner() {
        let start = Vector3::new(0.0, 0.0, 1.0);
        let (state, heading) = runner_with_path(
            vec![Vector3::new(0.5, 0.0, 1.0), Vector3::new(0.0, 500.0, 1.0)],
            start,
        );
        assert_eq!(state.waypoint_count(), 1);
        assert!(state.following);
        assert_eq!(state.move_direction, Vector2::new(0.0, 1.0));
        assert!((heading.yaw_degrees - 90.0).abs() < 1e-4);
    }

    #[test]
    fn empty_path_falls_back_to_default_direction() {
        let start = Vector3::new(0.0, 0.0, 1.0);
        let (mut state, _) = runner_with_path(vec![start], start);
        assert_eq!(state.move_direction, Vector2::new(1.0, 0.0));
        let mut position = start;
        assert_eq!(
            follow_path(&mut state, &mut position, &settings(), 0.1),
            FollowOutcome::Finished
        );
    }

    #[test]
    fn follower_moves_toward_waypoint_and_snaps_height() {
        let start = Vector3::new(0.0, 0.0, 1.0);
        let (mut state, _) = runner_with_path(vec![Vector3::new(1000.0, 0.0, 11.0)], start);
        let mut position = start;
        let outcome = follow_path(&mut state, &mut position, &settings(), 0.1);
        assert_eq!(outcome, FollowOutcome::Moving(Vector2::new(1.0, 0.0)));
        assert!((position.x - 60.0).abs() < 1e-3);
        assert_eq!(position.z, 11.0);
    }

    #[test]
    fn follower_finishes_after_last_waypoint() {
        let start = Vector3::new(0.0, 0.0, 1.0);
        let (mut state, _) = runner_with_path(
            vec![Vector3::new(100.0, 0.0, 1.0), Vector3::new(300.0, 0.0, 1.0)],
            start,
        );
        let mut position = start;
        let mut finished = false;
        for _ in 0..100 {
            if follow_path(&mut state, &mut position, &settings(), 0.05) == FollowOutcome::Finished {
                finished = true;
                break;
            }
        }
        assert!(finished);
        assert_eq!(state.path_index, 2);
        assert!(planar_distance(&position, &Vector3::new(300.0, 0.0, 1.0)) <= 40.0);
    }

    #[test]
    fn idle_without_path() {
        let mut state = RunnerState::new(AgentHandle(0), Vector3::zeros(), Vector3::zeros());
        let mut position = Vector3::zeros();
        assert_eq!(
            follow_path(&mut state, &mut position, &settings(), 0.1),
            FollowOutcome::Idle
        );
        assert_eq!(position, Vector3::zeros());
    }

    #[test]
    fn turning_is_gradual() {
        let start = Vector3::new(0.0, 0.0, 0.0);
        let (mut state, _) = runner_with_path(vec![Vector3::new(1000.0, 0.0, 0.0)], start);
        state.move_direction = Vector2::new(0.0, 1.0);
        let mut position = start;
        follow_path(&mut state, &mut position, &settings(), 0.1);
        assert!(state.move_direction.x > 0.0);
        assert!(state.move_direction.y > 0.0);
        assert!((state.move_direction.norm() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn failed_search_keeps_the_current_path() {
        let mut nav = inline_nav("....\n...#\n");
        let agent = nav.register_runner(5);
        let (start, goal, wall) = (node(&nav, 0, 0), node(&nav, 3, 0), node(&nav, 3, 1));

        let mut state = RunnerState::new(agent, start, goal);
        let mut heading = Heading::default();
        apply_path(&mut state, &mut heading, start, vec![start, goal], &settings());
        state.target = wall;
        assert!(request_if_target_moved(5, start, &mut state, &settings(), &mut nav));

        let mut world = World::new();
        world.insert_resource(settings());
        world.insert_resource(GameTime::default());
        world.insert_resource(GameEventLog::default());
        world.insert_resource(nav);
        let runner = world
            .spawn((Runner, EntityId(5), Position(start), heading, state))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(path_delivery_system);
        schedule.run(&mut world);

        let state = world.get::<RunnerState>(runner).unwrap();
        assert!(state.following);
        assert_eq!(state.waypoint_count(), 1);
        assert_eq!(state.path.as_ref().unwrap().look_points[0], goal);
        assert!(matches!(
            world.resource::<GameEventLog>().entries(),
            [(_, GameEvent::PathFailed { id: 5, .. })]
        ));
        assert!(!is_stranded(state, &settings(), world.resource::<NavigationService>()));
    }

    #[test]
    fn runner_without_a_path_is_stranded_once_its_search_fails() {
        let mut nav = inline_nav("....\n...#\n");
        let agent = nav.register_runner(5);
        let start = node(&nav, 0, 0);
        let mut state = RunnerState::new(agent, start, node(&nav, 3, 1));

        assert!(!is_stranded(&state, &settings(), &nav));
        assert!(request_if_target_moved(5, start, &mut state, &settings(), &mut nav));
        assert!(!is_stranded(&state, &settings(), &nav));

        let deliveries = nav.drain_results();
        assert!(deliveries[0].result.is_err());
        assert!(is_stranded(&state, &settings(), &nav));
    }

    #[test]
    fn runner_below_kill_height_returns_to_spawn() {
        let spawn = Vector3::new(100.0, 50.0, 1.0);
        let mut state = RunnerState::new(AgentHandle(0), spawn, Vector3::new(900.0, 0.0, 1.0));
        let mut heading = Heading::default();
        apply_path(
            &mut state,
            &mut heading,
            spawn,
            vec![Vector3::new(900.0, 0.0, 1.0)],
            &settings(),
        );
        state.target_old = state.target;
        state.request_timer = 0.15;

        let mut world = World::new();
        world.insert_resource(settings());
        let fallen = world
            .spawn((Runner, EntityId(1), Position(Vector3::new(0.0, 0.0, -1500.0)), state))
            .id();
        let standing = world
            .spawn((
                Runner,
                EntityId(2),
                Position(Vector3::new(0.0, 0.0, -900.0)),
                RunnerState::new(AgentHandle(1), spawn, spawn),
            ))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(fell_out_of_world_system);
        schedule.run(&mut world);

        assert_eq!(world.get::<Position>(fallen).unwrap().0, spawn);
        let state = world.get::<RunnerState>(fallen).unwrap();
        assert!(state.path.is_none());
        assert!(!state.following);
        assert_eq!(state.request_timer, 0.0);
        assert!(state.target_moved(settings().path_update_threshold));
        assert_eq!(world.get::<Position>(standing).unwrap().0.z, -900.0);
    }
}
