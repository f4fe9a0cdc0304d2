use bevy_ecs::prelude::*;
use nalgebra::{Vector2, Vector3};

use crate::pathfinding::path::PathScript;
use crate::simulation::navigation::AgentHandle;

/// Offset added to a fresh target so the first path request always fires.
const FORCE_REQUEST_OFFSET: f32 = 99_999.0;

/// Marker for AI runners fleeing the player.
#[derive(Component, Debug, Default)]
pub struct Runner;

/// Path-following state of one runner.
#[derive(Component, Debug, Clone)]
pub struct RunnerState {
    pub agent: AgentHandle,
    pub target: Vector3<f32>,
    pub target_old: Vector3<f32>,
    pub path: Option<PathScript>,
    pub path_index: usize,
    pub following: bool,
    pub move_direction: Vector2<f32>,
    pub initial_spawn: Vector3<f32>,
    pub request_timer: f32,
}

impl RunnerState {
    pub fn new(agent: AgentHandle, spawn: Vector3<f32>, target: Vector3<f32>) -> Self {
        let mut state = Self {
            agent,
            target,
            target_old: target,
            path: None,
            path_index: 0,
            following: false,
            move_direction: Vector2::zeros(),
            initial_spawn: spawn,
            request_timer: 0.0,
        };
        state.force_path_request();
        state
    }

    /// Make the next request check see a moved target.
    pub fn force_path_request(&mut self) {
        self.target_old = self.target + Vector3::repeat(FORCE_REQUEST_OFFSET);
    }

    /// Whether the target drifted past `threshold` since the last request.
    pub fn target_moved(&self, threshold: f32) -> bool {
        (self.target - self.target_old).norm() > threshold
    }

    pub fn clear_path(&mut self) {
        self.path = None;
        self.path_index = 0;
        self.following = false;
    }

    pub fn waypoint_count(&self) -> usize {
        self.path.as_ref().map_or(0, PathScript::len)
    }

    pub fn current_waypoint(&self) -> Option<&Vector3<f32>> {
        self.path.as_ref()?.look_points.get(self.path_index)
    }
}
