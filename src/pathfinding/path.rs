use nalgebra::{Vector2, Vector3};
use tracing::warn;

use crate::pathfinding::line::NavLine;

/// Waypoints plus the turn boundaries a follower uses to smooth corners.
#[derive(Debug, Clone, Default)]
pub struct PathScript {
    pub look_points: Vec<Vector3<f32>>,
    pub turn_boundaries: Vec<NavLine>,
    pub finish_line_index: usize,
    pub slow_down_index: usize,
}

impl PathScript {
    pub fn new(
        waypoints: Vec<Vector3<f32>>,
        start: Vector3<f32>,
        turn_distance: f32,
        stopping_distance: f32,
    ) -> Self {
        if waypoints.is_empty() {
            warn!("path script built without waypoints");
            return Self::default();
        }

        let count = waypoints.len();
        let finish_line_index = count - 1;
        let mut turn_boundaries = Vec::with_capacity(count);
        let mut previous = start.xy();

        for (index, point) in waypoints.iter().enumerate() {
            let current = point.xy();
            let direction = safe_normal(current - previous);
            let turn_point = if index == finish_line_index {
                current
            } else {
                current - direction * turn_distance
            };
            turn_boundaries.push(NavLine::new(
                turn_point,
                previous - direction * turn_distance,
            ));
            previous = turn_point;
        }

        let mut slow_down_index = finish_line_index;
        let mut distance_from_end = 0.0;
        for index in (1..count).rev() {
            distance_from_end += (waypoints[index] - waypoints[index - 1]).norm();
            if distance_from_end > stopping_distance {
                slow_down_index = index;
                break;
            }
        }

        Self {
            look_points: waypoints,
            turn_boundaries,
            finish_line_index,
            slow_down_index,
        }
    }

    pub fn len(&self) -> usize {
        self.look_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.look_points.is_empty()
    }
}

/// Normalised vector, or zero when the input is too short to normalise.
pub fn safe_normal(v: Vector2<f32>) -> Vector2<f32> {
    v.try_normalize(1e-8).unwrap_or_else(Vector2::zeros)
}

/// Keep the first point and every point where the 2D heading changes.
/// The final point is always kept so followers reach the target.
pub fn simplify_path(raw: &[Vector3<f32>]) -> Vec<Vector3<f32>> {
    let Some(first) = raw.first() else {
        return Vec::new();
    };
    let mut waypoints = vec![*first];
    let mut old_direction = Vector2::zeros();

    for pair in raw.windows(2) {
        let direction = safe_normal(pair[1].xy() - pair[0].xy());
        if direction != old_direction {
            waypoints.push(pair[1]);
        }
        old_direction = direction;
    }

    if let Some(last) = raw.last() {
        if waypoints.last() != Some(last) {
            waypoints.push(*last);
        }
    }
    waypoints
}
