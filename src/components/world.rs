use bevy_ecs::prelude::*;
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// World-space location of an actor.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position(pub Vector3<f32>);

/// Facing around the vertical axis, in degrees from +X.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub yaw_degrees: f32,
}

impl Heading {
    pub fn facing(direction: Vector2<f32>) -> Self {
        Self {
            yaw_degrees: direction.y.atan2(direction.x).to_degrees(),
        }
    }
}

/// Stable identifier for addressing entities externally.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Marker component for the human player.
#[derive(Component, Debug)]
pub struct Player;

/// Time pickup collected by walking over it.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerUp {
    pub bonus_seconds: f32,
}

/// 2D distance, ignoring height.
pub fn planar_distance(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    (a.xy() - b.xy()).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_faces_direction() {
        assert!((Heading::facing(Vector2::new(0.0, 1.0)).yaw_degrees - 90.0).abs() < 1e-4);
        assert_eq!(Heading::facing(Vector2::new(1.0, 0.0)).yaw_degrees, 0.0);
        let a = Vector3::new(0.0, 0.0, 500.0);
        let b = Vector3::new(3.0, 4.0, -20.0);
        assert_eq!(planar_distance(&a, &b), 5.0);
    }
}
