use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::pathfinding::terrain::TerrainLayer;

/// Walkable nodes float this far above the floor they were probed on.
pub const NODE_HEIGHT_OFFSET: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridCoord {
    pub x: usize,
    pub y: usize,
}

impl GridCoord {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: isize, dy: isize) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }
}

impl std::fmt::Display for GridCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavNode {
    pub walkable: bool,
    pub world_position: Vector3<f32>,
    pub floor_z: f32,
    pub coord: GridCoord,
    pub movement_penalty: i32,
    pub layer: Option<TerrainLayer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Walkable,
    OneWay,
    Blocked,
}

/// Directed connection from `owner` to one of its eight neighbours.
/// Each direction only requires the node it leads into to be walkable, so an
/// agent standing on a blocked node can still step off it.
#[derive(Debug, Clone, PartialEq)]
pub struct NavEdge {
    pub owner: GridCoord,
    pub neighbor: GridCoord,
    pub world_position: Vector3<f32>,
    pub direction: Vector3<f32>,
    pub length: f32,
    pub allowed_forward: bool,
    pub allowed_backward: bool,
}

impl NavEdge {
    pub fn between(owner: &NavNode, neighbor: &NavNode, max_climb: f32, max_drop: f32) -> Self {
        let delta = neighbor.world_position - owner.world_position;
        let length = delta.norm();
        let direction = if length > f32::EPSILON {
            delta / length
        } else {
            Vector3::zeros()
        };
        let rise = neighbor.floor_z - owner.floor_z;

        Self {
            owner: owner.coord,
            neighbor: neighbor.coord,
            world_position: owner.world_position + delta * 0.5,
            direction,
            length,
            allowed_forward: neighbor.walkable && step_allowed(rise, max_climb, max_drop),
            allowed_backward: owner.walkable && step_allowed(-rise, max_climb, max_drop),
        }
    }

    pub fn kind(&self) -> EdgeKind {
        match (self.allowed_forward, self.allowed_backward) {
            (true, true) => EdgeKind::Walkable,
            (false, false) => EdgeKind::Blocked,
            _ => EdgeKind::OneWay,
        }
    }

    pub fn is_walkable(&self) -> bool {
        self.allowed_forward || self.allowed_backward
    }
}

fn step_allowed(rise: f32, max_climb: f32, max_drop: f32) -> bool {
    if rise >= 0.0 {
        rise <= max_climb
    } else {
        -rise <= max_drop
    }
}
