use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::pathfinding::node::{EdgeKind, GridCoord, NavEdge, NavNode, NODE_HEIGHT_OFFSET};
use crate::pathfinding::terrain::{Surface, TerrainLayer, TerrainType};
use crate::simulation::rng::SimRng;

pub const MIN_GRID_SIZE: u32 = 1;
pub const MAX_GRID_SIZE: u32 = 100;
pub const MIN_NODE_RADIUS: f32 = 10.0;
pub const MAX_NODE_RADIUS: f32 = 1000.0;

const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// How the grid resolves node count, node size and world size against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    /// Node count follows from world size and node diameter.
    #[default]
    ByWorldSize,
    /// World size follows from node count and node diameter.
    ByNodeCount,
    /// Node diameter follows from world size and node count.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSettings {
    #[serde(default)]
    pub resolution_mode: ResolutionMode,
    #[serde(default = "default_grid_size")]
    pub grid_size_x: u32,
    #[serde(default = "default_grid_size")]
    pub grid_size_y: u32,
    #[serde(default = "default_node_radius")]
    pub node_radius: f32,
    #[serde(default = "default_world_size")]
    pub world_size: Vector2<f32>,
    #[serde(default = "default_origin")]
    pub origin: Vector3<f32>,
    #[serde(default = "default_blur_size")]
    pub blur_size: usize,
    #[serde(default = "default_obstacle_penalty")]
    pub obstacle_proximity_penalty: i32,
    #[serde(default = "default_max_edge_climb")]
    pub max_edge_climb: f32,
    #[serde(default = "default_max_edge_drop")]
    pub max_edge_drop: f32,
    #[serde(default)]
    pub walkable_regions: Vec<TerrainType>,
    #[serde(default = "default_agent_count")]
    pub agent_count: u32,
}

fn default_grid_size() -> u32 {
    20
}

fn default_node_radius() -> f32 {
    50.0
}

fn default_world_size() -> Vector2<f32> {
    Vector2::new(2000.0, 2000.0)
}

fn default_origin() -> Vector3<f32> {
    Vector3::zeros()
}

fn default_blur_size() -> usize {
    2
}

fn default_obstacle_penalty() -> i32 {
    10
}

fn default_max_edge_climb() -> f32 {
    50.0
}

fn default_max_edge_drop() -> f32 {
    500.0
}

fn default_agent_count() -> u32 {
    15
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            resolution_mode: ResolutionMode::default(),
            grid_size_x: default_grid_size(),
            grid_size_y: default_grid_size(),
            node_radius: default_node_radius(),
            world_size: default_world_size(),
            origin: Vector3::zeros(),
            blur_size: default_blur_size(),
            obstacle_proximity_penalty: default_obstacle_penalty(),
            max_edge_climb: default_max_edge_climb(),
            max_edge_drop: default_max_edge_drop(),
            walkable_regions: Vec::new(),
            agent_count: default_agent_count(),
        }
    }
}

impl GridSettings {
    pub fn node_diameter(&self) -> f32 {
        self.node_radius * 2.0
    }

    /// Clamp ranges and resolve the derived dimension for the current mode.
    pub fn validate(&mut self) {
        self.grid_size_x = self.grid_size_x.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE);
        self.grid_size_y = self.grid_size_y.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE);
        self.node_radius = self.node_radius.clamp(MIN_NODE_RADIUS, MAX_NODE_RADIUS);
        self.world_size.x = self.world_size.x.max(0.0);
        self.world_size.y = self.world_size.y.max(0.0);

        match self.resolution_mode {
            ResolutionMode::ByWorldSize => {
                let diameter = self.node_diameter();
                self.grid_size_x = nodes_along(self.world_size.x, diameter);
                self.grid_size_y = nodes_along(self.world_size.y, diameter);
                self.world_size = Vector2::new(
                    self.grid_size_x as f32 * diameter,
                    self.grid_size_y as f32 * diameter,
                );
            }
            ResolutionMode::ByNodeCount => {
                let diameter = self.node_diameter();
                self.world_size = Vector2::new(
                    self.grid_size_x as f32 * diameter,
                    self.grid_size_y as f32 * diameter,
                );
            }
            ResolutionMode::Manual => {
                let diameter = (self.world_size.x / self.grid_size_x as f32)
                    .min(self.world_size.y / self.grid_size_y as f32)
                    .round();
                self.node_radius = (diameter / 2.0).clamp(MIN_NODE_RADIUS, MAX_NODE_RADIUS);
            }
        }
    }

    fn shape_differs(&self, other: &GridSettings) -> bool {
        self.grid_size_x != other.grid_size_x
            || self.grid_size_y != other.grid_size_y
            || self.node_radius != other.node_radius
            || self.resolution_mode != other.resolution_mode
            || self.origin != other.origin
    }

    fn layer_penalty(&self, layer: TerrainLayer) -> i32 {
        self.walkable_regions
            .iter()
            .find(|region| region.layer == layer)
            .map(|region| region.penalty)
            .unwrap_or(0)
    }
}

fn nodes_along(world: f32, diameter: f32) -> u32 {
    ((world / diameter).round() as u32).clamp(MIN_GRID_SIZE, MAX_GRID_SIZE)
}

/// Normalised position of `value` between `a` and `b`, clamped to [0, 1].
pub fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    if (b - a).abs() <= f32::EPSILON {
        return 0.0;
    }
    ((value - a) / (b - a)).clamp(0.0, 1.0)
}

/// Navigation grid built by probing a surface.
///
/// Nodes are stored row-major. The grid is read-only once built, so workers
/// can share one behind an `Arc` while searches keep their own bookkeeping.
#[derive(Debug, Clone)]
pub struct NavGrid {
    settings: GridSettings,
    nodes: Vec<NavNode>,
    edges: Vec<Vec<NavEdge>>,
    penalty_min: i32,
    penalty_max: i32,
}

impl NavGrid {
    pub fn build(mut settings: GridSettings, surface: &dyn Surface) -> Self {
        settings.validate();
        let mut grid = Self {
            settings,
            nodes: Vec::new(),
            edges: Vec::new(),
            penalty_min: 0,
            penalty_max: 0,
        };
        grid.create_nodes(surface);
        grid.create_edges();
        grid.blur_penalty_map();

        info!(
            size_x = grid.settings.grid_size_x,
            size_y = grid.settings.grid_size_y,
            walkable = grid.walkable_count(),
            "navigation grid built"
        );
        grid
    }

    /// Rebuild when the grid shape changed, otherwise refresh in place.
    /// Returns true when a full rebuild happened.
    pub fn apply_settings(&mut self, mut settings: GridSettings, surface: &dyn Surface) -> bool {
        settings.validate();
        if self.settings.shape_differs(&settings) {
            *self = Self::build(settings, surface);
            return true;
        }
        self.settings = settings;
        self.refresh(surface);
        false
    }

    /// Re-probe every node, then rebuild edges and penalties.
    pub fn refresh(&mut self, surface: &dyn Surface) {
        for index in 0..self.nodes.len() {
            let coord = self.nodes[index].coord;
            self.nodes[index] = self.probe_node(coord, surface);
        }
        self.create_edges();
        self.blur_penalty_map();
        debug!(walkable = self.walkable_count(), "navigation grid refreshed");
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    pub fn size(&self) -> (usize, usize) {
        (
            self.settings.grid_size_x as usize,
            self.settings.grid_size_y as usize,
        )
    }

    pub fn max_size(&self) -> usize {
        self.nodes.len()
    }

    pub fn world_size(&self) -> Vector2<f32> {
        self.settings.world_size
    }

    pub fn origin(&self) -> Vector3<f32> {
        self.settings.origin
    }

    pub fn node_diameter(&self) -> f32 {
        self.settings.node_diameter()
    }

    /// Area actually covered by nodes.
    pub fn extent(&self) -> Vector2<f32> {
        let (size_x, size_y) = self.size();
        let diameter = self.node_diameter();
        Vector2::new(size_x as f32 * diameter, size_y as f32 * diameter)
    }

    pub fn penalty_range(&self) -> (i32, i32) {
        (self.penalty_min, self.penalty_max)
    }

    pub fn agent_count(&self) -> u32 {
        self.settings.agent_count
    }

    pub fn set_agent_count(&mut self, count: u32) {
        self.settings.agent_count = count;
    }

    pub fn index(&self, coord: GridCoord) -> usize {
        coord.y * self.settings.grid_size_x as usize + coord.x
    }

    pub fn coord_of(&self, index: usize) -> GridCoord {
        let size_x = self.settings.grid_size_x as usize;
        GridCoord::new(index % size_x, index / size_x)
    }

    pub fn contains(&self, coord: GridCoord) -> bool {
        let (size_x, size_y) = self.size();
        coord.x < size_x && coord.y < size_y
    }

    pub fn node(&self, coord: GridCoord) -> Option<&NavNode> {
        if !self.contains(coord) {
            return None;
        }
        self.nodes.get(self.index(coord))
    }

    pub fn node_at(&self, x: usize, y: usize) -> Option<&NavNode> {
        self.node(GridCoord::new(x, y))
    }

    pub fn all_nodes(&self) -> &[NavNode] {
        &self.nodes
    }

    pub fn walkable_nodes(&self) -> impl Iterator<Item = &NavNode> {
        self.nodes.iter().filter(|node| node.walkable)
    }

    pub fn walkable_count(&self) -> usize {
        self.walkable_nodes().count()
    }

    /// Node under a world point. Points outside the grid clamp to the border.
    pub fn node_from_world_point(&self, point: &Vector3<f32>) -> GridCoord {
        let (size_x, size_y) = self.size();
        let half = self.extent() / 2.0;
        let origin = self.settings.origin;
        let percent_x = inverse_lerp(origin.x - half.x, origin.x + half.x, point.x);
        let percent_y = inverse_lerp(origin.y - half.y, origin.y + half.y, point.y);
        let x = ((size_x as f32 * percent_x).floor() as usize).min(size_x - 1);
        let y = ((size_y as f32 * percent_y).floor() as usize).min(size_y - 1);
        GridCoord::new(x, y)
    }

    /// Up to eight in-bounds neighbours. Diagonals that would cut a blocked
    /// corner are left out.
    pub fn neighbors(&self, coord: GridCoord) -> Vec<GridCoord> {
        let mut neighbors = Vec::with_capacity(NEIGHBOR_OFFSETS.len());
        for (dx, dy) in NEIGHBOR_OFFSETS {
            let Some(candidate) = coord.offset(dx, dy) else {
                continue;
            };
            if !self.contains(candidate) {
                continue;
            }
            if dx != 0 && dy != 0 {
                let side_x = coord.offset(dx, 0).and_then(|c| self.node(c));
                let side_y = coord.offset(0, dy).and_then(|c| self.node(c));
                let clear = side_x.is_some_and(|n| n.walkable) && side_y.is_some_and(|n| n.walkable);
                if !clear {
                    continue;
                }
            }
            neighbors.push(candidate);
        }
        neighbors
    }

    pub fn edges(&self, coord: GridCoord) -> &[NavEdge] {
        if !self.contains(coord) {
            return &[];
        }
        self.edges
            .get(self.index(coord))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn walkable_edges(&self, coord: GridCoord) -> impl Iterator<Item = &NavEdge> {
        self.edges(coord).iter().filter(|edge| edge.is_walkable())
    }

    pub fn edge_between(&self, from: GridCoord, to: GridCoord) -> Option<&NavEdge> {
        self.edges(from).iter().find(|edge| edge.neighbor == to)
    }

    pub fn edge_counts(&self) -> EdgeCounts {
        let mut counts = EdgeCounts::default();
        for edge in self.edges.iter().flatten() {
            match edge.kind() {
                EdgeKind::Walkable => counts.walkable += 1,
                EdgeKind::OneWay => counts.one_way += 1,
                EdgeKind::Blocked => counts.blocked += 1,
            }
        }
        counts
    }

    /// A random walkable node position, or a random point in the grid extents.
    pub fn random_location(&self, node_based: bool, rng: &mut SimRng) -> Vector3<f32> {
        let origin = self.settings.origin;
        if node_based {
            let walkable: Vec<&NavNode> = self.walkable_nodes().collect();
            if walkable.is_empty() {
                warn!("no walkable nodes, falling back to grid origin");
                return origin;
            }
            return walkable[rng.range_usize(walkable.len())].world_position;
        }

        let half = self.extent() / 2.0;
        Vector3::new(
            rng.range_f32(origin.x - half.x, origin.x + half.x),
            rng.range_f32(origin.y - half.y, origin.y + half.y),
            origin.z,
        )
    }

    fn node_center(&self, coord: GridCoord) -> Vector2<f32> {
        let diameter = self.node_diameter();
        let radius = self.settings.node_radius;
        let half = self.extent() / 2.0;
        let origin = self.settings.origin;
        Vector2::new(
            origin.x + coord.x as f32 * diameter + radius - half.x,
            origin.y + coord.y as f32 * diameter + radius - half.y,
        )
    }

    fn probe_node(&self, coord: GridCoord, surface: &dyn Surface) -> NavNode {
        let center = self.node_center(coord);
        match surface.probe(center.x, center.y) {
            Some(hit) => {
                let movement_penalty = if hit.walkable {
                    self.settings.layer_penalty(hit.layer)
                } else {
                    self.settings.obstacle_proximity_penalty
                };
                NavNode {
                    walkable: hit.walkable,
                    world_position: Vector3::new(
                        center.x,
                        center.y,
                        hit.floor_z + NODE_HEIGHT_OFFSET,
                    ),
                    floor_z: hit.floor_z,
                    coord,
                    movement_penalty,
                    layer: Some(hit.layer),
                }
            }
            None => NavNode {
                walkable: false,
                world_position: Vector3::new(center.x, center.y, self.settings.origin.z),
                floor_z: self.settings.origin.z,
                coord,
                movement_penalty: self.settings.obstacle_proximity_penalty,
                layer: None,
            },
        }
    }

    fn create_nodes(&mut self, surface: &dyn Surface) {
        let (size_x, size_y) = self.size();
        let mut nodes = Vec::with_capacity(size_x * size_y);
        for y in 0..size_y {
            for x in 0..size_x {
                nodes.push(self.probe_node(GridCoord::new(x, y), surface));
            }
        }
        self.nodes = nodes;
    }

    fn create_edges(&mut self) {
        let climb = self.settings.max_edge_climb;
        let drop = self.settings.max_edge_drop;
        let edges: Vec<Vec<NavEdge>> = self
            .nodes
            .iter()
            .map(|owner| {
                NEIGHBOR_OFFSETS
                    .iter()
                    .filter_map(|(dx, dy)| owner.coord.offset(*dx, *dy))
                    .filter_map(|coord| self.node(coord))
                    .map(|neighbor| NavEdge::between(owner, neighbor, climb, drop))
                    .collect::<Vec<NavEdge>>()
            })
            .collect();
        self.edges = edges;
    }

    /// Separable box blur over movement penalties with clamp-to-edge sampling.
    fn blur_penalty_map(&mut self) {
        let (size_x, size_y) = self.size();
        let extents = self.settings.blur_size as isize;
        let kernel_size = (extents * 2 + 1) as f32;
        let max_x = size_x as isize - 1;
        let max_y = size_y as isize - 1;
        let penalty = |nodes: &[NavNode], x: isize, y: isize| {
            nodes[y as usize * size_x + x as usize].movement_penalty
        };

        let mut horizontal = vec![0i32; size_x * size_y];
        for y in 0..size_y as isize {
            let mut sum = 0;
            for k in -extents..=extents {
                sum += penalty(&self.nodes, k.clamp(0, max_x), y);
            }
            horizontal[y as usize * size_x] = sum;
            for x in 1..size_x as isize {
                let remove = (x - extents - 1).clamp(0, max_x);
                let add = (x + extents).clamp(0, max_x);
                sum = sum - penalty(&self.nodes, remove, y) + penalty(&self.nodes, add, y);
                horizontal[y as usize * size_x + x as usize] = sum;
            }
        }

        let horizontal_at = |x: isize, y: isize| horizontal[y as usize * size_x + x as usize];
        let mut min = i32::MAX;
        let mut max = i32::MIN;
        for x in 0..size_x as isize {
            let mut sum = 0;
            for k in -extents..=extents {
                sum += horizontal_at(x, k.clamp(0, max_y));
            }
            for y in 0..size_y as isize {
                if y > 0 {
                    let remove = (y - extents - 1).clamp(0, max_y);
                    let add = (y + extents).clamp(0, max_y);
                    sum = sum - horizontal_at(x, remove) + horizontal_at(x, add);
                }
                let blurred = (sum as f32 / (kernel_size * kernel_size)).round() as i32;
                self.nodes[y as usize * size_x + x as usize].movement_penalty = blurred;
                min = min.min(blurred);
                max = max.max(blurred);
            }
        }
        self.penalty_min = min;
        self.penalty_max = max;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeCounts {
    pub walkable: usize,
    pub one_way: usize,
    pub blocked: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::terrain::{FlatSurface, TerrainMap};

    fn settings(size: u32) -> GridSettings {
        GridSettings {
            resolution_mode: ResolutionMode::ByNodeCount,
            grid_size_x: size,
            grid_size_y: size,
            node_radius: 50.0,
            blur_size: 0,
            ..GridSettings::default()
        }
    }

    fn map_grid(layout: &str) -> NavGrid {
        let map = TerrainMap::parse_ascii("test", layout, 100.0, 10.0).unwrap();
        let size = map.width as u32;
        NavGrid::build(settings(size), &map)
    }

    #[test]
    fn validate_clamps_and_resolves_modes() {
        let mut by_count = GridSettings {
            resolution_mode: ResolutionMode::ByNodeCount,
            grid_size_x: 500,
            grid_size_y: 0,
            node_radius: 5.0,
            ..GridSettings::default()
        };
        by_count.validate();
        assert_eq!((by_count.grid_size_x, by_count.grid_size_y), (100, 1));
        assert_eq!(by_count.node_radius, MIN_NODE_RADIUS);
        assert_eq!(by_count.world_size, Vector2::new(2000.0, 20.0));

        let mut by_world = GridSettings {
            world_size: Vector2::new(1000.0, 450.0),
            node_radius: 50.0,
            ..GridSettings::default()
        };
        by_world.validate();
        assert_eq!((by_world.grid_size_x, by_world.grid_size_y), (10, 5));

        let mut manual = GridSettings {
            resolution_mode: ResolutionMode::Manual,
            world_size: Vector2::new(1000.0, 600.0),
            grid_size_x: 10,
            grid_size_y: 4,
            ..GridSettings::default()
        };
        manual.validate();
        assert_eq!(manual.node_radius, 50.0);
    }

    #[test]
    fn nodes_are_centred_on_origin() {
        let grid = NavGrid::build(settings(4), &FlatSurface { z: 0.0 });
        let first = grid.node_at(0, 0).unwrap();
        assert_eq!(first.world_position, Vector3::new(-150.0, -150.0, 1.0));
        let last = grid.node_at(3, 3).unwrap();
        assert_eq!(last.world_position.x, 150.0);
        assert_eq!(grid.max_size(), 16);
    }

    #[test]
    fn world_point_lookup_clamps() {
        let grid = NavGrid::build(settings(4), &FlatSurface { z: 0.0 });
        assert_eq!(
            grid.node_from_world_point(&Vector3::new(-150.0, 120.0, 0.0)),
            GridCoord::new(0, 3)
        );
        assert_eq!(
            grid.node_from_world_point(&Vector3::new(9999.0, -9999.0, 0.0)),
            GridCoord::new(3, 0)
        );
        assert_eq!(inverse_lerp(1.0, 1.0, 5.0), 0.0);
    }

    #[test]
    fn diagonal_neighbors_respect_corners() {
        let grid = map_grid("...\n.#.\n...\n");
        let corner = grid.neighbors(GridCoord::new(0, 0));
        assert_eq!(corner.len(), 3);
        assert_eq!(
            grid.neighbors(GridCoord::new(1, 0)),
            vec![GridCoord::new(0, 0), GridCoord::new(2, 0), GridCoord::new(1, 1)]
        );
    }

    #[test]
    fn blur_spreads_obstacle_penalty() {
        let map = TerrainMap::parse_ascii("test", ".....\n.....\n..#..\n.....\n.....\n", 100.0, 10.0)
            .unwrap();
        let mut blurred = settings(5);
        blurred.blur_size = 1;
        blurred.obstacle_proximity_penalty = 90;
        let grid = NavGrid::build(blurred, &map);
        assert_eq!(grid.node_at(2, 2).unwrap().movement_penalty, 10);
        assert_eq!(grid.node_at(1, 1).unwrap().movement_penalty, 10);
        assert_eq!(grid.node_at(0, 0).unwrap().movement_penalty, 0);
        assert_eq!(grid.penalty_range(), (0, 10));
    }

    #[test]
    fn layer_penalties_apply_before_blur() {
        let map = TerrainMap::parse_ascii("test", "~~\n..\n", 100.0, 10.0).unwrap();
        let mut with_mud = settings(2);
        with_mud.walkable_regions = vec![TerrainType {
            layer: TerrainLayer::Mud,
            penalty: 30,
        }];
        let grid = NavGrid::build(with_mud, &map);
        assert_eq!(grid.node_at(0, 0).unwrap().movement_penalty, 30);
        assert_eq!(grid.node_at(0, 1).unwrap().movement_penalty, 0);
    }

    #[test]
    fn ledges_produce_one_way_edges() {
        let grid = map_grid(".^\n..\n");
        let up = grid
            .edge_between(GridCoord::new(0, 0), GridCoord::new(1, 0))
            .unwrap();
        assert_eq!(up.kind(), EdgeKind::OneWay);
        assert!(!up.allowed_forward);
        let down = grid
            .edge_between(GridCoord::new(1, 0), GridCoord::new(0, 0))
            .unwrap();
        assert!(down.allowed_forward);
        assert!(grid.edge_counts().one_way > 0);
    }

    #[test]
    fn random_location_prefers_walkable_nodes() {
        let grid = map_grid("#.\n##\n");
        let mut rng = SimRng::new(3);
        let spot = grid.random_location(true, &mut rng);
        assert_eq!(grid.node_from_world_point(&spot), GridCoord::new(1, 0));

        let blocked = map_grid("##\n##\n");
        assert_eq!(blocked.random_location(true, &mut rng), Vector3::zeros());

        let free = blocked.random_location(false, &mut rng);
        assert!(free.x.abs() <= 100.0 && free.y.abs() <= 100.0);
    }

    #[test]
    fn apply_settings_rebuilds_only_on_shape_change() {
        let surface = FlatSurface { z: 0.0 };
        let mut grid = NavGrid::build(settings(4), &surface);
        let mut tweaked = grid.settings().clone();
        tweaked.obstacle_proximity_penalty = 40;
        assert!(!grid.apply_settings(tweaked, &surface));
        assert_eq!(grid.settings().obstacle_proximity_penalty, 40);

        assert!(grid.apply_settings(settings(6), &surface));
        assert_eq!(grid.size(), (6, 6));
    }
}
