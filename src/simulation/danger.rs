use bevy_ecs::prelude::*;
use nalgebra::Vector3;
use tracing::{debug, warn};

use crate::pathfinding::astar::grid_distance;
use crate::pathfinding::grid::NavGrid;
use crate::pathfinding::heap::{HeapError, IndexedHeap};
use crate::pathfinding::node::GridCoord;
use crate::simulation::rng::SimRng;

pub const UNREACHABLE: u32 = u32::MAX;

/// Walking distance from the player to every node, refreshed periodically.
#[derive(Resource, Debug, Clone, Default)]
pub struct DangerMap {
    size_x: usize,
    distances: Vec<u32>,
    max_distance: u32,
    source: Option<GridCoord>,
}

impl DangerMap {
    pub fn compute(grid: &NavGrid, player: &Vector3<f32>) -> Self {
        let (size_x, _) = grid.size();
        let source = grid.node_from_world_point(player);
        let distances = match flood(grid, source) {
            Ok(distances) => distances,
            Err(err) => {
                warn!(error = %err, "danger map flood failed");
                return Self::default();
            }
        };

        let max_distance = distances
            .iter()
            .copied()
            .filter(|d| *d != UNREACHABLE)
            .max()
            .unwrap_or(0);
        debug!(max_distance, "danger map computed");

        Self {
            size_x,
            distances,
            max_distance,
            source: Some(source),
        }
    }

    pub fn is_computed(&self) -> bool {
        self.source.is_some()
    }

    pub fn source(&self) -> Option<GridCoord> {
        self.source
    }

    pub fn distance_at(&self, coord: GridCoord) -> u32 {
        if coord.x >= self.size_x {
            return UNREACHABLE;
        }
        self.distances
            .get(coord.y * self.size_x + coord.x)
            .copied()
            .unwrap_or(UNREACHABLE)
    }

    /// Distance normalised by the farthest reachable node. Unreachable nodes score 0.
    pub fn safety(&self, coord: GridCoord) -> f32 {
        let distance = self.distance_at(coord);
        if distance == UNREACHABLE || self.max_distance == 0 {
            return 0.0;
        }
        distance as f32 / self.max_distance as f32
    }

    /// Reachable nodes ordered from farthest to nearest.
    pub fn safest_nodes(&self, count: usize) -> Vec<GridCoord> {
        if self.size_x == 0 {
            return Vec::new();
        }
        let mut reachable: Vec<(usize, u32)> = self
            .distances
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, d)| *d != UNREACHABLE)
            .collect();
        reachable.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        reachable
            .into_iter()
            .take(count)
            .map(|(index, _)| GridCoord::new(index % self.size_x, index / self.size_x))
            .collect()
    }

    /// Random walkable node at least `min_safety` away, else the safest node.
    pub fn pick_safe_target(
        &self,
        grid: &NavGrid,
        rng: &mut SimRng,
        min_safety: f32,
    ) -> Option<Vector3<f32>> {
        let candidates: Vec<&Vector3<f32>> = grid
            .walkable_nodes()
            .filter(|node| self.safety(node.coord) >= min_safety)
            .map(|node| &node.world_position)
            .collect();
        if !candidates.is_empty() {
            return Some(*candidates[rng.range_usize(candidates.len())]);
        }
        let safest = self.safest_nodes(1).into_iter().next()?;
        grid.node(safest).map(|node| node.world_position)
    }
}

/// Dijkstra over forward-traversable edges. The source may be a blocked node.
fn flood(grid: &NavGrid, source: GridCoord) -> Result<Vec<u32>, HeapError> {
    let node_count = grid.max_size();
    let mut distances = vec![UNREACHABLE; node_count];
    let mut settled = vec![false; node_count];
    let mut open: IndexedHeap<u32> = IndexedHeap::new(node_count, node_count);

    let source_index = grid.index(source);
    distances[source_index] = 0;
    open.push(source_index, 0)?;

    while let Some((current, distance)) = open.pop() {
        settled[current] = true;
        let coord = grid.coord_of(current);
        for neighbor in grid.neighbors(coord) {
            let index = grid.index(neighbor);
            if settled[index] || !grid.all_nodes()[index].walkable {
                continue;
            }
            let forward = grid
                .edge_between(coord, neighbor)
                .map_or(true, |edge| edge.allowed_forward);
            if !forward {
                continue;
            }
            let candidate = distance + grid_distance(coord, neighbor);
            if candidate < distances[index] {
                distances[index] = candidate;
                open.update(index, candidate)?;
            }
        }
    }
    Ok(distances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::grid::{GridSettings, ResolutionMode};
    use crate::pathfinding::terrain::TerrainMap;

    fn grid(layout: &str) -> NavGrid {
        let map = TerrainMap::parse_ascii("test", layout, 100.0, 10.0).unwrap();
        NavGrid::build(
            GridSettings {
                resolution_mode: ResolutionMode::ByNodeCount,
                grid_size_x: map.width as u32,
                grid_size_y: map.height as u32,
                node_radius: 50.0,
                blur_size: 0,
                ..GridSettings::default()
            },
            &map,
        )
    }

    #[test]
    fn distances_grow_away_from_player() {
        let grid = grid("....\n....\n");
        let player = grid.node_at(0, 0).unwrap().world_position;
        let map = DangerMap::compute(&grid, &player);
        assert_eq!(map.distance_at(GridCoord::new(0, 0)), 0);
        assert_eq!(map.distance_at(GridCoord::new(3, 0)), 30);
        assert_eq!(map.distance_at(GridCoord::new(3, 1)), 34);
        assert_eq!(map.safest_nodes(1), vec![GridCoord::new(3, 1)]);
        assert_eq!(map.safety(GridCoord::new(3, 1)), 1.0);
    }

    #[test]
    fn walls_make_nodes_unreachable() {
        let grid = grid("..#..\n..#..\n");
        let player = grid.node_at(0, 0).unwrap().world_position;
        let map = DangerMap::compute(&grid, &player);
        assert_eq!(map.distance_at(GridCoord::new(4, 0)), UNREACHABLE);
        assert_eq!(map.safety(GridCoord::new(4, 0)), 0.0);
        assert_eq!(map.distance_at(GridCoord::new(9, 9)), UNREACHABLE);
    }

    #[test]
    fn player_inside_a_wall_still_floods_the_grid() {
        let grid = grid("...\n.#.\n...\n");
        let player = grid.node_at(1, 1).unwrap().world_position;
        let map = DangerMap::compute(&grid, &player);
        assert_eq!(map.source(), Some(GridCoord::new(1, 1)));
        assert_eq!(map.distance_at(GridCoord::new(1, 1)), 0);
        assert_eq!(map.distance_at(GridCoord::new(1, 0)), 10);
        assert_eq!(map.distance_at(GridCoord::new(0, 0)), 14);
        assert!(map.safety(GridCoord::new(2, 2)) > 0.0);
    }

    #[test]
    fn safe_target_respects_threshold() {
        let grid = grid(".....\n");
        let player = grid.node_at(0, 0).unwrap().world_position;
        let map = DangerMap::compute(&grid, &player);
        let mut rng = SimRng::new(11);
        for _ in 0..10 {
            let target = map.pick_safe_target(&grid, &mut rng, 0.7).unwrap();
            let coord = grid.node_from_world_point(&target);
            assert!(coord.x >= 3);
        }
        let fallback = map.pick_safe_target(&grid, &mut rng, 2.0).unwrap();
        assert_eq!(grid.node_from_world_point(&fallback), GridCoord::new(4, 0));
    }
}
