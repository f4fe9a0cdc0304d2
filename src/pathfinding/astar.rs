use std::sync::atomic::{AtomicBool, Ordering};

use nalgebra::Vector3;
use thiserror::Error;
use tracing::{trace, warn};

use crate::pathfinding::grid::NavGrid;
use crate::pathfinding::heap::{HeapError, IndexedHeap};
use crate::pathfinding::node::GridCoord;
use crate::pathfinding::path::simplify_path;

pub const STRAIGHT_COST: u32 = 10;
pub const DIAGONAL_COST: u32 = 14;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("target node {0} is not walkable")]
    TargetBlocked(GridCoord),
    #[error("no route from {from} to {to}")]
    NoRoute { from: GridCoord, to: GridCoord },
    #[error("path search cancelled")]
    Cancelled,
    #[error("open set error: {0}")]
    Heap(#[from] HeapError),
    #[error("retrace exceeded {limit} steps")]
    RetraceOverflow { limit: usize },
}

/// Octile distance in tenths: 10 per straight step, 14 per diagonal.
pub fn grid_distance(a: GridCoord, b: GridCoord) -> u32 {
    let dx = a.x.abs_diff(b.x) as u32;
    let dy = a.y.abs_diff(b.y) as u32;
    DIAGONAL_COST * dx.min(dy) + STRAIGHT_COST * dx.abs_diff(dy)
}

const NO_PARENT: usize = usize::MAX;

/// A* search over a shared grid. All bookkeeping is local to one call.
pub struct Pathfinder<'a> {
    grid: &'a NavGrid,
}

impl<'a> Pathfinder<'a> {
    pub fn new(grid: &'a NavGrid) -> Self {
        Self { grid }
    }

    pub fn find_path(
        &self,
        start: Vector3<f32>,
        target: Vector3<f32>,
        cancel: &AtomicBool,
    ) -> Result<Vec<Vector3<f32>>, PathError> {
        let grid = self.grid;
        let start_coord = grid.node_from_world_point(&start);
        let target_coord = grid.node_from_world_point(&target);
        let target_index = grid.index(target_coord);

        let target_node = &grid.all_nodes()[target_index];
        if !target_node.walkable {
            warn!(x = target_coord.x, y = target_coord.y, "path target is not walkable");
            return Err(PathError::TargetBlocked(target_coord));
        }
        if start_coord == target_coord {
            return Ok(vec![target_node.world_position]);
        }

        let node_count = grid.max_size();
        let mut g_cost = vec![u32::MAX; node_count];
        let mut parent = vec![NO_PARENT; node_count];
        let mut closed = vec![false; node_count];
        let mut open: IndexedHeap<(u32, u32)> = IndexedHeap::new(node_count, node_count);

        let start_index = grid.index(start_coord);
        let start_h = grid_distance(start_coord, target_coord);
        g_cost[start_index] = 0;
        open.push(start_index, (start_h, start_h))?;

        while let Some((current, _)) = open.pop() {
            if cancel.load(Ordering::Relaxed) {
                return Err(PathError::Cancelled);
            }
            closed[current] = true;
            if current == target_index {
                let nodes = retrace(&parent, start_index, target_index)?;
                let raw: Vec<Vector3<f32>> = nodes
                    .into_iter()
                    .map(|index| grid.all_nodes()[index].world_position)
                    .collect();
                let waypoints = simplify_path(&raw);
                trace!(raw = raw.len(), waypoints = waypoints.len(), "path found");
                return Ok(waypoints);
            }

            let current_coord = grid.coord_of(current);
            for neighbor in grid.neighbors(current_coord) {
                let neighbor_index = grid.index(neighbor);
                let node = &grid.all_nodes()[neighbor_index];
                if !node.walkable || closed[neighbor_index] {
                    continue;
                }
                let forward = grid
                    .edge_between(current_coord, neighbor)
                    .map_or(true, |edge| edge.allowed_forward);
                if !forward {
                    continue;
                }

                let cost = g_cost[current]
                    + grid_distance(current_coord, neighbor)
                    + node.movement_penalty.max(0) as u32;
                if cost < g_cost[neighbor_index] {
                    g_cost[neighbor_index] = cost;
                    parent[neighbor_index] = current;
                    let h = grid_distance(neighbor, target_coord);
                    open.update(neighbor_index, (cost + h, h))?;
                }
            }
        }

        if cancel.load(Ordering::Relaxed) {
            return Err(PathError::Cancelled);
        }
        Err(PathError::NoRoute {
            from: start_coord,
            to: target_coord,
        })
    }
}

/// Walk parents back from the target. Includes the start node.
fn retrace(parent: &[usize], start: usize, target: usize) -> Result<Vec<usize>, PathError> {
    let limit = parent.len();
    let mut nodes = Vec::new();
    let mut current = target;
    while current != start {
        if nodes.len() >= limit || current == NO_PARENT {
            return Err(PathError::RetraceOverflow { limit });
        }
        nodes.push(current);
        current = parent[current];
    }
    nodes.push(start);
    nodes.reverse();
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::grid::{GridSettings, ResolutionMode};
    use crate::pathfinding::terrain::TerrainMap;

    fn grid(layout: &str) -> NavGrid {
        let map = TerrainMap::parse_ascii("test", layout, 100.0, 10.0).unwrap();
        let settings = GridSettings {
            resolution_mode: ResolutionMode::ByNodeCount,
            grid_size_x: map.width as u32,
            grid_size_y: map.height as u32,
            node_radius: 50.0,
            blur_size: 0,
            obstacle_proximity_penalty: 0,
            ..GridSettings::default()
        };
        NavGrid::build(settings, &map)
    }

    fn center(grid: &NavGrid, x: usize, y: usize) -> Vector3<f32> {
        grid.node_at(x, y).unwrap().world_position
    }

    #[test]
    fn octile_distance() {
        assert_eq!(grid_distance(GridCoord::new(0, 0), GridCoord::new(3, 1)), 34);
        assert_eq!(grid_distance(GridCoord::new(2, 2), GridCoord::new(2, 2)), 0);
        assert_eq!(grid_distance(GridCoord::new(4, 0), GridCoord::new(0, 4)), 56);
    }

    #[test]
    fn routes_around_a_wall() {
        let grid = grid(
            ".....\n\
             .###.\n\
             .....\n",
        );
        let cancel = AtomicBool::new(false);
        let path = Pathfinder::new(&grid)
            .find_path(center(&grid, 2, 0), center(&grid, 2, 2), &cancel)
            .unwrap();
        assert_eq!(path.first(), Some(&center(&grid, 2, 0)));
        assert_eq!(path.last(), Some(&center(&grid, 2, 2)));
        for point in &path {
            let coord = grid.node_from_world_point(point);
            assert!(grid.node(coord).unwrap().walkable);
        }
    }

    #[test]
    fn straight_line_collapses_to_endpoints() {
        let grid = grid(".....\n");
        let cancel = AtomicBool::new(false);
        let path = Pathfinder::new(&grid)
            .find_path(center(&grid, 0, 0), center(&grid, 4, 0), &cancel)
            .unwrap();
        assert_eq!(
            path,
            vec![center(&grid, 0, 0), center(&grid, 1, 0), center(&grid, 4, 0)]
        );
    }

    #[test]
    fn blocked_target_and_unreachable_target() {
        let grid = grid("..#..\n..#..\n");
        let cancel = AtomicBool::new(false);
        let finder = Pathfinder::new(&grid);
        assert_eq!(
            finder.find_path(center(&grid, 0, 0), center(&grid, 2, 0), &cancel),
            Err(PathError::TargetBlocked(GridCoord::new(2, 0)))
        );
        assert!(matches!(
            finder.find_path(center(&grid, 0, 0), center(&grid, 4, 1), &cancel),
            Err(PathError::NoRoute { .. })
        ));
    }

    #[test]
    fn search_can_start_inside_a_wall() {
        let grid = grid("...\n.#.\n...\n");
        let cancel = AtomicBool::new(false);
        let path = Pathfinder::new(&grid)
            .find_path(center(&grid, 1, 1), center(&grid, 0, 0), &cancel)
            .unwrap();
        assert_eq!(path, vec![center(&grid, 1, 1), center(&grid, 0, 0)]);
    }

    #[test]
    fn ledge_can_be_dropped_but_not_climbed() {
        let grid = grid("..^^\n");
        let cancel = AtomicBool::new(false);
        let finder = Pathfinder::new(&grid);
        assert!(finder
            .find_path(center(&grid, 3, 0), center(&grid, 0, 0), &cancel)
            .is_ok());
        assert!(matches!(
            finder.find_path(center(&grid, 0, 0), center(&grid, 3, 0), &cancel),
            Err(PathError::NoRoute { .. })
        ));
    }

    #[test]
    fn cancelled_search_stops() {
        let grid = grid(".....\n.....\n");
        let cancel = AtomicBool::new(true);
        assert_eq!(
            Pathfinder::new(&grid).find_path(center(&grid, 0, 0), center(&grid, 4, 1), &cancel),
            Err(PathError::Cancelled)
        );
    }

    #[test]
    fn same_node_returns_single_waypoint() {
        let grid = grid("...\n");
        let cancel = AtomicBool::new(false);
        let path = Pathfinder::new(&grid)
            .find_path(center(&grid, 1, 0), center(&grid, 1, 0) + Vector3::new(10.0, 0.0, 0.0), &cancel)
            .unwrap();
        assert_eq!(path, vec![center(&grid, 1, 0)]);
    }

    #[test]
    fn penalties_steer_the_route() {
        // Mud row in the middle is cheaper to walk around.
        let map = TerrainMap::parse_ascii("mud", ".....\n.~~~.\n.....\n", 100.0, 10.0).unwrap();
        let settings = GridSettings {
            resolution_mode: ResolutionMode::ByNodeCount,
            grid_size_x: 5,
            grid_size_y: 3,
            node_radius: 50.0,
            blur_size: 0,
            walkable_regions: vec![crate::pathfinding::terrain::TerrainType {
                layer: crate::pathfinding::terrain::TerrainLayer::Mud,
                penalty: 200,
            }],
            ..GridSettings::default()
        };
        let grid = NavGrid::build(settings, &map);
        let cancel = AtomicBool::new(false);
        let path = Pathfinder::new(&grid)
            .find_path(center(&grid, 2, 0), center(&grid, 2, 2), &cancel)
            .unwrap();
        for point in &path {
            let coord = grid.node_from_world_point(point);
            assert_ne!(grid.node(coord).unwrap().movement_penalty, 200);
        }
    }
}
