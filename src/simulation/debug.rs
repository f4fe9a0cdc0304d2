use std::fmt::Write;

use nalgebra::Vector3;
use tracing::warn;

use crate::data::config::DebugSettings;
use crate::pathfinding::grid::NavGrid;
use crate::pathfinding::node::GridCoord;

/// Split a global agent budget across grids; the first grids absorb the remainder.
pub fn distribute_agent_count(total: u32, grids: &mut [NavGrid]) {
    if grids.is_empty() {
        warn!("no grids to distribute agents across");
        return;
    }
    let count = grids.len() as u32;
    let base = total / count;
    let remainder = total % count;
    for (index, grid) in grids.iter_mut().enumerate() {
        let extra = u32::from((index as u32) < remainder);
        grid.set_agent_count(base + extra);
    }
}

/// World-space markers drawn on top of the grid.
#[derive(Debug, Clone, Default)]
pub struct DebugOverlay {
    pub player: Option<Vector3<f32>>,
    pub runners: Vec<Vector3<f32>>,
    pub path_points: Vec<Vector3<f32>>,
    pub pickups: Vec<Vector3<f32>>,
}

/// Text view of the grid: `.` walkable, `#` blocked, `~` costly, `P` player,
/// `R` runner, `+` pickup and `*` path point.
pub fn render_ascii(grid: &NavGrid, overlay: &DebugOverlay, settings: &DebugSettings) -> String {
    let (size_x, size_y) = grid.size();
    let (penalty_min, penalty_max) = grid.penalty_range();
    let costly = penalty_min + (penalty_max - penalty_min) / 2;
    let shade = settings.show_any && settings.show_nodes && penalty_max > penalty_min;

    let mut cells: Vec<char> = grid
        .all_nodes()
        .iter()
        .map(|node| {
            if !node.walkable {
                '#'
            } else if shade && node.movement_penalty > costly {
                '~'
            } else {
                '.'
            }
        })
        .collect();

    let mut mark = |point: &Vector3<f32>, glyph: char| {
        let GridCoord { x, y } = grid.node_from_world_point(point);
        cells[y * size_x + x] = glyph;
    };
    if settings.show_any && settings.show_paths {
        for point in &overlay.path_points {
            mark(point, '*');
        }
    }
    for point in &overlay.pickups {
        mark(point, '+');
    }
    for point in &overlay.runners {
        mark(point, 'R');
    }
    if let Some(player) = &overlay.player {
        mark(player, 'P');
    }

    let mut out = String::with_capacity((size_x + 1) * size_y + 64);
    for row in cells.chunks(size_x) {
        out.extend(row.iter());
        out.push('\n');
    }
    if settings.show_any && settings.show_edges {
        let counts = grid.edge_counts();
        let _ = writeln!(
            out,
            "edges: {} walkable, {} one-way, {} blocked",
            counts.walkable, counts.one_way, counts.blocked
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::grid::{GridSettings, ResolutionMode};
    use crate::pathfinding::terrain::{FlatSurface, TerrainMap};

    fn grid_from(layout: &str) -> NavGrid {
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
    fn distributes_remainder_to_first_grids() {
        let flat = FlatSurface { z: 0.0 };
        let mut grids: Vec<NavGrid> = (0..3)
            .map(|_| NavGrid::build(GridSettings::default(), &flat))
            .collect();
        distribute_agent_count(10, &mut grids);
        let counts: Vec<u32> = grids.iter().map(NavGrid::agent_count).collect();
        assert_eq!(counts, vec![4, 3, 3]);
        distribute_agent_count(10, &mut []);
    }

    #[test]
    fn renders_markers_over_nodes() {
        let grid = grid_from("...\n.#.\n..^\n");
        let overlay = DebugOverlay {
            player: grid.node_at(0, 0).map(|n| n.world_position),
            runners: vec![grid.node_at(2, 0).unwrap().world_position],
            path_points: vec![grid.node_at(1, 0).unwrap().world_position],
            pickups: Vec::new(),
        };
        let quiet = render_ascii(&grid, &overlay, &DebugSettings::default());
        assert_eq!(quiet, "P.R\n.#.\n...\n");

        let verbose = DebugSettings {
            show_any: true,
            show_nodes: true,
            show_edges: true,
            show_paths: true,
        };
        let text = render_ascii(&grid, &overlay, &verbose);
        assert!(text.starts_with("P*R\n"));
        assert!(text.contains("one-way"));
    }
}
