use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use thiserror::Error;

use crate::pathfinding::grid::{GridSettings, ResolutionMode, MAX_GRID_SIZE};
use crate::pathfinding::terrain::{MapError, TerrainMap};

pub const DEFAULT_CELL_SIZE: f32 = 100.0;
pub const DEFAULT_STEP_HEIGHT: f32 = 10.0;

const PLAZA_LAYOUT: &str = include_str!("../../assets/maps/plaza.txt");

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid map {path}: {source}")]
    Layout { path: String, source: MapError },
}

/// Load a map from `.json` or from a text layout (any other extension).
pub fn load_terrain_map(path: impl AsRef<Path>) -> Result<TerrainMap, MapLoadError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| MapLoadError::Io {
        path: display.clone(),
        source,
    })?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let map = if is_json {
        let map: TerrainMap = serde_json::from_str(&raw).map_err(|source| MapLoadError::Json {
            path: display.clone(),
            source,
        })?;
        map.validate().map_err(|source| MapLoadError::Layout {
            path: display.clone(),
            source,
        })?;
        map
    } else {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "map".to_string());
        TerrainMap::parse_ascii(&name, &raw, DEFAULT_CELL_SIZE, DEFAULT_STEP_HEIGHT).map_err(
            |source| MapLoadError::Layout {
                path: display.clone(),
                source,
            },
        )?
    };
    Ok(map)
}

/// The built-in plaza layout used when no map is given.
pub fn default_map() -> Result<TerrainMap, MapError> {
    TerrainMap::parse_ascii("plaza", PLAZA_LAYOUT, DEFAULT_CELL_SIZE, DEFAULT_STEP_HEIGHT)
}

pub fn default_layout_text() -> &'static str {
    PLAZA_LAYOUT
}

/// Grid settings with one node per map cell, keeping the tuning from `base`.
pub fn grid_settings_for_map(map: &TerrainMap, base: &GridSettings) -> GridSettings {
    GridSettings {
        resolution_mode: ResolutionMode::ByNodeCount,
        grid_size_x: (map.width as u32).min(MAX_GRID_SIZE),
        grid_size_y: (map.height as u32).min(MAX_GRID_SIZE),
        node_radius: map.cell_size / 2.0,
        origin: Vector3::new(map.origin[0], map.origin[1], base.origin.z),
        ..base.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::grid::NavGrid;
    use std::io::Write;

    #[test]
    fn plaza_layout_builds_a_matching_grid() {
        let map = default_map().unwrap();
        assert_eq!((map.width, map.height), (30, 20));
        let grid = NavGrid::build(grid_settings_for_map(&map, &GridSettings::default()), &map);
        assert_eq!(grid.size(), (30, 20));
        assert!(grid.walkable_count() > 400);
        let center = grid.node_from_world_point(&Vector3::zeros());
        assert!(grid.node(center).unwrap().walkable);
    }

    #[test]
    fn loads_text_and_json_maps() {
        let dir = tempfile::tempdir().unwrap();
        let text_path = dir.path().join("tiny.txt");
        std::fs::write(&text_path, "..\n.#\n").unwrap();
        let map = load_terrain_map(&text_path).unwrap();
        assert_eq!(map.name, "tiny");

        let json_path = dir.path().join("tiny.json");
        let mut file = std::fs::File::create(&json_path).unwrap();
        write!(file, "{}", serde_json::to_string(&map).unwrap()).unwrap();
        let reloaded = load_terrain_map(&json_path).unwrap();
        assert_eq!(reloaded.cells, map.cells);

        let err = load_terrain_map(dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, MapLoadError::Io { .. }));
    }
}
