use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ledges rise this many height steps above the base floor.
pub const LEDGE_STEPS: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainLayer {
    Ground,
    Grass,
    Road,
    Mud,
}

pub fn terrain_layer_to_str(layer: TerrainLayer) -> &'static str {
    match layer {
        TerrainLayer::Ground => "ground",
        TerrainLayer::Grass => "grass",
        TerrainLayer::Road => "road",
        TerrainLayer::Mud => "mud",
    }
}

pub fn terrain_layer_from_str(value: &str) -> Option<TerrainLayer> {
    match value {
        "ground" => Some(TerrainLayer::Ground),
        "grass" => Some(TerrainLayer::Grass),
        "road" => Some(TerrainLayer::Road),
        "mud" => Some(TerrainLayer::Mud),
        _ => None,
    }
}

/// Movement penalty applied to nodes resting on a given layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainType {
    pub layer: TerrainLayer,
    pub penalty: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    pub floor_z: f32,
    pub walkable: bool,
    pub layer: TerrainLayer,
}

/// Anything the grid can probe straight down into.
pub trait Surface: Send + Sync {
    /// `None` means the probe hit nothing at this XY.
    fn probe(&self, x: f32, y: f32) -> Option<SurfaceHit>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlatSurface {
    pub z: f32,
}

impl Surface for FlatSurface {
    fn probe(&self, _x: f32, _y: f32) -> Option<SurfaceHit> {
        Some(SurfaceHit {
            floor_z: self.z,
            walkable: true,
            layer: TerrainLayer::Ground,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainCell {
    pub height: f32,
    pub layer: TerrainLayer,
    #[serde(default)]
    pub blocked: bool,
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("map layout is empty")]
    Empty,
    #[error("line {line} has {found} cells, expected {expected}")]
    Ragged {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown glyph '{glyph}' at line {line}, column {column}")]
    UnknownGlyph {
        glyph: char,
        line: usize,
        column: usize,
    },
    #[error("cell count {found} does not match {width}x{height}")]
    CellCount {
        width: usize,
        height: usize,
        found: usize,
    },
    #[error("cell size must be positive, got {0}")]
    CellSize(f32),
}

/// Rectangular height/layer map centred on `origin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainMap {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub cell_size: f32,
    #[serde(default)]
    pub origin: [f32; 2],
    pub cells: Vec<TerrainCell>,
}

impl TerrainMap {
    /// Parse a text layout. Row 0 is grid row 0.
    ///
    /// `.` ground, `,` grass, `=` road, `~` mud, `#` blocked, `^` ledge and
    /// `1`..`9` ground raised by that many `step_height`s.
    pub fn parse_ascii(
        name: &str,
        text: &str,
        cell_size: f32,
        step_height: f32,
    ) -> Result<Self, MapError> {
        if cell_size <= 0.0 {
            return Err(MapError::CellSize(cell_size));
        }
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .collect();
        let Some(first) = rows.first() else {
            return Err(MapError::Empty);
        };
        let width = first.chars().count();
        let mut cells = Vec::with_capacity(width * rows.len());

        for (line, row) in rows.iter().enumerate() {
            let found = row.chars().count();
            if found != width {
                return Err(MapError::Ragged {
                    line: line + 1,
                    expected: width,
                    found,
                });
            }
            for (column, glyph) in row.chars().enumerate() {
                let cell = cell_from_glyph(glyph, step_height).ok_or(MapError::UnknownGlyph {
                    glyph,
                    line: line + 1,
                    column: column + 1,
                })?;
                cells.push(cell);
            }
        }

        Ok(Self {
            name: name.to_string(),
            width,
            height: rows.len(),
            cell_size,
            origin: [0.0, 0.0],
            cells,
        })
    }

    pub fn validate(&self) -> Result<(), MapError> {
        if self.cell_size <= 0.0 {
            return Err(MapError::CellSize(self.cell_size));
        }
        if self.width == 0 || self.height == 0 {
            return Err(MapError::Empty);
        }
        if self.cells.len() != self.width * self.height {
            return Err(MapError::CellCount {
                width: self.width,
                height: self.height,
                found: self.cells.len(),
            });
        }
        Ok(())
    }

    /// World extents covered by the map.
    pub fn extent(&self) -> [f32; 2] {
        [
            self.width as f32 * self.cell_size,
            self.height as f32 * self.cell_size,
        ]
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&TerrainCell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(y * self.width + x)
    }

    fn cell_at_world(&self, x: f32, y: f32) -> Option<&TerrainCell> {
        let [extent_x, extent_y] = self.extent();
        let local_x = x - (self.origin[0] - extent_x / 2.0);
        let local_y = y - (self.origin[1] - extent_y / 2.0);
        if local_x < 0.0 || local_y < 0.0 {
            return None;
        }
        let cx = (local_x / self.cell_size).floor() as usize;
        let cy = (local_y / self.cell_size).floor() as usize;
        self.cell(cx, cy)
    }
}

impl Surface for TerrainMap {
    fn probe(&self, x: f32, y: f32) -> Option<SurfaceHit> {
        let cell = self.cell_at_world(x, y)?;
        Some(SurfaceHit {
            floor_z: cell.height,
            walkable: !cell.blocked,
            layer: cell.layer,
        })
    }
}

fn cell_from_glyph(glyph: char, step_height: f32) -> Option<TerrainCell> {
    let ground = |height: f32| TerrainCell {
        height,
        layer: TerrainLayer::Ground,
        blocked: false,
    };
    let cell = match glyph {
        '.' => ground(0.0),
        ',' => TerrainCell {
            layer: TerrainLayer::Grass,
            ..ground(0.0)
        },
        '=' => TerrainCell {
            layer: TerrainLayer::Road,
            ..ground(0.0)
        },
        '~' => TerrainCell {
            layer: TerrainLayer::Mud,
            ..ground(0.0)
        },
        '#' => TerrainCell {
            blocked: true,
            ..ground(step_height * LEDGE_STEPS)
        },
        '^' => ground(step_height * LEDGE_STEPS),
        '1'..='9' => {
            let steps = glyph.to_digit(10)? as f32;
            ground(step_height * steps)
        }
        _ => return None,
    };
    Some(cell)
}
