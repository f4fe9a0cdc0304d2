//! Grid navigation: terrain probing, grid construction, A* search and path smoothing.

pub mod astar;
pub mod grid;
pub mod heap;
pub mod line;
pub mod node;
pub mod path;
pub mod terrain;

pub use astar::{grid_distance, PathError, Pathfinder};
pub use grid::{GridSettings, NavGrid, ResolutionMode};
pub use node::{GridCoord, NavEdge, NavNode};
pub use path::{simplify_path, PathScript};
pub use terrain::{FlatSurface, Surface, TerrainMap};
