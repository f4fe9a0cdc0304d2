pub mod config;
pub mod maps;

pub use config::{load_config, ConfigError, GameConfig};
pub use maps::{default_map, grid_settings_for_map, load_terrain_map, MapLoadError};
