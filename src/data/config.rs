use std::fs;
use std::path::Path;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pathfinding::grid::GridSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
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
    #[error("{0}")]
    Validation(String),
}

/// Full game configuration. Every field falls back to a playable default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub runner: RunnerSettings,
    #[serde(default)]
    pub tag: TagSettings,
    #[serde(default)]
    pub navigation: NavigationSettings,
    #[serde(default)]
    pub spawn: SpawnSettings,
    #[serde(default)]
    pub debug: DebugSettings,
}

fn default_seed() -> u64 {
    2026
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            grid: GridSettings::default(),
            runner: RunnerSettings::default(),
            tag: TagSettings::default(),
            navigation: NavigationSettings::default(),
            spawn: SpawnSettings::default(),
            debug: DebugSettings::default(),
        }
    }
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub speed: f32,
    pub turn_speed: f32,
    pub turn_distance: f32,
    pub stopping_distance: f32,
    pub path_update_threshold: f32,
    pub path_request_cooldown: f32,
    pub waypoint_reach_distance: f32,
    pub kill_z: f32,
    pub min_target_distance_from_player: f32,
    /// Runners prefer targets at least this safe on the danger map. 0 disables it.
    pub min_target_safety: f32,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            speed: 600.0,
            turn_speed: 3.0,
            turn_distance: 5.0,
            stopping_distance: 10.0,
            path_update_threshold: 0.5,
            path_request_cooldown: 0.2,
            waypoint_reach_distance: 40.0,
            kill_z: -1000.0,
            min_target_distance_from_player: 100.0,
            min_target_safety: 0.5,
        }
    }
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagSettings {
    pub round_seconds: f32,
    pub catch_bonus_seconds: f32,
    pub catch_radius: f32,
    pub catch_grace_seconds: f32,
}

impl Default for TagSettings {
    fn default() -> Self {
        Self {
            round_seconds: 60.0,
            catch_bonus_seconds: 10.0,
            catch_radius: 100.0,
            catch_grace_seconds: 1.0,
        }
    }
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSettings {
    /// 0 runs every search inline on the simulation thread.
    pub worker_threads: usize,
    pub runners_always_active: u32,
    pub danger_refresh_seconds: f32,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            runners_always_active: 12,
            danger_refresh_seconds: 1.0,
        }
    }
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnSettings {
    pub enabled: bool,
    pub interval_seconds: f32,
    pub max_concurrent: u32,
    pub spawn_per_tick: u32,
    pub bonus_seconds: f32,
    pub pickup_radius: f32,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 5.0,
            max_concurrent: 5,
            spawn_per_tick: 1,
            bonus_seconds: 5.0,
            pickup_radius: 80.0,
        }
    }
}

#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    pub show_any: bool,
    pub show_nodes: bool,
    pub show_edges: bool,
    pub show_paths: bool,
}

pub fn load_config(path: impl AsRef<Path>) -> Result<GameConfig, ConfigError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: GameConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: path.display().to_string(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("runner.speed", self.runner.speed),
            ("runner.waypoint_reach_distance", self.runner.waypoint_reach_distance),
            ("tag.round_seconds", self.tag.round_seconds),
            ("tag.catch_radius", self.tag.catch_radius),
            ("navigation.danger_refresh_seconds", self.navigation.danger_refresh_seconds),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        let non_negative = [
            ("runner.turn_speed", self.runner.turn_speed),
            ("runner.path_request_cooldown", self.runner.path_request_cooldown),
            ("tag.catch_bonus_seconds", self.tag.catch_bonus_seconds),
            ("tag.catch_grace_seconds", self.tag.catch_grace_seconds),
            ("spawn.bonus_seconds", self.spawn.bonus_seconds),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(ConfigError::Validation(format!(
                    "{} cannot be negative, got {}",
                    name, value
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.runner.min_target_safety) {
            return Err(ConfigError::Validation(format!(
                "runner.min_target_safety must be within [0, 1], got {}",
                self.runner.min_target_safety
            )));
        }
        if self.navigation.worker_threads > 64 {
            return Err(ConfigError::Validation(format!(
                "navigation.worker_threads is capped at 64, got {}",
                self.navigation.worker_threads
            )));
        }
        Ok(())
    }
}
