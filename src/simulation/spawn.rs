use bevy_ecs::prelude::*;
use tracing::{info, warn};

pub const MIN_SPAWN_INTERVAL: f32 = 0.01;

/// Interval-driven pickup spawner.
#[derive(Resource, Debug, Clone, Default)]
pub struct SpawnManager {
    active: bool,
    interval: f32,
    max_concurrent: u32,
    spawn_per_tick: u32,
    timer: f32,
}

impl SpawnManager {
    pub fn start(&mut self, interval: f32, max_concurrent: u32, spawn_per_tick: u32) {
        self.interval = interval.max(MIN_SPAWN_INTERVAL);
        self.max_concurrent = max_concurrent;
        self.spawn_per_tick = spawn_per_tick;
        self.timer = 0.0;
        self.active = true;
        info!(
            interval = self.interval,
            max_concurrent, spawn_per_tick, "spawning started"
        );
    }

    pub fn stop(&mut self) {
        if self.active {
            info!("spawning stopped");
        }
        self.active = false;
        self.timer = 0.0;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// Advance the timer and return how many pickups to spawn this tick.
    pub fn tick(&mut self, delta: f32, current: u32, grid_valid: bool) -> u32 {
        if !self.active {
            return 0;
        }
        self.timer += delta.max(0.0);
        if self.timer < self.interval {
            return 0;
        }
        self.timer -= self.interval;
        if !grid_valid {
            warn!("no usable grid, skipping spawn");
            return 0;
        }
        self.spawn_per_tick
            .min(self.max_concurrent.saturating_sub(current))
    }
}

/// Runners waiting to be spawned, e.g. replacements for caught ones.
#[derive(Resource, Debug, Default)]
pub struct SpawnQueue {
    pub runners: u32,
}
