use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Global resource tracking the simulation clock.
#[derive(Resource, Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct GameTime {
    pub tick: u64,
    /// Seconds simulated so far.
    pub elapsed: f32,
    /// Length of the tick being simulated.
    #[serde(skip)]
    pub delta: f32,
}

impl GameTime {
    pub fn to_string(&self) -> String {
        let total = self.elapsed.max(0.0) as u64;
        format!("Tick {}, {:02}:{:02}", self.tick, total / 60, total % 60)
    }

    pub fn begin_tick(&mut self, delta: f32) {
        self.delta = delta.max(0.0);
    }

    pub fn advance(&mut self) {
        self.tick += 1;
        self.elapsed += self.delta;
    }
}

/// System: Advances the clock by the current tick length.
pub fn advance_time_system(mut time: ResMut<GameTime>) {
    time.advance();
}
