use std::fmt;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Entries kept in the event log after cleanup.
pub const EVENT_LOG_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    RunnerSpawned { id: u32 },
    RunnerCaught { id: u32 },
    TimeAdded { seconds: f32, remaining: f32 },
    TaggerChanged { id: Option<u32> },
    PickupCollected { id: u32, bonus: f32 },
    PathFailed { id: u32, reason: String },
    GameOver { caught: u32, run_time: f32 },
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::RunnerSpawned { id } => write!(f, "runner {} joined the chase", id),
            GameEvent::RunnerCaught { id } => write!(f, "runner {} was caught", id),
            GameEvent::TimeAdded { seconds, remaining } => {
                write!(f, "+{:.0}s (now {:.0}s left)", seconds, remaining)
            }
            GameEvent::TaggerChanged { id: Some(id) } => write!(f, "entity {} is now the tagger", id),
            GameEvent::TaggerChanged { id: None } => write!(f, "nobody is the tagger"),
            GameEvent::PickupCollected { id, bonus } => {
                write!(f, "pickup {} collected (+{:.0}s)", id, bonus)
            }
            GameEvent::PathFailed { id, reason } => write!(f, "runner {} found no path: {}", id, reason),
            GameEvent::GameOver { caught, run_time } => {
                write!(f, "time's up: {} caught in {:.0}s", caught, run_time)
            }
        }
    }
}

#[derive(Resource, Default, Debug)]
pub struct GameEventLog {
    entries: Vec<(u64, GameEvent)>,
}

impl GameEventLog {
    pub fn push(&mut self, tick: u64, event: GameEvent) {
        self.entries.push((tick, event));
    }

    pub fn entries(&self) -> &[(u64, GameEvent)] {
        &self.entries
    }

    pub fn recent(&self, count: usize) -> &[(u64, GameEvent)] {
        let start = self.entries.len().saturating_sub(count);
        &self.entries[start..]
    }

    pub fn trim(&mut self, keep: usize) {
        if self.entries.len() > keep {
            let excess = self.entries.len() - keep;
            self.entries.drain(..excess);
        }
    }
}

/// Round state: countdown, catches and the current tagger.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagGameState {
    pub current_tagger: Option<u32>,
    pub runners_caught: u32,
    pub time_remaining: f32,
    pub run_time: f32,
    pub game_over: bool,
    #[serde(default)]
    second_accumulator: f32,
}

impl Default for TagGameState {
    fn default() -> Self {
        Self::new(60.0)
    }
}

impl TagGameState {
    pub fn new(round_seconds: f32) -> Self {
        Self {
            current_tagger: None,
            runners_caught: 0,
            time_remaining: round_seconds,
            run_time: 0.0,
            game_over: false,
            second_accumulator: 0.0,
        }
    }

    pub fn is_tagger(&self, id: u32) -> bool {
        self.current_tagger == Some(id)
    }

    /// Returns true when the tagger actually changed.
    pub fn set_tagger(&mut self, id: Option<u32>) -> bool {
        if self.current_tagger == id {
            return false;
        }
        self.current_tagger = id;
        true
    }

    /// Extend the countdown. Has no effect once the round is over.
    pub fn add_extra_time(&mut self, seconds: f32) -> f32 {
        if !self.game_over {
            self.time_remaining += seconds;
            info!(seconds, remaining = self.time_remaining, "extra time added");
        }
        self.time_remaining
    }

    /// Tick the countdown in whole seconds. Returns true on the tick the round ends.
    pub fn advance_countdown(&mut self, delta: f32) -> bool {
        if self.game_over {
            return false;
        }
        self.second_accumulator += delta.max(0.0);
        while self.second_accumulator >= 1.0 {
            self.second_accumulator -= 1.0;
            self.time_remaining -= 1.0;
            self.run_time += 1.0;
            if self.time_remaining <= 0.0 {
                self.game_over = true;
                return true;
            }
        }
        false
    }
}
