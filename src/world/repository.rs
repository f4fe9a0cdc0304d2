use crate::pathfinding::grid::GridSettings;
use crate::world::sqlite::{SessionRecord, SessionResult, StoredLayout, WorldDb};

pub trait WorldRepository {
    fn save_layout(
        &mut self,
        name: &str,
        settings: &GridSettings,
        layout: &str,
        tick: u64,
    ) -> Result<(), Box<dyn std::error::Error>>;
    fn load_layout(&self, name: &str) -> Result<Option<StoredLayout>, Box<dyn std::error::Error>>;
    fn list_layouts(&self) -> Result<Vec<String>, Box<dyn std::error::Error>>;
    fn record_session(&mut self, result: &SessionResult) -> Result<i64, Box<dyn std::error::Error>>;
    fn recent_sessions(&self, limit: usize)
        -> Result<Vec<SessionRecord>, Box<dyn std::error::Error>>;
    fn best_session(&self) -> Result<Option<SessionRecord>, Box<dyn std::error::Error>>;
}

impl WorldRepository for WorldDb {
    fn save_layout(
        &mut self,
        name: &str,
        settings: &GridSettings,
        layout: &str,
        tick: u64,
    ) -> Result<(), Box<dyn std::error::Error>> {
        Ok(WorldDb::save_layout(self, name, settings, layout, tick)?)
    }

    fn load_layout(&self, name: &str) -> Result<Option<StoredLayout>, Box<dyn std::error::Error>> {
        Ok(WorldDb::load_layout(self, name)?)
    }

    fn list_layouts(&self) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        Ok(WorldDb::list_layouts(self)?)
    }

    fn record_session(&mut self, result: &SessionResult) -> Result<i64, Box<dyn std::error::Error>> {
        Ok(WorldDb::record_session(self, result)?)
    }

    fn recent_sessions(
        &self,
        limit: usize,
    ) -> Result<Vec<SessionRecord>, Box<dyn std::error::Error>> {
        Ok(WorldDb::recent_sessions(self, limit)?)
    }

    fn best_session(&self) -> Result<Option<SessionRecord>, Box<dyn std::error::Error>> {
        Ok(WorldDb::best_session(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_twice(repo: &mut dyn WorldRepository) -> Vec<SessionRecord> {
        let result = SessionResult {
            seed: 1,
            runners_caught: 2,
            run_time: 30.0,
            time_remaining: 0.0,
            finished_tick: 300,
        };
        repo.record_session(&result).unwrap();
        repo.record_session(&result).unwrap();
        repo.recent_sessions(5).unwrap()
    }

    #[test]
    fn sqlite_backs_the_repository() {
        let mut db = WorldDb::open_in_memory().unwrap();
        assert_eq!(record_twice(&mut db).len(), 2);
        assert!(WorldRepository::list_layouts(&db).unwrap().is_empty());
    }
}
