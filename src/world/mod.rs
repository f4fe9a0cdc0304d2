pub mod repository;
pub mod sqlite;

pub use repository::WorldRepository;
pub use sqlite::{SessionRecord, SessionResult, StoredLayout, WorldDb, WorldDbError};
