pub mod danger;
pub mod debug;
pub mod navigation;
pub mod rng;
pub mod spawn;
pub mod tag;
pub mod time;
