pub mod matches;
pub mod memory;
pub mod pool;
pub mod puzzles;
pub mod store;

pub use store::{MatchStore, PuzzleStore};
