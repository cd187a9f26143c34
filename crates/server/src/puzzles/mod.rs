pub mod model;
pub mod session;

pub use session::PuzzleController;
