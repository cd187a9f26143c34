pub mod draw;
pub mod events;
pub mod lifecycle;
pub mod model;

pub use lifecycle::MatchController;
