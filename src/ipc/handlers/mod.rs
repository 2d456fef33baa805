pub mod board;
pub mod core;
pub mod roll;
pub mod roster;
