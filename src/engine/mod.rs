pub mod events;
pub mod lifecycle;
pub mod retention;
pub mod statistics;
pub mod tracker;
