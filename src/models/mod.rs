pub mod document;
pub mod driver;
pub mod event;
pub mod location;
