pub mod booking;
pub mod directory;
pub mod pending;
pub mod session;
