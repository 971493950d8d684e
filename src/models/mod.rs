pub mod booking;
pub mod identity;
pub mod profile;
pub mod status;
