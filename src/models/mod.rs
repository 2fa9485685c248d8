pub mod actor;
pub mod assignment;
pub mod booking;
pub mod driver;
pub mod event;
pub mod hub;
