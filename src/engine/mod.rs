pub mod assignment;
pub mod booking;
pub mod journal;
pub mod lifecycle;
pub mod locks;
pub mod scheduler;
pub mod scoring;
pub mod state_machine;
