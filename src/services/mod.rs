pub mod availability;
pub mod booking;
pub mod locks;
pub mod notifications;
pub mod reassignment;
pub mod sweeper;
