pub mod appointment;
pub mod availability;
pub mod request;
pub mod waitlist;

pub use appointment::{Action, Appointment, AppointmentState, TransitionError};
pub use availability::{BarberAvailability, DayAvailability, WorkingHours};
pub use request::{AppointmentRequest, AppointmentUpdate};
pub use waitlist::{WaitlistEntry, DEFAULT_PRIORITY};
