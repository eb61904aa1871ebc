use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentState};

pub const REASSIGNED_NOTE: &str = "Reassigned from waitlist";

/// A slot that just stopped being occupied (cancellation or no-show).
#[derive(Debug, Clone)]
pub struct FreedSlot {
    pub barber_id: String,
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: i32,
}

impl From<&Appointment> for FreedSlot {
    fn from(appt: &Appointment) -> Self {
        Self {
            barber_id: appt.barber_id.clone(),
            scheduled_at: appt.scheduled_at,
            duration_minutes: appt.duration_minutes,
        }
    }
}

/// Hands `slot` to the oldest waitlist entry for its barber, if any.
///
/// Must run on the same transaction as the state change that freed the slot,
/// with the barber's timeline lock held. The consumed entry is deleted in that
/// transaction; if it is already gone the whole transaction is abandoned.
pub fn reassign_freed_slot(
    conn: &Connection,
    slot: &FreedSlot,
    now: NaiveDateTime,
) -> Result<Option<Appointment>, AppError> {
    let Some(entry) = queries::oldest_waitlist_entry_for_barber(conn, &slot.barber_id)? else {
        tracing::debug!(barber_id = %slot.barber_id, "no waitlist entries, slot stays free");
        return Ok(None);
    };

    let appt = Appointment {
        id: uuid::Uuid::new_v4().to_string(),
        client_id: entry.client_id.clone(),
        barber_id: entry.barber_id.clone(),
        service_id: entry.service_id.clone(),
        scheduled_at: slot.scheduled_at,
        duration_minutes: slot.duration_minutes,
        state: AppointmentState::Pending,
        notes: Some(REASSIGNED_NOTE.to_string()),
        created_at: now,
        updated_at: now,
        version: 0,
    };
    queries::create_appointment(conn, &appt)?;

    if !queries::delete_waitlist_entry(conn, &entry.id)? {
        return Err(AppError::Concurrency(format!(
            "waitlist entry {} was already consumed",
            entry.id
        )));
    }

    tracing::info!(
        appointment_id = %appt.id,
        client_id = %appt.client_id,
        barber_id = %appt.barber_id,
        waitlist_id = %entry.id,
        scheduled_at = %appt.scheduled_at,
        "slot reassigned from waitlist"
    );
    Ok(Some(appt))
}
