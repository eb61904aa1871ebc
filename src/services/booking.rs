use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDateTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Action, Appointment, AppointmentRequest, AppointmentState, AppointmentUpdate, WaitlistEntry,
    DEFAULT_PRIORITY,
};
use crate::services::notifications::Notification;
use crate::services::reassignment::{self, FreedSlot};
use crate::state::AppState;

/// Half-open interval `[start, end)` on a barber's timeline, already widened
/// by the configured buffer on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddedInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl PaddedInterval {
    /// `None` when the padded bounds fall outside the representable range.
    pub fn new(
        scheduled_at: NaiveDateTime,
        duration_minutes: i32,
        buffer_minutes: i32,
    ) -> Option<Self> {
        let buffer = Duration::minutes(buffer_minutes as i64);
        let end = scheduled_at
            .checked_add_signed(Duration::minutes(duration_minutes as i64))?
            .checked_add_signed(buffer)?;
        Some(Self {
            start: scheduled_at.checked_sub_signed(buffer)?,
            end,
        })
    }

    pub fn of(appt: &Appointment, buffer_minutes: i32) -> Option<Self> {
        Self::new(appt.scheduled_at, appt.duration_minutes, buffer_minutes)
    }

    pub fn overlaps(&self, other: &PaddedInterval) -> bool {
        self.start < other.end && self.end > other.start
    }
}

const MAX_YEAR: i32 = 9999;

pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

fn required_future(
    value: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Result<NaiveDateTime, AppError> {
    let scheduled_at =
        value.ok_or_else(|| AppError::Validation("scheduled_at is required".to_string()))?;
    if scheduled_at <= now {
        return Err(AppError::Validation(
            "scheduled_at must be in the future".to_string(),
        ));
    }
    // SQLite date functions stop at year 9999.
    if scheduled_at.year() > MAX_YEAR {
        return Err(AppError::Validation(format!(
            "scheduled_at must be before year {}",
            MAX_YEAR + 1
        )));
    }
    Ok(scheduled_at)
}

/// The barber lock taken before reloading must still cover the appointment.
fn ensure_same_barber(appt: &Appointment, locked_barber: &str) -> Result<(), AppError> {
    if appt.barber_id != locked_barber {
        return Err(AppError::Concurrency(format!(
            "appointment {} moved to another barber",
            appt.id
        )));
    }
    Ok(())
}

fn load(conn: &Connection, id: &str) -> Result<Appointment, AppError> {
    queries::get_appointment(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))
}

/// Applies `action` and writes the result back under the optimistic version
/// check. Leaves `appt` in its new state on success.
pub(crate) fn persist_transition(
    conn: &Connection,
    appt: &mut Appointment,
    action: Action,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let from = appt.state;
    appt.apply(action)
        .map_err(|e| AppError::InvalidState(e.to_string()))?;
    appt.updated_at = now;

    if !queries::update_appointment(conn, appt)? {
        return Err(AppError::Concurrency(format!(
            "appointment {} was modified concurrently",
            appt.id
        )));
    }

    tracing::info!(
        appointment_id = %appt.id,
        barber_id = %appt.barber_id,
        from = %from,
        to = %appt.state,
        "appointment state changed"
    );
    Ok(())
}

// ── Booking ──

pub async fn create_appointment(
    state: &Arc<AppState>,
    req: AppointmentRequest,
) -> Result<Appointment, AppError> {
    create_appointment_at(state, req, now()).await
}

pub async fn create_appointment_at(
    state: &Arc<AppState>,
    req: AppointmentRequest,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    let client_id = required(req.client_id, "client_id")?;
    let barber_id = required(req.barber_id, "barber_id")?;
    let service_id = required(req.service_id, "service_id")?;
    let scheduled_at = required_future(req.scheduled_at, now)?;

    let min_duration = state.config.min_duration_minutes;
    let buffer = state.config.buffer_minutes;
    let duration_minutes = req.duration_minutes.unwrap_or(min_duration);
    let requested = PaddedInterval::new(scheduled_at, duration_minutes, buffer)
        .ok_or_else(|| AppError::Validation("appointment ends out of range".to_string()))?;

    let _timeline = state.barber_locks.lock(&barber_id).await;

    let appt = {
        let mut conn = state.conn();
        let tx = conn.transaction()?;

        if queries::has_upcoming_appointment(&tx, &client_id, &barber_id, &now)? {
            return Err(AppError::Validation(format!(
                "duplicate booking: client {client_id} already has an upcoming appointment with barber {barber_id}"
            )));
        }

        if queries::waitlist_entry_exists(&tx, &client_id, &barber_id)? {
            return Err(AppError::Waitlist(format!(
                "client {client_id} is already on the waitlist for barber {barber_id}"
            )));
        }

        if duration_minutes < min_duration {
            return Err(AppError::Validation(format!(
                "duration must be at least {min_duration} minutes"
            )));
        }

        let candidates = queries::list_appointments_overlapping(
            &tx,
            &barber_id,
            &requested.start,
            &requested.end,
            buffer,
        )?;

        let clash = candidates
            .iter()
            .filter(|a| a.state.occupies_slot())
            .find(|a| match PaddedInterval::of(a, buffer) {
                Some(existing) => requested.overlaps(&existing),
                None => true,
            });

        if let Some(existing) = clash {
            let entry = WaitlistEntry {
                id: uuid::Uuid::new_v4().to_string(),
                client_id: client_id.clone(),
                barber_id: barber_id.clone(),
                service_id,
                requested_at: now,
                priority: DEFAULT_PRIORITY,
            };
            queries::create_waitlist_entry(&tx, &entry)?;
            tx.commit()?;

            tracing::info!(
                client_id = %client_id,
                barber_id = %barber_id,
                clashes_with = %existing.id,
                waitlist_id = %entry.id,
                "slot taken, client queued on waitlist"
            );
            return Err(AppError::Conflict(format!(
                "the requested slot overlaps an existing appointment; client {client_id} was added to the waitlist for barber {barber_id}"
            )));
        }

        let appt = Appointment {
            id: uuid::Uuid::new_v4().to_string(),
            client_id,
            barber_id,
            service_id,
            scheduled_at,
            duration_minutes,
            state: AppointmentState::Pending,
            notes: req.notes,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        queries::create_appointment(&tx, &appt)?;
        tx.commit()?;
        appt
    };

    tracing::info!(
        appointment_id = %appt.id,
        client_id = %appt.client_id,
        barber_id = %appt.barber_id,
        scheduled_at = %appt.scheduled_at,
        "appointment booked"
    );
    state
        .notifications
        .dispatch(Notification::booking_created(&appt));

    Ok(appt)
}

/// Replaces the scheduling fields of an appointment. Neither the current
/// state nor the barber's timeline is checked here.
pub async fn update_appointment(
    state: &Arc<AppState>,
    id: &str,
    patch: AppointmentUpdate,
) -> Result<Appointment, AppError> {
    update_appointment_at(state, id, patch, now()).await
}

pub async fn update_appointment_at(
    state: &Arc<AppState>,
    id: &str,
    patch: AppointmentUpdate,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    let client_id = required(patch.client_id, "client_id")?;
    let barber_id = required(patch.barber_id, "barber_id")?;
    let service_id = required(patch.service_id, "service_id")?;
    let scheduled_at = required_future(patch.scheduled_at, now)?;

    let current_barber = load(&*state.conn(), id)?.barber_id;
    let _timeline = state.barber_locks.lock(&current_barber).await;

    let mut conn = state.conn();
    let tx = conn.transaction()?;
    let mut appt = load(&tx, id)?;
    ensure_same_barber(&appt, &current_barber)?;

    appt.client_id = client_id;
    appt.barber_id = barber_id;
    appt.service_id = service_id;
    appt.scheduled_at = scheduled_at;
    appt.notes = patch.notes;
    appt.updated_at = now;

    if !queries::update_appointment(&tx, &mut appt)? {
        return Err(AppError::Concurrency(format!(
            "appointment {id} was modified concurrently"
        )));
    }
    tx.commit()?;

    tracing::info!(appointment_id = %appt.id, "appointment updated");
    Ok(appt)
}

// ── Lookups ──

pub fn get_appointment(state: &Arc<AppState>, id: &str) -> Result<Appointment, AppError> {
    load(&*state.conn(), id)
}

pub fn list_appointments(state: &Arc<AppState>) -> Result<Vec<Appointment>, AppError> {
    Ok(queries::list_appointments(&*state.conn())?)
}

pub fn list_by_client(state: &Arc<AppState>, client_id: &str) -> Result<Vec<Appointment>, AppError> {
    Ok(queries::list_appointments_for_client(&*state.conn(), client_id)?)
}

pub fn list_by_barber(state: &Arc<AppState>, barber_id: &str) -> Result<Vec<Appointment>, AppError> {
    Ok(queries::list_appointments_for_barber(&*state.conn(), barber_id)?)
}

pub fn list_waitlist(
    state: &Arc<AppState>,
    barber_id: &str,
) -> Result<Vec<WaitlistEntry>, AppError> {
    Ok(queries::list_waitlist_for_barber(&*state.conn(), barber_id)?)
}

// ── State changes ──

pub async fn confirm(state: &Arc<AppState>, id: &str) -> Result<Appointment, AppError> {
    confirm_at(state, id, now()).await
}

pub async fn confirm_at(
    state: &Arc<AppState>,
    id: &str,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    change_state(state, id, Action::Confirm, now).await
}

pub async fn start(state: &Arc<AppState>, id: &str) -> Result<Appointment, AppError> {
    change_state(state, id, Action::Start, now()).await
}

pub async fn finish(state: &Arc<AppState>, id: &str) -> Result<Appointment, AppError> {
    change_state(state, id, Action::Finish, now()).await
}

pub async fn mark_no_show(state: &Arc<AppState>, id: &str) -> Result<Appointment, AppError> {
    change_state(state, id, Action::MarkNoShow, now()).await
}

pub async fn cancel(state: &Arc<AppState>, id: &str) -> Result<Appointment, AppError> {
    cancel_at(state, id, now()).await
}

pub async fn cancel_at(
    state: &Arc<AppState>,
    id: &str,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    change_state(state, id, Action::Cancel, now).await
}

fn check_confirmable(
    appt: &Appointment,
    now: NaiveDateTime,
    lead_hours: i64,
) -> Result<(), AppError> {
    if appt.state == AppointmentState::Confirmed {
        return Err(AppError::InvalidState(
            "appointment is already confirmed".to_string(),
        ));
    }
    if appt.state.is_terminal() {
        return Err(AppError::InvalidState(format!(
            "cannot confirm an appointment that is {}",
            appt.state
        )));
    }
    if appt.scheduled_at - Duration::hours(lead_hours) < now {
        return Err(AppError::InvalidState(format!(
            "appointments must be confirmed at least {lead_hours} hours ahead"
        )));
    }
    Ok(())
}

async fn change_state(
    state: &Arc<AppState>,
    id: &str,
    action: Action,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    let barber_id = load(&*state.conn(), id)?.barber_id;
    let _timeline = state.barber_locks.lock(&barber_id).await;

    let (appt, reassigned) = {
        let mut conn = state.conn();
        let tx = conn.transaction()?;
        let mut appt = load(&tx, id)?;
        ensure_same_barber(&appt, &barber_id)?;

        if action == Action::Confirm {
            check_confirmable(&appt, now, state.config.confirm_lead_hours)?;
        }

        persist_transition(&tx, &mut appt, action, now)?;

        let reassigned = if action == Action::Cancel {
            reassignment::reassign_freed_slot(&tx, &FreedSlot::from(&appt), now)?
        } else {
            None
        };

        tx.commit()?;
        (appt, reassigned)
    };

    if let Some(new_appt) = reassigned {
        state
            .notifications
            .dispatch(Notification::reassigned(&new_appt));
    }

    Ok(appt)
}
