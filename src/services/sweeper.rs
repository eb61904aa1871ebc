use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Action, Appointment, AppointmentState};
use crate::services::booking::{self, persist_transition};
use crate::services::notifications::Notification;
use crate::services::reassignment::{self, FreedSlot};
use crate::state::AppState;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub marked_no_show: usize,
    pub reassigned: usize,
    pub failed: usize,
}

enum Outcome {
    /// Someone else moved the appointment on before we got the lock.
    Skipped,
    NoShow { reassigned: Option<Appointment> },
}

/// Background task: marks overdue confirmed appointments as no-shows and
/// refills their slots from the waitlist.
pub async fn run_sweeper(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config.sweep_interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(every_secs = period.as_secs(), "no-show sweeper started");
    loop {
        interval.tick().await;
        let report = run_sweep_once(&state).await;
        if report.examined > 0 {
            tracing::info!(
                examined = report.examined,
                marked_no_show = report.marked_no_show,
                reassigned = report.reassigned,
                failed = report.failed,
                "sweep finished"
            );
        }
    }
}

pub async fn run_sweep_once(state: &Arc<AppState>) -> SweepReport {
    sweep_at(state, booking::now()).await
}

pub async fn sweep_at(state: &Arc<AppState>, now: NaiveDateTime) -> SweepReport {
    let mut report = SweepReport::default();
    let cutoff = now - chrono::Duration::minutes(state.config.no_show_tolerance_minutes);

    let overdue = match load_overdue(state, &cutoff) {
        Ok(overdue) => overdue,
        Err(e) => {
            tracing::error!(error = %e, "sweep could not load overdue appointments");
            return report;
        }
    };

    for appt in overdue {
        report.examined += 1;
        match sweep_one(state, &appt, cutoff, now).await {
            Ok(Outcome::Skipped) => {
                tracing::debug!(appointment_id = %appt.id, "appointment changed before sweep, skipping");
            }
            Ok(Outcome::NoShow { reassigned }) => {
                report.marked_no_show += 1;
                if let Some(new_appt) = reassigned {
                    report.reassigned += 1;
                    state
                        .notifications
                        .dispatch(Notification::reassigned(&new_appt));
                }
            }
            Err(e) => {
                report.failed += 1;
                tracing::error!(appointment_id = %appt.id, error = %e, "failed to sweep appointment");
            }
        }
    }

    report
}

fn load_overdue(state: &AppState, cutoff: &NaiveDateTime) -> Result<Vec<Appointment>, AppError> {
    let conn = state.conn();
    Ok(queries::list_overdue_confirmed(&conn, cutoff)?)
}

async fn sweep_one(
    state: &Arc<AppState>,
    candidate: &Appointment,
    cutoff: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<Outcome, AppError> {
    let _timeline = state.barber_locks.lock(&candidate.barber_id).await;

    let mut conn = state.conn();
    let tx = conn.transaction()?;

    let Some(mut appt) = queries::get_appointment(&tx, &candidate.id)? else {
        return Ok(Outcome::Skipped);
    };
    if appt.state != AppointmentState::Confirmed
        || appt.scheduled_at >= cutoff
        || appt.barber_id != candidate.barber_id
    {
        return Ok(Outcome::Skipped);
    }

    tracing::info!(appointment_id = %appt.id, barber_id = %appt.barber_id, "marking appointment as no-show");
    persist_transition(&tx, &mut appt, Action::MarkNoShow, now)?;
    let reassigned = reassignment::reassign_freed_slot(&tx, &FreedSlot::from(&appt), now)?;
    tx.commit()?;

    Ok(Outcome::NoShow { reassigned })
}
