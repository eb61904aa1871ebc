use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{AppointmentState, BarberAvailability, DayAvailability, WorkingHours};
use crate::state::AppState;

pub const DEFAULT_DAYS: u32 = 7;
pub const MAX_DAYS: u32 = 60;

const MAX_YEAR: i32 = 9999;

/// Free start times per day for `barber_id`. `start` is `YYYY-MM-DD` and
/// defaults to today; `days` defaults to a week.
pub fn compute_availability(
    state: &Arc<AppState>,
    barber_id: &str,
    start: Option<&str>,
    days: Option<u32>,
) -> Result<BarberAvailability, AppError> {
    let start_date = match start.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| AppError::Validation(format!("invalid date: {raw}")))?,
        None => Utc::now().date_naive(),
    };

    let days = days.unwrap_or(DEFAULT_DAYS);
    if days == 0 || days > MAX_DAYS {
        return Err(AppError::Validation(format!(
            "days must be between 1 and {MAX_DAYS}"
        )));
    }
    let last_day = start_date
        .checked_add_days(Days::new(u64::from(days)))
        .filter(|d| d.year() <= MAX_YEAR)
        .ok_or_else(|| AppError::Validation(format!("start date out of range: {start_date}")))?;
    tracing::debug!(barber_id, %start_date, %last_day, "computing availability");

    let config = &state.config;
    let hours = WorkingHours::new(config.workday_start, config.workday_end, config.slot_minutes)
        .map_err(|e| AppError::Internal(format!("invalid working hours: {e}")))?;

    let conn = state.conn();
    Ok(barber_availability(&conn, &hours, barber_id, start_date, days)?)
}

pub fn barber_availability(
    conn: &Connection,
    hours: &WorkingHours,
    barber_id: &str,
    start_date: NaiveDate,
    days: u32,
) -> anyhow::Result<BarberAvailability> {
    let range_start = start_date.and_time(NaiveTime::MIN);
    let range_end = start_date
        .checked_add_days(Days::new(u64::from(days)))
        .map(|d| d.and_time(NaiveTime::MIN))
        .ok_or_else(|| anyhow::anyhow!("availability range overflows: {start_date} + {days} days"))?;

    let booked: Vec<_> =
        queries::list_appointments_for_barber_in_range(conn, barber_id, &range_start, &range_end)?
            .into_iter()
            .filter(|a| !matches!(a.state, AppointmentState::Cancelled | AppointmentState::NoShow))
            .collect();

    let days = start_date
        .iter_days()
        .take(days as usize)
        .map(|date| {
            let occupied: Vec<_> = booked
                .iter()
                .filter(|a| a.scheduled_at.date() == date)
                .map(|a| a.scheduled_at.time())
                .collect();
            DayAvailability {
                date: date.format("%Y-%m-%d").to_string(),
                available_hours: hours.free_slots(&occupied),
            }
        })
        .collect();

    Ok(BarberAvailability {
        barber_id: barber_id.to_string(),
        days,
    })
}
