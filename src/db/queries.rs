use anyhow::Context;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Appointment, AppointmentState, WaitlistEntry};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const APPOINTMENT_COLUMNS: &str = "id, client_id, barber_id, service_id, scheduled_at, duration_minutes, state, notes, created_at, updated_at, version";

const WAITLIST_COLUMNS: &str = "id, client_id, barber_id, service_id, requested_at, priority";

pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(raw: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        .with_context(|| format!("invalid stored timestamp: {raw}"))
}

// ── Appointments ──

pub fn create_appointment(conn: &Connection, appt: &Appointment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO appointments (id, client_id, barber_id, service_id, scheduled_at, duration_minutes, state, notes, created_at, updated_at, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            appt.id,
            appt.client_id,
            appt.barber_id,
            appt.service_id,
            format_ts(&appt.scheduled_at),
            appt.duration_minutes,
            appt.state.as_str(),
            appt.notes,
            format_ts(&appt.created_at),
            format_ts(&appt.updated_at),
            appt.version,
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id], |row| Ok(parse_appointment_row(row)))
        .optional()?;
    row.transpose()
}

/// Writes every mutable column back, guarded by the version the caller read.
/// Returns `false` when another writer got there first; the caller must not
/// treat that as success.
pub fn update_appointment(conn: &Connection, appt: &mut Appointment) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET
           client_id = ?1,
           barber_id = ?2,
           service_id = ?3,
           scheduled_at = ?4,
           duration_minutes = ?5,
           state = ?6,
           notes = ?7,
           updated_at = ?8,
           version = version + 1
         WHERE id = ?9 AND version = ?10",
        params![
            appt.client_id,
            appt.barber_id,
            appt.service_id,
            format_ts(&appt.scheduled_at),
            appt.duration_minutes,
            appt.state.as_str(),
            appt.notes,
            format_ts(&appt.updated_at),
            appt.id,
            appt.version,
        ],
    )?;

    if count == 1 {
        appt.version += 1;
    }
    Ok(count == 1)
}

pub fn list_appointments(conn: &Connection) -> anyhow::Result<Vec<Appointment>> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY scheduled_at ASC");
    query_appointments(conn, &sql, params![])
}

pub fn list_appointments_for_client(
    conn: &Connection,
    client_id: &str,
) -> anyhow::Result<Vec<Appointment>> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE client_id = ?1 ORDER BY scheduled_at ASC"
    );
    query_appointments(conn, &sql, params![client_id])
}

pub fn list_appointments_for_barber(
    conn: &Connection,
    barber_id: &str,
) -> anyhow::Result<Vec<Appointment>> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE barber_id = ?1 ORDER BY scheduled_at ASC"
    );
    query_appointments(conn, &sql, params![barber_id])
}

/// Appointments for `barber_id` whose start falls in `[start, end)`.
pub fn list_appointments_for_barber_in_range(
    conn: &Connection,
    barber_id: &str,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> anyhow::Result<Vec<Appointment>> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE barber_id = ?1 AND scheduled_at >= ?2 AND scheduled_at < ?3
         ORDER BY scheduled_at ASC"
    );
    query_appointments(
        conn,
        &sql,
        params![barber_id, format_ts(start), format_ts(end)],
    )
}

/// Appointments for `barber_id` whose interval, padded by `buffer_minutes` on
/// both sides, intersects `[window_start, window_end)`.
pub fn list_appointments_overlapping(
    conn: &Connection,
    barber_id: &str,
    window_start: &NaiveDateTime,
    window_end: &NaiveDateTime,
    buffer_minutes: i32,
) -> anyhow::Result<Vec<Appointment>> {
    let upper = *window_end + chrono::Duration::minutes(buffer_minutes as i64);
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE barber_id = ?1
           AND scheduled_at < ?2
           AND datetime(scheduled_at, '+' || (duration_minutes + ?3) || ' minutes') > ?4
         ORDER BY scheduled_at ASC"
    );
    query_appointments(
        conn,
        &sql,
        params![
            barber_id,
            format_ts(&upper),
            buffer_minutes,
            format_ts(window_start)
        ],
    )
}

/// Confirmed appointments that started strictly before `cutoff`.
pub fn list_overdue_confirmed(
    conn: &Connection,
    cutoff: &NaiveDateTime,
) -> anyhow::Result<Vec<Appointment>> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE state = ?1 AND scheduled_at < ?2
         ORDER BY scheduled_at ASC"
    );
    query_appointments(
        conn,
        &sql,
        params![AppointmentState::Confirmed.as_str(), format_ts(cutoff)],
    )
}

/// Whether the client already holds a live, future appointment with this barber.
pub fn has_upcoming_appointment(
    conn: &Connection,
    client_id: &str,
    barber_id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE client_id = ?1 AND barber_id = ?2 AND scheduled_at > ?3
           AND state NOT IN (?4, ?5)",
        params![
            client_id,
            barber_id,
            format_ts(now),
            AppointmentState::Cancelled.as_str(),
            AppointmentState::NoShow.as_str(),
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn query_appointments(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let id: String = row.get(0)?;
    let scheduled_at_str: String = row.get(4)?;
    let state_str: String = row.get(6)?;
    let created_at_str: String = row.get(8)?;
    let updated_at_str: String = row.get(9)?;

    let state = AppointmentState::parse(&state_str)
        .with_context(|| format!("unknown state {state_str:?} on appointment {id}"))?;

    Ok(Appointment {
        client_id: row.get(1)?,
        barber_id: row.get(2)?,
        service_id: row.get(3)?,
        scheduled_at: parse_ts(&scheduled_at_str)?,
        duration_minutes: row.get(5)?,
        state,
        notes: row.get(7)?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
        version: row.get(10)?,
        id,
    })
}

// ── Waitlist ──

pub fn create_waitlist_entry(conn: &Connection, entry: &WaitlistEntry) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO waitlist_entries (id, client_id, barber_id, service_id, requested_at, priority)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id,
            entry.client_id,
            entry.barber_id,
            entry.service_id,
            format_ts(&entry.requested_at),
            entry.priority,
        ],
    )?;
    Ok(())
}

pub fn get_waitlist_entry(conn: &Connection, id: &str) -> anyhow::Result<Option<WaitlistEntry>> {
    let sql = format!("SELECT {WAITLIST_COLUMNS} FROM waitlist_entries WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id], |row| Ok(parse_waitlist_row(row)))
        .optional()?;
    row.transpose()
}

/// Returns `false` when the entry was already gone.
pub fn delete_waitlist_entry(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM waitlist_entries WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

/// Oldest request for the barber; insertion order breaks timestamp ties.
pub fn oldest_waitlist_entry_for_barber(
    conn: &Connection,
    barber_id: &str,
) -> anyhow::Result<Option<WaitlistEntry>> {
    let sql = format!(
        "SELECT {WAITLIST_COLUMNS} FROM waitlist_entries
         WHERE barber_id = ?1
         ORDER BY requested_at ASC, seq ASC
         LIMIT 1"
    );
    let row = conn
        .query_row(&sql, params![barber_id], |row| Ok(parse_waitlist_row(row)))
        .optional()?;
    row.transpose()
}

pub fn waitlist_entry_exists(
    conn: &Connection,
    client_id: &str,
    barber_id: &str,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM waitlist_entries WHERE client_id = ?1 AND barber_id = ?2",
        params![client_id, barber_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_waitlist_for_barber(
    conn: &Connection,
    barber_id: &str,
) -> anyhow::Result<Vec<WaitlistEntry>> {
    let sql = format!(
        "SELECT {WAITLIST_COLUMNS} FROM waitlist_entries
         WHERE barber_id = ?1
         ORDER BY requested_at ASC, seq ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![barber_id], |row| Ok(parse_waitlist_row(row)))?;

    let mut entries = vec![];
    for row in rows {
        entries.push(row??);
    }
    Ok(entries)
}

fn parse_waitlist_row(row: &rusqlite::Row) -> anyhow::Result<WaitlistEntry> {
    let requested_at_str: String = row.get(4)?;
    Ok(WaitlistEntry {
        id: row.get(0)?,
        client_id: row.get(1)?,
        barber_id: row.get(2)?,
        service_id: row.get(3)?,
        requested_at: parse_ts(&requested_at_str)?,
        priority: row.get(5)?,
    })
}
