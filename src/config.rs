use std::env;

use chrono::NaiveTime;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub min_duration_minutes: i32,
    pub buffer_minutes: i32,
    pub confirm_lead_hours: i64,
    pub sweep_interval_secs: u64,
    pub no_show_tolerance_minutes: i64,
    pub slot_minutes: i64,
    pub workday_start: NaiveTime,
    pub workday_end: NaiveTime,
    pub notification_url: Option<String>,
    pub users_service_url: Option<String>,
    pub notification_queue_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parse_var("PORT", 8080),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "turnos.db".to_string()),
            min_duration_minutes: parse_var("MIN_DURATION_MINUTES", 45),
            buffer_minutes: parse_var("BUFFER_MINUTES", 5),
            confirm_lead_hours: parse_var("CONFIRM_LEAD_HOURS", 2),
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", 60),
            no_show_tolerance_minutes: parse_var("NO_SHOW_TOLERANCE_MINUTES", 10),
            slot_minutes: parse_var("SLOT_MINUTES", 60),
            workday_start: parse_time_var("WORKDAY_START", default_workday_start()),
            workday_end: parse_time_var("WORKDAY_END", default_workday_end()),
            notification_url: optional_var("NOTIFICATION_URL"),
            users_service_url: optional_var("USERS_SERVICE_URL"),
            notification_queue_capacity: parse_var("NOTIFICATION_QUEUE_CAPACITY", 256),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: ":memory:".to_string(),
            min_duration_minutes: 45,
            buffer_minutes: 5,
            confirm_lead_hours: 2,
            sweep_interval_secs: 60,
            no_show_tolerance_minutes: 10,
            slot_minutes: 60,
            workday_start: default_workday_start(),
            workday_end: default_workday_end(),
            notification_url: None,
            users_service_url: None,
            notification_queue_capacity: 256,
        }
    }
}

fn default_workday_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()
}

fn default_workday_end() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default()
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_time_var(name: &str, default: NaiveTime) -> NaiveTime {
    match env::var(name) {
        Ok(raw) => match NaiveTime::parse_from_str(raw.trim(), "%H:%M") {
            Ok(t) => t,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "invalid HH:MM value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
