use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub client_id: Option<String>,
    pub barber_id: Option<String>,
    pub service_id: Option<String>,
    pub scheduled_at: Option<NaiveDateTime>,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentUpdate {
    pub client_id: Option<String>,
    pub barber_id: Option<String>,
    pub service_id: Option<String>,
    pub scheduled_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
}
