use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Priority written for every new entry. Selection is FIFO by `requested_at`
/// and never looks at this value.
pub const DEFAULT_PRIORITY: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: String,
    pub client_id: String,
    pub barber_id: String,
    pub service_id: String,
    pub requested_at: NaiveDateTime,
    pub priority: i32,
}
