use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub client_id: String,
    pub barber_id: String,
    pub service_id: String,
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: i32,
    pub state: AppointmentState,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(skip)]
    pub version: i64,
}

impl Appointment {
    /// Applies `action` through the transition table. On rejection the
    /// appointment is left untouched.
    pub fn apply(&mut self, action: Action) -> Result<AppointmentState, TransitionError> {
        let next = self.state.transition(action)?;
        self.state = next;
        Ok(next)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentState {
    Pending,
    Confirmed,
    InProgress,
    Finished,
    Cancelled,
    NoShow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Confirm,
    Start,
    Finish,
    Cancel,
    MarkNoShow,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} an appointment that is {from}")]
pub struct TransitionError {
    pub from: AppointmentState,
    pub action: Action,
}

impl AppointmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentState::Pending => "pending",
            AppointmentState::Confirmed => "confirmed",
            AppointmentState::InProgress => "in_progress",
            AppointmentState::Finished => "finished",
            AppointmentState::Cancelled => "cancelled",
            AppointmentState::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AppointmentState::Pending),
            "confirmed" => Some(AppointmentState::Confirmed),
            "in_progress" => Some(AppointmentState::InProgress),
            "finished" => Some(AppointmentState::Finished),
            "cancelled" => Some(AppointmentState::Cancelled),
            "no_show" => Some(AppointmentState::NoShow),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentState::Finished | AppointmentState::Cancelled | AppointmentState::NoShow
        )
    }

    /// Whether the appointment still claims its slot on the barber's timeline.
    pub fn occupies_slot(&self) -> bool {
        !self.is_terminal()
    }

    /// Pending + Start goes straight to InProgress without passing through
    /// Confirmed. Kept as observed in production; see DESIGN.md.
    pub fn transition(self, action: Action) -> Result<AppointmentState, TransitionError> {
        use Action::*;
        use AppointmentState::*;

        match (self, action) {
            (Pending, Confirm) => Ok(Confirmed),
            (Pending, Start) => Ok(InProgress),
            (Pending, Cancel) => Ok(Cancelled),
            (Confirmed, Start) => Ok(InProgress),
            (Confirmed, Cancel) => Ok(Cancelled),
            (Confirmed, MarkNoShow) => Ok(NoShow),
            (InProgress, Finish) => Ok(Finished),
            (from, action) => Err(TransitionError { from, action }),
        }
    }
}

impl std::fmt::Display for AppointmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Confirm => "confirm",
            Action::Start => "start",
            Action::Finish => "finish",
            Action::Cancel => "cancel",
            Action::MarkNoShow => "mark as no-show",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
