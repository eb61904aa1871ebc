use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayAvailability {
    pub date: String,
    pub available_hours: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BarberAvailability {
    pub barber_id: String,
    pub days: Vec<DayAvailability>,
}

/// Daily template the availability grid is cut from: `[start, end)` in steps
/// of `slot_minutes`.
#[derive(Debug, Clone, Copy)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub slot_minutes: i64,
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime, slot_minutes: i64) -> anyhow::Result<Self> {
        if slot_minutes <= 0 {
            return Err(anyhow::anyhow!("slot length must be positive: {slot_minutes}"));
        }
        if start >= end {
            return Err(anyhow::anyhow!(
                "working day must start before it ends: {}-{}",
                start.format("%H:%M"),
                end.format("%H:%M")
            ));
        }
        Ok(Self {
            start,
            end,
            slot_minutes,
        })
    }

    pub fn slot_starts(&self) -> Vec<NaiveTime> {
        let step = Duration::minutes(self.slot_minutes);
        let mut slots = vec![];
        let mut current = self.start;
        while current < self.end {
            slots.push(current);
            let (next, wrapped) = current.overflowing_add_signed(step);
            if wrapped != 0 {
                break;
            }
            current = next;
        }
        slots
    }

    /// Grid start times not present in `occupied` (compared at minute precision).
    pub fn free_slots(&self, occupied: &[NaiveTime]) -> Vec<String> {
        let taken: Vec<String> = occupied.iter().map(format_hhmm).collect();
        self.slot_starts()
            .iter()
            .map(format_hhmm)
            .filter(|slot| !taken.contains(slot))
            .collect()
    }
}

fn format_hhmm(t: &NaiveTime) -> String {
    t.format("%H:%M").to_string()
}
