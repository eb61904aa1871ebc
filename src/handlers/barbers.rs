use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{BarberAvailability, WaitlistEntry};
use crate::services::sweeper::{self, SweepReport};
use crate::services::{availability, booking};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub start: Option<String>,
    pub days: Option<u32>,
}

// GET /api/barbers/:barber_id/availability
pub async fn availability(
    State(state): State<Arc<AppState>>,
    Path(barber_id): Path<String>,
    Query(params): Query<AvailabilityQuery>,
) -> Result<Json<BarberAvailability>, AppError> {
    let grid =
        availability::compute_availability(&state, &barber_id, params.start.as_deref(), params.days)?;
    Ok(Json(grid))
}

// GET /api/barbers/:barber_id/waitlist
pub async fn waitlist(
    State(state): State<Arc<AppState>>,
    Path(barber_id): Path<String>,
) -> Result<Json<Vec<WaitlistEntry>>, AppError> {
    Ok(Json(booking::list_waitlist(&state, &barber_id)?))
}

// POST /api/sweep
pub async fn sweep(State(state): State<Arc<AppState>>) -> Json<SweepReport> {
    Json(sweeper::run_sweep_once(&state).await)
}
