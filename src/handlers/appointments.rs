use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;

use crate::errors::AppError;
use crate::models::{Appointment, AppointmentRequest, AppointmentUpdate};
use crate::services::booking;
use crate::state::AppState;

// POST /api/appointments
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AppointmentRequest>, JsonRejection>,
) -> Result<Json<Appointment>, AppError> {
    let Json(req) = payload?;
    Ok(Json(booking::create_appointment(&state, req).await?))
}

// GET /api/appointments
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    Ok(Json(booking::list_appointments(&state)?))
}

// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(booking::get_appointment(&state, &id)?))
}

// PUT /api/appointments/:id
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<AppointmentUpdate>, JsonRejection>,
) -> Result<Json<Appointment>, AppError> {
    let Json(patch) = payload?;
    Ok(Json(booking::update_appointment(&state, &id, patch).await?))
}

// GET /api/appointments/client/:client_id
pub async fn list_by_client(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    Ok(Json(booking::list_by_client(&state, &client_id)?))
}

// GET /api/appointments/barber/:barber_id
pub async fn list_by_barber(
    State(state): State<Arc<AppState>>,
    Path(barber_id): Path<String>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    Ok(Json(booking::list_by_barber(&state, &barber_id)?))
}

// POST /api/appointments/:id/confirm
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(booking::confirm(&state, &id).await?))
}

// POST /api/appointments/:id/start
pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(booking::start(&state, &id).await?))
}

// POST /api/appointments/:id/finish
pub async fn finish(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(booking::finish(&state, &id).await?))
}

// POST /api/appointments/:id/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(booking::cancel(&state, &id).await?))
}

// POST /api/appointments/:id/no-show
pub async fn mark_no_show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(booking::mark_no_show(&state, &id).await?))
}
