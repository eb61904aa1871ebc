pub mod appointments;
pub mod barbers;
pub mod health;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(
            "/api/appointments/:id",
            get(appointments::get_appointment).put(appointments::update_appointment),
        )
        .route(
            "/api/appointments/client/:client_id",
            get(appointments::list_by_client),
        )
        .route(
            "/api/appointments/barber/:barber_id",
            get(appointments::list_by_barber),
        )
        .route("/api/appointments/:id/confirm", post(appointments::confirm))
        .route("/api/appointments/:id/start", post(appointments::start))
        .route("/api/appointments/:id/finish", post(appointments::finish))
        .route("/api/appointments/:id/cancel", post(appointments::cancel))
        .route("/api/appointments/:id/no-show", post(appointments::mark_no_show))
        .route(
            "/api/barbers/:barber_id/availability",
            get(barbers::availability),
        )
        .route("/api/barbers/:barber_id/waitlist", get(barbers::waitlist))
        .route("/api/sweep", post(barbers::sweep))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
