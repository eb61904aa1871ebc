use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate, Utc};
use tower::ServiceExt;

use barbershop_turnos::config::AppConfig;
use barbershop_turnos::db;
use barbershop_turnos::handlers;
use barbershop_turnos::services::notifications::{
    Notification, NotificationDispatcher, NotificationKind, Notifier,
};
use barbershop_turnos::state::AppState;

// ── Mock Notifier ──

struct MockNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

// ── Helpers ──

fn test_state() -> Arc<AppState> {
    test_state_with_sent().0
}

fn test_state_with_sent() -> (Arc<AppState>, Arc<Mutex<Vec<Notification>>>) {
    let conn = db::init_db(":memory:").unwrap();
    let sent = Arc::new(Mutex::new(vec![]));
    let notifier = MockNotifier {
        sent: Arc::clone(&sent),
    };
    let notifications = NotificationDispatcher::spawn(Arc::new(notifier), 16);
    let state = Arc::new(AppState::new(conn, AppConfig::default(), notifications));
    (state, sent)
}

async fn wait_for_notifications(sent: &Arc<Mutex<Vec<Notification>>>, count: usize) {
    for _ in 0..100 {
        if sent.lock().unwrap().len() >= count {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("expected {count} notifications");
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::build_router(state)
}

/// Far enough ahead that confirmation is still allowed.
fn booking_day() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(3)
}

fn at(hour: u32, minute: u32) -> String {
    format!("{}T{:02}:{:02}:00", booking_day().format("%Y-%m-%d"), hour, minute)
}

fn booking_body(client: &str, barber: &str, scheduled_at: &str) -> String {
    serde_json::json!({
        "client_id": client,
        "barber_id": barber,
        "service_id": "cut",
        "scheduled_at": scheduled_at,
    })
    .to_string()
}

async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = test_app(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn book(state: &Arc<AppState>, client: &str, barber: &str, scheduled_at: &str) -> serde_json::Value {
    let (status, json) = send(
        state,
        json_request("POST", "/api/appointments", booking_body(client, barber, scheduled_at)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "booking failed: {json}");
    json
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let (status, json) = send(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

// ── Booking ──

#[tokio::test]
async fn test_create_and_fetch_appointment() {
    let state = test_state();
    let created = book(&state, "carla", "bruno", &at(10, 0)).await;
    assert_eq!(created["state"], "pending");
    assert_eq!(created["duration_minutes"], 45);
    assert!(created.get("version").is_none());

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = send(&state, get(&format!("/api/appointments/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["client_id"], "carla");
    assert_eq!(fetched["barber_id"], "bruno");

    let (status, all) = send(&state, get("/api/appointments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_field_is_bad_request() {
    let state = test_state();
    let body = serde_json::json!({
        "barber_id": "bruno",
        "service_id": "cut",
        "scheduled_at": at(10, 0),
    })
    .to_string();

    let (status, json) = send(&state, json_request("POST", "/api/appointments", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("client_id"));
}

#[tokio::test]
async fn test_malformed_body_is_bad_request_with_json_error() {
    let state = test_state();
    let body = serde_json::json!({
        "client_id": "carla",
        "barber_id": "bruno",
        "service_id": "cut",
        "scheduled_at": "next tuesday",
    })
    .to_string();
    let (status, json) = send(&state, json_request("POST", "/api/appointments", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let no_content_type = Request::builder()
        .method("POST")
        .uri("/api/appointments")
        .body(Body::from(booking_body("carla", "bruno", &at(10, 0))))
        .unwrap();
    let (status, json) = send(&state, no_content_type).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, json) = send(
        &state,
        json_request("PUT", "/api/appointments/whatever", "{not json".to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_far_future_date_is_rejected_and_service_keeps_working() {
    let state = test_state();
    let (status, _) = send(
        &state,
        json_request(
            "POST",
            "/api/appointments",
            booking_body("carla", "bruno", "+262142-12-31T23:50:00"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &state,
        get("/api/barbers/bruno/availability?start=%2B262142-12-30&days=60"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    book(&state, "carla", "bruno", &at(10, 0)).await;
}

#[tokio::test]
async fn test_past_slot_is_bad_request() {
    let state = test_state();
    let past = (Utc::now() - Duration::days(1)).format("%Y-%m-%dT10:00:00").to_string();
    let (status, _) = send(
        &state,
        json_request("POST", "/api/appointments", booking_body("carla", "bruno", &past)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_short_duration_is_bad_request() {
    let state = test_state();
    let body = serde_json::json!({
        "client_id": "carla",
        "barber_id": "bruno",
        "service_id": "cut",
        "scheduled_at": at(10, 0),
        "duration_minutes": 30,
    })
    .to_string();
    let (status, _) = send(&state, json_request("POST", "/api/appointments", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_booking_is_bad_request() {
    let state = test_state();
    book(&state, "carla", "bruno", &at(10, 0)).await;

    let (status, _) = send(
        &state,
        json_request("POST", "/api/appointments", booking_body("carla", "bruno", &at(15, 0))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_overlap_is_conflict_and_queues_client() {
    let state = test_state();
    book(&state, "carla", "bruno", &at(10, 0)).await;

    let (status, json) = send(
        &state,
        json_request("POST", "/api/appointments", booking_body("diego", "bruno", &at(10, 30))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("waitlist"));

    let (status, waitlist) = send(&state, get("/api/barbers/bruno/waitlist")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = waitlist.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["client_id"], "diego");

    // Asking again while queued is rejected outright.
    let (status, _) = send(
        &state,
        json_request("POST", "/api/appointments", booking_body("diego", "bruno", &at(16, 0))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_other_barber_is_independent() {
    let state = test_state();
    book(&state, "carla", "bruno", &at(10, 0)).await;
    book(&state, "diego", "dora", &at(10, 0)).await;

    let (_, bruno) = send(&state, get("/api/appointments/barber/bruno")).await;
    let (_, dora) = send(&state, get("/api/appointments/barber/dora")).await;
    assert_eq!(bruno.as_array().unwrap().len(), 1);
    assert_eq!(dora.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_appointment_is_not_found() {
    let state = test_state();
    let (status, _) = send(&state, get("/api/appointments/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&state, post("/api/appointments/does-not-exist/confirm")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_lists_for_unknown_client() {
    let state = test_state();
    let (status, json) = send(&state, get("/api/appointments/client/nobody")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_update_appointment() {
    let state = test_state();
    let created = book(&state, "carla", "bruno", &at(10, 0)).await;
    let id = created["id"].as_str().unwrap();

    let body = serde_json::json!({
        "client_id": "carla",
        "barber_id": "bruno",
        "service_id": "beard",
        "scheduled_at": at(12, 0),
        "notes": "short on the sides",
    })
    .to_string();
    let (status, updated) =
        send(&state, json_request("PUT", &format!("/api/appointments/{id}"), body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["service_id"], "beard");
    assert_eq!(updated["notes"], "short on the sides");
    assert_eq!(updated["state"], "pending");
}

// ── Lifecycle ──

#[tokio::test]
async fn test_full_lifecycle() {
    let state = test_state();
    let created = book(&state, "carla", "bruno", &at(10, 0)).await;
    let id = created["id"].as_str().unwrap();

    let (status, json) = send(&state, post(&format!("/api/appointments/{id}/confirm"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "confirmed");

    let (status, _) = send(&state, post(&format!("/api/appointments/{id}/confirm"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&state, post(&format!("/api/appointments/{id}/start"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "in_progress");

    let (status, json) = send(&state, post(&format!("/api/appointments/{id}/finish"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "finished");

    for action in ["cancel", "no-show", "start"] {
        let (status, _) = send(&state, post(&format!("/api/appointments/{id}/{action}"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{action} after finish");
    }
}

#[tokio::test]
async fn test_no_show_from_api_does_not_reassign() {
    let state = test_state();
    let created = book(&state, "carla", "bruno", &at(10, 0)).await;
    let id = created["id"].as_str().unwrap();
    send(
        &state,
        json_request("POST", "/api/appointments", booking_body("diego", "bruno", &at(10, 0))),
    )
    .await;

    send(&state, post(&format!("/api/appointments/{id}/confirm"))).await;
    let (status, json) = send(&state, post(&format!("/api/appointments/{id}/no-show"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "no_show");

    let (_, waitlist) = send(&state, get("/api/barbers/bruno/waitlist")).await;
    assert_eq!(waitlist.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_reassigns_to_waitlisted_client() {
    let (state, sent) = test_state_with_sent();
    let created = book(&state, "carla", "bruno", &at(10, 0)).await;
    let id = created["id"].as_str().unwrap();

    let (status, _) = send(
        &state,
        json_request("POST", "/api/appointments", booking_body("diego", "bruno", &at(10, 20))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = send(&state, post(&format!("/api/appointments/{id}/cancel"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "cancelled");

    let (_, diego) = send(&state, get("/api/appointments/client/diego")).await;
    let diego = diego.as_array().unwrap();
    assert_eq!(diego.len(), 1);
    assert_eq!(diego[0]["scheduled_at"], at(10, 0));
    assert_eq!(diego[0]["state"], "pending");

    let (_, waitlist) = send(&state, get("/api/barbers/bruno/waitlist")).await;
    assert!(waitlist.as_array().unwrap().is_empty());

    // carla's booking plus diego's reassignment.
    wait_for_notifications(&sent, 2).await;
    let sent = sent.lock().unwrap();
    assert!(sent
        .iter()
        .any(|n| n.kind == NotificationKind::Reassigned && n.client_id == "diego"));
}

// ── Availability ──

#[tokio::test]
async fn test_availability_excludes_booked_hours() {
    let state = test_state();
    book(&state, "carla", "bruno", &at(11, 0)).await;

    let day = booking_day().format("%Y-%m-%d").to_string();
    let (status, json) = send(
        &state,
        get(&format!("/api/barbers/bruno/availability?start={day}&days=1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["barber_id"], "bruno");

    let days = json["days"].as_array().unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["date"], day);
    let hours: Vec<&str> = days[0]["available_hours"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h.as_str().unwrap())
        .collect();
    assert!(hours.contains(&"10:00"));
    assert!(!hours.contains(&"11:00"));
}

#[tokio::test]
async fn test_availability_rejects_bad_input() {
    let state = test_state();
    let (status, _) = send(&state, get("/api/barbers/bruno/availability?start=tomorrow")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&state, get("/api/barbers/bruno/availability?days=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Sweeper ──

#[tokio::test]
async fn test_manual_sweep_with_nothing_overdue() {
    let state = test_state();
    let created = book(&state, "carla", "bruno", &at(10, 0)).await;
    let id = created["id"].as_str().unwrap();
    send(&state, post(&format!("/api/appointments/{id}/confirm"))).await;

    let (status, report) = send(&state, post("/api/sweep")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["examined"], 0);
    assert_eq!(report["marked_no_show"], 0);

    let (_, fetched) = send(&state, get(&format!("/api/appointments/{id}"))).await;
    assert_eq!(fetched["state"], "confirmed");
}
