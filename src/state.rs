use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::locks::BarberLocks;
use crate::services::notifications::NotificationDispatcher;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub notifications: NotificationDispatcher,
    pub barber_locks: BarberLocks,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig, notifications: NotificationDispatcher) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            notifications,
            barber_locks: BarberLocks::new(),
        }
    }

    /// A panic while the connection was held leaves the lock poisoned, but any
    /// open transaction was rolled back when it unwound, so the connection is
    /// still consistent and is handed out again.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("database lock was poisoned by a panic, recovering");
            self.db.clear_poison();
            poisoned.into_inner()
        })
    }
}
