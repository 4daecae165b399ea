use async_trait::async_trait;

use crate::events::{Listener, StoreEvent};

/// Writes every event to the `log` facade under `storegraph::events`.
///
/// Failed logins are logged at `Warn` regardless of the configured level.
pub struct LoggingListener {
    level: log::Level,
}

impl LoggingListener {
    /// `Info` level.
    pub fn new() -> Self {
        Self {
            level: log::Level::Info,
        }
    }

    pub fn with_level(level: log::Level) -> Self {
        Self { level }
    }

    fn level_for(&self, event: &StoreEvent) -> log::Level {
        match event {
            StoreEvent::LoginFailed { .. } => log::Level::Warn.min(self.level),
            _ => self.level,
        }
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Listener for LoggingListener {
    async fn handle(&self, event: &StoreEvent) {
        log::log!(
            target: "storegraph::events",
            self.level_for(event),
            "event={}, tenant_id={}, {:?}",
            event.name(),
            event.tenant_id(),
            event
        );
    }
}
