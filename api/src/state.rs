//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use engine::Engine;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The query engine.
    engine: Arc<Engine>,
    /// Timeout for queries that do not set their own.
    query_timeout: Duration,
}

impl AppState {
    /// Creates a new application state.
    #[must_use]
    pub fn new(engine: Engine, query_timeout: Duration) -> Self {
        Self {
            engine: Arc::new(engine),
            query_timeout,
        }
    }

    /// Returns a handle to the engine, for moving onto a blocking task.
    #[must_use]
    pub fn engine(&self) -> Arc<Engine> {
        Arc::clone(&self.engine)
    }

    /// Default query timeout.
    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Engine::default(), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        let state = AppState::default();
        let state2 = state.clone();

        // Both share the same engine
        assert!(Arc::ptr_eq(&state.engine(), &state2.engine()));
        assert_eq!(state2.query_timeout(), Duration::from_secs(30));
    }
}
