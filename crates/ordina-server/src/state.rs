use std::sync::Arc;

use ordina_core::{SessionStore, TurnPipeline};
use ordina_retrieval::DocumentStore;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TurnPipeline>,
    pub sessions: Arc<SessionStore>,
    pub documents: DocumentStore,
}
