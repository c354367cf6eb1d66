use std::sync::Arc;

use crate::config::Config;
use crate::conversation::machine::ConversationStateMachine;
use crate::conversation::store::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Stateless apart from its collaborators; every session is passed in.
    pub machine: Arc<ConversationStateMachine>,
    pub sessions: SessionStore,
    pub config: Config,
}
