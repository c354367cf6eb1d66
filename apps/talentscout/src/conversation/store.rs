use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::conversation::session::ConversationSession;

/// One hosted session. The mutex serializes turns; the token is a clone of
/// the session's own so a request can cancel generation without the lock.
pub struct SessionHandle {
    pub session: Mutex<ConversationSession>,
    pub cancel: CancellationToken,
}

/// In-memory registry of sessions, owned by `AppState`. Terminal sessions
/// stay here (archived) so they can still be viewed.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Arc<SessionHandle>>>>,
}

impl SessionStore {
    pub async fn insert(&self, session: ConversationSession) -> Arc<SessionHandle> {
        let id = session.id();
        let handle = Arc::new(SessionHandle {
            cancel: session.cancellation_token(),
            session: Mutex::new(session),
        });
        self.inner.write().await.insert(id, Arc::clone(&handle));
        handle
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionHandle>> {
        self.inner.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_get_share_the_session() {
        let store = SessionStore::default();
        let session = ConversationSession::new();
        let id = session.id();
        let handle = store.insert(session).await;

        let found = store.get(id).await.unwrap();
        assert!(Arc::ptr_eq(&handle, &found));
        assert_eq!(store.len().await, 1);
        assert!(store.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_handle_token_cancels_session_token() {
        let store = SessionStore::default();
        let handle = store.insert(ConversationSession::new()).await;
        handle.cancel.cancel();
        let session = handle.session.lock().await;
        assert!(session.cancellation_token().is_cancelled());
    }
}
