use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use super::error::ServerError;
use crate::pipeline::Pipeline;
use crate::session::MenuSession;

/// Oldest sessions are dropped past this many.
pub(crate) const MAX_SESSIONS: usize = 1024;

pub(crate) type SharedSession = Arc<AsyncMutex<MenuSession>>;

struct SessionSlot {
    seq: u64,
    session: SharedSession,
}

pub(crate) struct ServerState {
    pub(crate) pipeline: Pipeline,
    sessions: Mutex<HashMap<String, SessionSlot>>,
    next_seq: AtomicU64,
}

impl ServerState {
    pub(crate) fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            sessions: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Stores the session and returns the id clients use to continue it.
    pub(crate) fn open_session(&self, session: MenuSession) -> Result<String, ServerError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let stamp = OffsetDateTime::now_utc().unix_timestamp_nanos() as u64;
        let id = format!("{:x}-{:x}", stamp, seq);
        let mut sessions = self.lock_sessions()?;
        while sessions.len() >= MAX_SESSIONS {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, slot)| slot.seq)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!("dropped menu session {}", oldest);
        }
        sessions.insert(
            id.clone(),
            SessionSlot {
                seq,
                session: Arc::new(AsyncMutex::new(session)),
            },
        );
        Ok(id)
    }

    /// Each session has its own async lock, held across lookups.
    pub(crate) fn session(&self, id: &str) -> Result<SharedSession, ServerError> {
        self.lock_sessions()?
            .get(id.trim())
            .map(|slot| Arc::clone(&slot.session))
            .ok_or_else(|| ServerError::not_found(format!("unknown session '{}'", id.trim())))
    }

    fn lock_sessions(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionSlot>>, ServerError> {
        self.sessions
            .lock()
            .map_err(|_| ServerError::internal("session table lock poisoned"))
    }
}
