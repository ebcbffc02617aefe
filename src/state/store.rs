//! Registry of open vote sessions.
//!
//! Two indexes: channel -> session id (at most one open session per channel) and
//! session id -> slot. Each slot sits behind its own mutex, so votes in one channel
//! never wait on another channel's session. The index locks are only held for
//! lookups and inserts, never while a slot is locked.

use super::SessionError;
use crate::types::{ChannelId, SessionId, SessionState, SubjectContext, VoteSession};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Mutable state of one session plus the handle that stops its poller
#[derive(Debug)]
pub struct SessionSlot {
    pub session: VoteSession,
    pub poller: CancellationToken,
}

pub type SessionHandle = Arc<Mutex<SessionSlot>>;

#[derive(Debug, Default)]
pub struct SessionStore {
    channels: RwLock<HashMap<ChannelId, SessionId>>,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionStore {
    /// Register a new open session and point its channel at it.
    ///
    /// A session previously mapped to the channel is not closed; it stays reachable
    /// by its own id until it is finalized. Ids still in the store are rejected.
    pub async fn create_session(
        &self,
        channel_id: ChannelId,
        session_id: SessionId,
        prompt_toi: String,
        prompt_seconds: u32,
        subject: SubjectContext,
    ) -> Result<VoteSession, SessionError> {
        let session = VoteSession::new(
            channel_id.clone(),
            session_id.clone(),
            prompt_toi,
            prompt_seconds,
            subject,
        );
        let slot = Arc::new(Mutex::new(SessionSlot {
            session: session.clone(),
            poller: CancellationToken::new(),
        }));

        {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(&session_id) {
                return Err(SessionError::DuplicateSession(session_id));
            }
            sessions.insert(session_id.clone(), slot);
        }
        self.channels.write().await.insert(channel_id, session_id);

        Ok(session)
    }

    pub async fn get_by_session(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn get_by_channel(&self, channel_id: &str) -> Option<SessionHandle> {
        let session_id = self.channels.read().await.get(channel_id).cloned()?;
        self.get_by_session(&session_id).await
    }

    /// Copy of the channel's session for display
    pub async fn snapshot_by_channel(&self, channel_id: &str) -> Option<VoteSession> {
        let handle = self.get_by_channel(channel_id).await?;
        let slot = handle.lock().await;
        Some(slot.session.clone())
    }

    pub async fn session_state(&self, session_id: &str) -> Option<SessionState> {
        let handle = self.get_by_session(session_id).await?;
        let slot = handle.lock().await;
        Some(slot.session.state)
    }

    pub async fn poller_token(&self, session_id: &str) -> Option<CancellationToken> {
        let handle = self.get_by_session(session_id).await?;
        let slot = handle.lock().await;
        Some(slot.poller.clone())
    }

    /// Drop the session and any channel mapping that still points at it
    pub async fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        let removed = self.sessions.write().await.remove(session_id);
        self.channels
            .write()
            .await
            .retain(|_, mapped| mapped != session_id);
        removed
    }

    /// Copies of every session still registered, oldest first
    pub async fn open_sessions(&self) -> Vec<VoteSession> {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();

        let mut sessions = Vec::with_capacity(handles.len());
        for handle in handles {
            sessions.push(handle.lock().await.session.clone());
        }
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        sessions
    }

    pub async fn session_ids(&self) -> HashSet<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
