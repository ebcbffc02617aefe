use super::{AppState, SessionError};
use crate::feed::{FeedError, PlayerLine};
use crate::poller;
use crate::protocol::ServerMessage;
use crate::toi::parse_toi;
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// Publish a new over/under prompt for a channel and start watching its game
    pub async fn open_session(
        self: &Arc<Self>,
        channel_id: ChannelId,
        session_id: Option<SessionId>,
        prompt_toi: &str,
    ) -> Result<VoteSession, SessionError> {
        // Validate before anything is stored
        let prompt_seconds = parse_toi(prompt_toi)?;

        let timeout = self.config.fetch_timeout;
        let game = tokio::time::timeout(timeout, self.feed.find_game())
            .await
            .map_err(|_| FeedError::Timeout(timeout))??
            .ok_or(SessionError::NoGameToday)?;
        let subject = self.feed.subject_for(game.id);

        let session_id = session_id.unwrap_or_else(|| ulid::Ulid::new().to_string());

        if let Some(previous) = self.store.snapshot_by_channel(&channel_id).await {
            tracing::warn!(
                "Channel {} already has open session {}; it keeps polling until it settles",
                channel_id,
                previous.session_id
            );
        }

        let session = self
            .store
            .create_session(
                channel_id,
                session_id,
                prompt_toi.trim().to_string(),
                prompt_seconds,
                subject,
            )
            .await?;

        // Pending entry first, so a result from the poller always finds it
        if let Err(e) = self.ledger.open(&session, &game).await {
            tracing::error!(
                "Failed to record prompt for session {}: {}",
                session.session_id,
                e
            );
        }

        if let Some(token) = self.store.poller_token(&session.session_id).await {
            poller::spawn_session_poller(
                self.clone(),
                session.session_id.clone(),
                session.subject.clone(),
                token,
            );
        }

        tracing::info!(
            "Opened session {} in {} for {} (game {})",
            session.session_id,
            session.channel_id,
            session.prompt_toi,
            game.id
        );

        self.broadcast_to_all(ServerMessage::SessionOpened {
            session: session.clone(),
        });

        Ok(session)
    }

    /// Current line for the configured player in today's game
    pub async fn current_toi(&self) -> Result<PlayerLine, SessionError> {
        let timeout = self.config.fetch_timeout;
        let game = tokio::time::timeout(timeout, self.feed.find_game())
            .await
            .map_err(|_| FeedError::Timeout(timeout))??
            .ok_or(SessionError::NoGameToday)?;
        let subject = self.feed.subject_for(game.id);

        tokio::time::timeout(timeout, self.feed.fetch_player_line(&subject))
            .await
            .map_err(|_| FeedError::Timeout(timeout))??
            .ok_or(SessionError::SubjectNotFound)
    }
}
