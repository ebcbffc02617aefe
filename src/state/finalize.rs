use super::resolve::resolve;
use super::store::SessionSlot;
use super::{AppState, SessionError};
use crate::feed::EventState;
use crate::ledger::{BackfillRequest, LedgerError};
use crate::protocol::ServerMessage;
use crate::toi::parse_toi;
use crate::types::*;

/// Open -> Locked, exactly once. Stops the poller inside the same critical section
/// so a tick racing in afterwards sees Locked.
fn lock_slot(slot: &mut SessionSlot) -> Result<(), SessionError> {
    if !slot.session.is_open() {
        return Err(SessionError::SessionClosed);
    }
    slot.session.state = SessionState::Locked;
    slot.poller.cancel();
    Ok(())
}

impl AppState {
    /// Lock the session, work out the winners and hand the result to collaborators
    pub async fn finalize(
        &self,
        session_id: &str,
        actual_seconds: u32,
    ) -> Result<FinalizedResult, SessionError> {
        let handle = self
            .store
            .get_by_session(session_id)
            .await
            .ok_or(SessionError::NoActiveSession)?;

        let result = {
            let mut slot = handle.lock().await;
            lock_slot(&mut slot)?;

            let session = &slot.session;
            FinalizedResult {
                session_id: session.session_id.clone(),
                channel_id: session.channel_id.clone(),
                resolution: resolve(
                    session.prompt_seconds,
                    actual_seconds,
                    &session.over_voters,
                    &session.under_voters,
                ),
                votes_cast: session.tally().total(),
                finalized_at: chrono::Utc::now().to_rfc3339(),
            }
        };

        tracing::info!(
            "Session {} finalized: {:?} ({} winners, prompt {}s, actual {}s)",
            session_id,
            result.resolution.outcome,
            result.resolution.winners.len(),
            result.resolution.prompt_seconds,
            result.resolution.actual_seconds
        );

        self.emit(SessionRecord::Finalized(result.clone())).await;
        self.store.remove(session_id).await;
        Ok(result)
    }

    /// Same as [`AppState::finalize`] but from a raw "M:SS" value.
    ///
    /// A malformed value leaves the session open.
    pub async fn finalize_raw(
        &self,
        session_id: &str,
        actual_toi: &str,
    ) -> Result<FinalizedResult, SessionError> {
        let actual_seconds = parse_toi(actual_toi)?;
        self.finalize(session_id, actual_seconds).await
    }

    /// Close the session without a result (the player never took the ice)
    pub async fn cancel(
        &self,
        session_id: &str,
        reason: CancelReason,
    ) -> Result<CancellationRecord, SessionError> {
        let handle = self
            .store
            .get_by_session(session_id)
            .await
            .ok_or(SessionError::NoActiveSession)?;

        let record = {
            let mut slot = handle.lock().await;
            lock_slot(&mut slot)?;

            CancellationRecord {
                session_id: slot.session.session_id.clone(),
                channel_id: slot.session.channel_id.clone(),
                prompt_seconds: slot.session.prompt_seconds,
                reason,
                cancelled_at: chrono::Utc::now().to_rfc3339(),
            }
        };

        tracing::info!("Session {} cancelled: {:?}", session_id, reason);

        self.emit(SessionRecord::Cancelled(record.clone())).await;
        self.store.remove(session_id).await;
        Ok(record)
    }

    /// Act on a feed observation. Non-terminal states do nothing.
    pub async fn apply_event_state(
        &self,
        session_id: &str,
        state: EventState,
    ) -> Result<Option<SessionRecord>, SessionError> {
        match state {
            EventState::Scheduled | EventState::Live => Ok(None),
            EventState::Final { actual_toi } => self
                .finalize_raw(session_id, &actual_toi)
                .await
                .map(|r| Some(SessionRecord::Finalized(r))),
            EventState::SubjectAbsent => self
                .cancel(session_id, CancelReason::SubjectAbsent)
                .await
                .map(|r| Some(SessionRecord::Cancelled(r))),
        }
    }

    /// Manual trigger: ask the feed once and settle the channel's session if the game is over
    pub async fn check_winner(&self, channel_id: &str) -> Result<SessionRecord, SessionError> {
        let session = self
            .store
            .snapshot_by_channel(channel_id)
            .await
            .ok_or(SessionError::NoActiveSession)?;

        let state = self.fetch_event_state(&session.subject).await?;
        tracing::info!(
            "Manual winner check for {}: {:?}",
            session.session_id,
            state
        );

        match self
            .apply_event_state(&session.session_id, state.clone())
            .await?
        {
            Some(record) => Ok(record),
            None => Err(SessionError::EventNotFinal(state)),
        }
    }

    /// Settle a session that was lost before its game ended, with moderator-supplied winners
    pub async fn backfill(&self, request: &BackfillRequest) -> Result<FinalizedResult, LedgerError> {
        let open = self.store.session_ids().await;
        let result = self.ledger.backfill(request, &open).await?;
        self.broadcast_to_all(ServerMessage::Backfilled {
            result: result.clone(),
        });
        Ok(result)
    }

    /// Persist, then announce
    async fn emit(&self, record: SessionRecord) {
        if let Err(e) = self.ledger.record(record.clone()).await {
            tracing::error!(
                "Failed to persist result for session {}: {}",
                record.session_id(),
                e
            );
        }

        self.broadcast_to_all(match record {
            SessionRecord::Finalized(result) => ServerMessage::Finalized { result },
            SessionRecord::Cancelled(record) => ServerMessage::Cancelled { record },
        });
    }
}
