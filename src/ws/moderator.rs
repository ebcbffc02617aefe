//! Moderator-only command handlers
//!
//! Authorization is checked in the main dispatch layer before calling these.

use crate::ledger::BackfillRequest;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{ChannelId, SessionRecord};
use std::sync::Arc;

pub async fn handle_check_winner(state: &Arc<AppState>, channel_id: ChannelId) -> Option<ServerMessage> {
    tracing::info!("Moderator checking winner for {}", channel_id);
    match state.check_winner(&channel_id).await {
        Ok(SessionRecord::Finalized(result)) => Some(ServerMessage::Finalized { result }),
        Ok(SessionRecord::Cancelled(record)) => Some(ServerMessage::Cancelled { record }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_backfill(state: &Arc<AppState>, request: BackfillRequest) -> Option<ServerMessage> {
    tracing::info!(
        "Moderator backfilling {} ({} -> {})",
        request.date,
        request.prompt_toi,
        request.actual_toi
    );
    match state.backfill(&request).await {
        Ok(result) => Some(ServerMessage::Backfilled { result }),
        Err(e) => {
            tracing::warn!("Backfill failed: {}", e);
            Some(e.into())
        }
    }
}
