//! Member message handlers
//!
//! Publishing prompts, voting and read-only queries any connected client may send.

use crate::ledger::LeaderboardFilter;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{ChannelId, SessionId, Side, UserId};
use std::sync::Arc;

pub async fn handle_open_session(
    state: &Arc<AppState>,
    channel_id: ChannelId,
    session_id: Option<SessionId>,
    toi: String,
) -> Option<ServerMessage> {
    tracing::info!("Open session in {} for {}", channel_id, toi);
    match state.open_session(channel_id, session_id, &toi).await {
        // Everyone, the sender included, gets SessionOpened via broadcast
        Ok(_) => None,
        Err(e) => {
            tracing::info!("Open session rejected: {}", e);
            Some(e.into())
        }
    }
}

pub async fn handle_vote(
    state: &Arc<AppState>,
    channel_id: ChannelId,
    user_id: UserId,
    side: Side,
) -> Option<ServerMessage> {
    match state.on_vote_action(&channel_id, &user_id, side).await {
        Ok(change) => Some(ServerMessage::VoteAck { change }),
        Err(e) => {
            tracing::debug!("Vote from {} in {} rejected: {}", user_id, channel_id, e);
            Some(e.into())
        }
    }
}

pub async fn handle_show_votes(state: &Arc<AppState>, channel_id: ChannelId) -> Option<ServerMessage> {
    match state.show_votes(&channel_id).await {
        Ok(lists) => Some(ServerMessage::Votes { lists }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_check_current_toi(state: &Arc<AppState>) -> Option<ServerMessage> {
    match state.current_toi().await {
        Ok(line) => Some(ServerMessage::CurrentToi { line }),
        Err(e) => {
            tracing::warn!("Current TOI lookup failed: {}", e);
            Some(e.into())
        }
    }
}

pub async fn handle_leaderboard(
    state: &Arc<AppState>,
    filter: LeaderboardFilter,
    limit: Option<usize>,
) -> Option<ServerMessage> {
    let board = state.leaderboard(filter, limit).await;
    Some(ServerMessage::Leaderboard { board })
}
