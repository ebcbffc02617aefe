//! WebSocket message dispatch
//!
//! Authorization is checked here, then dispatched to role-specific handler modules.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::Role;
use std::sync::Arc;

use super::{member, moderator};

/// Macro to check moderator authorization and return early if unauthorized
macro_rules! check_moderator {
    ($role:expr, $action:expr) => {
        if *$role != Role::Moderator {
            return Some(ServerMessage::error(
                "UNAUTHORIZED",
                format!("Only moderators can {}", $action),
            ));
        }
    };
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    role: &Role,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Ping => Some(ServerMessage::Pong),

        ClientMessage::OpenSession {
            channel_id,
            session_id,
            toi,
        } => member::handle_open_session(state, channel_id, session_id, toi).await,

        ClientMessage::Vote {
            channel_id,
            user_id,
            side,
        } => member::handle_vote(state, channel_id, user_id, side).await,

        ClientMessage::ShowVotes { channel_id } => {
            member::handle_show_votes(state, channel_id).await
        }

        ClientMessage::CheckCurrentToi => member::handle_check_current_toi(state).await,

        ClientMessage::Leaderboard { limit, filter } => {
            member::handle_leaderboard(state, filter, limit).await
        }

        // Moderator-only commands
        ClientMessage::CheckWinner { channel_id } => {
            check_moderator!(role, "check winners");
            moderator::handle_check_winner(state, channel_id).await
        }

        ClientMessage::Backfill(request) => {
            check_moderator!(role, "backfill results");
            moderator::handle_backfill(state, request).await
        }
    }
}
