use crate::feed::PlayerLine;
use crate::ledger::{BackfillRequest, Leaderboard, LeaderboardFilter};
use crate::state::{SessionError, VoteChange, VoterLists};
use crate::types::*;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Publish a new over/under prompt in a channel
    OpenSession {
        channel_id: ChannelId,
        /// Id of the published prompt message; generated when absent
        #[serde(default)]
        session_id: Option<SessionId>,
        toi: String,
    },
    Vote {
        channel_id: ChannelId,
        user_id: UserId,
        side: Side,
    },
    ShowVotes {
        channel_id: ChannelId,
    },
    // Moderator-only messages
    CheckWinner {
        channel_id: ChannelId,
    },
    Backfill(BackfillRequest),
    CheckCurrentToi,
    Leaderboard {
        #[serde(default)]
        limit: Option<usize>,
        #[serde(flatten)]
        filter: LeaderboardFilter,
    },
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        role: Role,
        environment: Environment,
        server_now: String,
        open_sessions: Vec<VoteSession>,
    },
    /// Broadcast when a prompt is published
    SessionOpened {
        session: VoteSession,
    },
    /// Broadcast after every accepted vote action so the prompt can be re-rendered
    Tally {
        session_id: SessionId,
        channel_id: ChannelId,
        over: u32,
        under: u32,
    },
    /// Sent to the voter only
    VoteAck {
        change: VoteChange,
    },
    Votes {
        lists: VoterLists,
    },
    Finalized {
        result: FinalizedResult,
    },
    Cancelled {
        record: CancellationRecord,
    },
    CurrentToi {
        line: PlayerLine,
    },
    Leaderboard {
        board: Leaderboard,
    },
    Backfilled {
        result: FinalizedResult,
    },
    Pong,
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn error(code: &str, msg: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            msg: msg.into(),
        }
    }
}

impl From<SessionError> for ServerMessage {
    fn from(e: SessionError) -> Self {
        ServerMessage::error(e.code(), e.to_string())
    }
}

impl From<crate::ledger::LedgerError> for ServerMessage {
    fn from(e: crate::ledger::LedgerError) -> Self {
        ServerMessage::error(e.code(), e.to_string())
    }
}
