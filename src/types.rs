use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque ID types for type safety
pub type ChannelId = String;
pub type SessionId = String;
pub type UserId = String;
pub type GameId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Over,
    Under,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Over => Side::Under,
            Side::Under => Side::Over,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Open,
    /// Terminal. Set exactly once by the finalizer.
    Locked,
}

/// Which player in which game a session is predicting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubjectContext {
    pub game_id: GameId,
    pub team_id: u32,
    pub sweater_number: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tally {
    pub over: u32,
    pub under: u32,
}

impl Tally {
    pub fn total(&self) -> u32 {
        self.over + self.under
    }
}

/// One open over/under prediction anchored to a single published prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteSession {
    pub session_id: SessionId,
    pub channel_id: ChannelId,
    /// Prompt as the user typed it, kept for display
    pub prompt_toi: String,
    pub prompt_seconds: u32,
    pub subject: SubjectContext,
    pub over_voters: BTreeSet<UserId>,
    pub under_voters: BTreeSet<UserId>,
    pub state: SessionState,
    pub created_at: String,
}

impl VoteSession {
    pub fn new(
        channel_id: ChannelId,
        session_id: SessionId,
        prompt_toi: String,
        prompt_seconds: u32,
        subject: SubjectContext,
    ) -> Self {
        Self {
            session_id,
            channel_id,
            prompt_toi,
            prompt_seconds,
            subject,
            over_voters: BTreeSet::new(),
            under_voters: BTreeSet::new(),
            state: SessionState::Open,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn voters(&self, side: Side) -> &BTreeSet<UserId> {
        match side {
            Side::Over => &self.over_voters,
            Side::Under => &self.under_voters,
        }
    }

    pub fn voters_mut(&mut self, side: Side) -> &mut BTreeSet<UserId> {
        match side {
            Side::Over => &mut self.over_voters,
            Side::Under => &mut self.under_voters,
        }
    }

    /// Side the user currently holds, if any
    pub fn side_of(&self, user_id: &str) -> Option<Side> {
        if self.over_voters.contains(user_id) {
            Some(Side::Over)
        } else if self.under_voters.contains(user_id) {
            Some(Side::Under)
        } else {
            None
        }
    }

    pub fn tally(&self) -> Tally {
        Tally {
            over: self.over_voters.len() as u32,
            under: self.under_voters.len() as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Over,
    Under,
    Push,
}

/// Output of the winner resolver: the comparison and who won it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub prompt_seconds: u32,
    pub actual_seconds: u32,
    pub outcome: Outcome,
    /// Empty on push
    pub winners: BTreeSet<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalizedResult {
    pub session_id: SessionId,
    pub channel_id: ChannelId,
    #[serde(flatten)]
    pub resolution: Resolution,
    pub votes_cast: u32,
    pub finalized_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The predicted player did not dress for the game
    SubjectAbsent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancellationRecord {
    pub session_id: SessionId,
    pub channel_id: ChannelId,
    pub prompt_seconds: u32,
    pub reason: CancelReason,
    pub cancelled_at: String,
}

/// What the finalizer emits for a session, exactly once
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionRecord {
    Finalized(FinalizedResult),
    Cancelled(CancellationRecord),
}

impl SessionRecord {
    pub fn session_id(&self) -> &str {
        match self {
            SessionRecord::Finalized(r) => &r.session_id,
            SessionRecord::Cancelled(r) => &r.session_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Test,
    Development,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Moderator,
    Member,
}
