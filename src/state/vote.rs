use super::{AppState, SessionError};
use crate::protocol::ServerMessage;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// What a vote action did to the session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteChange {
    pub session_id: SessionId,
    pub side: Side,
    /// False when the user already held `side`
    pub changed: bool,
    /// Side the user switched away from, if any
    pub previous: Option<Side>,
    pub tally: Tally,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoterLists {
    pub session_id: SessionId,
    pub over: Vec<UserId>,
    pub under: Vec<UserId>,
}

/// Latest choice wins, at most one side per user, nothing moves once locked
pub fn apply_vote(
    session: &mut VoteSession,
    user_id: &str,
    side: Side,
) -> Result<VoteChange, SessionError> {
    if !session.is_open() {
        return Err(SessionError::SessionClosed);
    }

    if session.voters(side).contains(user_id) {
        return Ok(VoteChange {
            session_id: session.session_id.clone(),
            side,
            changed: false,
            previous: Some(side),
            tally: session.tally(),
        });
    }

    let previous = session
        .voters_mut(side.opposite())
        .remove(user_id)
        .then(|| side.opposite());
    session.voters_mut(side).insert(user_id.to_string());

    Ok(VoteChange {
        session_id: session.session_id.clone(),
        side,
        changed: true,
        previous,
        tally: session.tally(),
    })
}

impl AppState {
    /// Apply a user's over/under choice to the channel's open session
    pub async fn on_vote_action(
        &self,
        channel_id: &str,
        user_id: &str,
        side: Side,
    ) -> Result<VoteChange, SessionError> {
        let handle = self
            .store
            .get_by_channel(channel_id)
            .await
            .ok_or(SessionError::NoActiveSession)?;

        let change = {
            let mut slot = handle.lock().await;
            apply_vote(&mut slot.session, user_id, side)?
        };

        tracing::debug!(
            "Vote in {}: {} -> {:?} (changed={}, over={}, under={})",
            channel_id,
            user_id,
            side,
            change.changed,
            change.tally.over,
            change.tally.under
        );

        self.broadcast_to_all(ServerMessage::Tally {
            session_id: change.session_id.clone(),
            channel_id: channel_id.to_string(),
            over: change.tally.over,
            under: change.tally.under,
        });

        Ok(change)
    }

    /// Who is on which side of the channel's session
    pub async fn show_votes(&self, channel_id: &str) -> Result<VoterLists, SessionError> {
        let session = self
            .store
            .snapshot_by_channel(channel_id)
            .await
            .ok_or(SessionError::NoActiveSession)?;

        Ok(VoterLists {
            session_id: session.session_id,
            over: session.over_voters.into_iter().collect(),
            under: session.under_voters.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{idle_state, ScriptedFeed};

    fn session() -> VoteSession {
        VoteSession::new(
            "c1".to_string(),
            "m1".to_string(),
            "9:48".to_string(),
            588,
            SubjectContext {
                game_id: 1,
                team_id: 3,
                sweater_number: 73,
            },
        )
    }

    fn assert_exclusive(session: &VoteSession) {
        assert!(session.over_voters.is_disjoint(&session.under_voters));
    }

    #[test]
    fn test_first_vote_is_recorded() {
        let mut s = session();
        let change = apply_vote(&mut s, "u1", Side::Over).unwrap();

        assert!(change.changed);
        assert_eq!(change.previous, None);
        assert_eq!(change.tally, Tally { over: 1, under: 0 });
    }

    #[test]
    fn test_identical_vote_is_idempotent() {
        let mut s = session();
        apply_vote(&mut s, "u1", Side::Under).unwrap();
        let again = apply_vote(&mut s, "u1", Side::Under).unwrap();

        assert!(!again.changed);
        assert_eq!(again.tally, Tally { over: 0, under: 1 });
    }

    #[test]
    fn test_switching_sides() {
        let mut s = session();
        apply_vote(&mut s, "u1", Side::Over).unwrap();
        let change = apply_vote(&mut s, "u1", Side::Under).unwrap();

        assert!(change.changed);
        assert_eq!(change.previous, Some(Side::Over));
        assert_eq!(change.tally, Tally { over: 0, under: 1 });
        assert!(s.under_voters.contains("u1"));
        assert!(!s.over_voters.contains("u1"));
    }

    #[test]
    fn test_membership_stays_exclusive() {
        let mut s = session();
        let actions = [
            ("u1", Side::Over),
            ("u2", Side::Under),
            ("u1", Side::Under),
            ("u3", Side::Over),
            ("u2", Side::Over),
            ("u1", Side::Under),
            ("u3", Side::Under),
            ("u1", Side::Over),
        ];
        for (user, side) in actions {
            apply_vote(&mut s, user, side).unwrap();
            assert_exclusive(&s);
            assert_eq!(s.side_of(user), Some(side));
        }
        assert_eq!(s.tally(), Tally { over: 2, under: 1 });
    }

    #[test]
    fn test_locked_session_rejects_votes() {
        let mut s = session();
        apply_vote(&mut s, "u1", Side::Over).unwrap();
        s.state = SessionState::Locked;

        let result = apply_vote(&mut s, "u2", Side::Under);
        assert!(matches!(result, Err(SessionError::SessionClosed)));
        let result = apply_vote(&mut s, "u1", Side::Under);
        assert!(matches!(result, Err(SessionError::SessionClosed)));

        assert_eq!(s.tally(), Tally { over: 1, under: 0 });
        assert!(s.over_voters.contains("u1"));
    }

    #[tokio::test]
    async fn test_vote_without_session() {
        let state = idle_state(ScriptedFeed::new(vec![]));
        let result = state.on_vote_action("nowhere", "u1", Side::Over).await;
        assert!(matches!(result, Err(SessionError::NoActiveSession)));
    }

    #[tokio::test]
    async fn test_vote_action_broadcasts_tally() {
        let state = idle_state(ScriptedFeed::new(vec![]));
        state.open_session("c1".to_string(), Some("m1".to_string()), "9:48").await.unwrap();
        let mut rx = state.subscribe();

        state.on_vote_action("c1", "u1", Side::Over).await.unwrap();

        match rx.recv().await.unwrap() {
            ServerMessage::Tally {
                session_id,
                over,
                under,
                ..
            } => {
                assert_eq!(session_id, "m1");
                assert_eq!((over, under), (1, 0));
            }
            other => panic!("Expected Tally, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_show_votes_lists_sorted_voters() {
        let state = idle_state(ScriptedFeed::new(vec![]));
        state.open_session("c1".to_string(), None, "9:48").await.unwrap();
        state.on_vote_action("c1", "zed", Side::Over).await.unwrap();
        state.on_vote_action("c1", "amy", Side::Over).await.unwrap();
        state.on_vote_action("c1", "bob", Side::Under).await.unwrap();

        let lists = state.show_votes("c1").await.unwrap();
        assert_eq!(lists.over, vec!["amy".to_string(), "zed".to_string()]);
        assert_eq!(lists.under, vec!["bob".to_string()]);
    }
}
