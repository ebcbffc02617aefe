mod finalize;
pub mod resolve;
mod session;
pub mod store;
pub mod vote;

use crate::config::AppConfig;
use crate::feed::{EventFeed, EventState, FeedError};
use crate::ledger::{Leaderboard, LeaderboardFilter, Ledger};
use crate::protocol::ServerMessage;
use crate::toi::ToiError;
use crate::types::SessionId;
use std::sync::Arc;
use tokio::sync::broadcast;

pub use store::{SessionHandle, SessionSlot, SessionStore};
pub use vote::{VoteChange, VoterLists};

/// Everything that can go wrong in a session operation
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Voting is closed for this session")]
    SessionClosed,

    #[error("No active vote in this channel")]
    NoActiveSession,

    #[error("Session {0} is already open")]
    DuplicateSession(SessionId),

    #[error("Malformed time on ice: {0}")]
    MalformedInput(#[from] ToiError),

    #[error("No game found today")]
    NoGameToday,

    #[error("{}", not_final_message(.0))]
    EventNotFinal(EventState),

    #[error("Player not found in the box score")]
    SubjectNotFound,

    #[error("Event feed unavailable: {0}")]
    Feed(#[from] FeedError),
}

fn not_final_message(state: &EventState) -> &'static str {
    match state {
        EventState::Scheduled => "The game has not started yet. Please try again later.",
        _ => "The game is still live. Please try again later.",
    }
}

impl SessionError {
    /// Stable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::SessionClosed => "SESSION_CLOSED",
            SessionError::NoActiveSession => "NO_ACTIVE_SESSION",
            SessionError::DuplicateSession(_) => "DUPLICATE_SESSION",
            SessionError::MalformedInput(_) => "MALFORMED_INPUT",
            SessionError::NoGameToday => "NO_GAME_TODAY",
            SessionError::EventNotFinal(_) => "EVENT_NOT_FINAL",
            SessionError::SubjectNotFound => "SUBJECT_NOT_FOUND",
            SessionError::Feed(_) => "FEED_ERROR",
        }
    }
}

/// Shared application state
pub struct AppState {
    pub store: SessionStore,
    pub feed: Arc<dyn EventFeed>,
    pub ledger: Ledger,
    pub config: AppConfig,
    /// Rendering and announcement events for every connected client
    pub broadcast: broadcast::Sender<ServerMessage>,
}

impl AppState {
    pub fn new(feed: Arc<dyn EventFeed>, config: AppConfig) -> Self {
        let ledger = Ledger::in_memory(config.environment);
        Self::with_ledger(feed, config, ledger)
    }

    pub fn with_ledger(feed: Arc<dyn EventFeed>, config: AppConfig, ledger: Ledger) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            store: SessionStore::default(),
            feed,
            ledger,
            config,
            broadcast: tx,
        }
    }

    pub fn broadcast_to_all(&self, msg: ServerMessage) {
        // No receivers connected is fine
        let _ = self.broadcast.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.broadcast.subscribe()
    }

    /// Leaderboard for this process's environment
    pub async fn leaderboard(&self, filter: LeaderboardFilter, limit: Option<usize>) -> Leaderboard {
        let limit = limit.unwrap_or(self.config.leaderboard_size).max(1);
        self.ledger
            .leaderboard(self.ledger.environment(), filter, limit)
            .await
    }

    /// One feed call, bounded by the configured fetch timeout
    pub async fn fetch_event_state(
        &self,
        subject: &crate::types::SubjectContext,
    ) -> Result<EventState, FeedError> {
        let timeout = self.config.fetch_timeout;
        tokio::time::timeout(timeout, self.feed.fetch_event_state(subject))
            .await
            .map_err(|_| FeedError::Timeout(timeout))?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::feed::{FeedResult, GameRef, PlayerLine};
    use crate::types::{GameId, SubjectContext};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Feed that replays a scripted sequence of states, repeating the last one
    pub(crate) struct ScriptedFeed {
        pub game: Option<GameRef>,
        pub states: Mutex<VecDeque<FeedResult<EventState>>>,
        pub calls: Mutex<u32>,
    }

    impl ScriptedFeed {
        pub(crate) fn new(states: Vec<FeedResult<EventState>>) -> Self {
            Self {
                game: Some(GameRef {
                    id: 2024020876,
                    game_state: "FUT".to_string(),
                    season: Some(20242025),
                    game_type: Some(2),
                }),
                states: Mutex::new(states.into()),
                calls: Mutex::new(0),
            }
        }

        pub(crate) fn without_game() -> Self {
            Self {
                game: None,
                ..Self::new(vec![])
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    fn clone_result(r: &FeedResult<EventState>) -> FeedResult<EventState> {
        match r {
            Ok(s) => Ok(s.clone()),
            Err(e) => Err(FeedError::Api(e.to_string())),
        }
    }

    #[async_trait]
    impl EventFeed for ScriptedFeed {
        async fn find_game(&self) -> FeedResult<Option<GameRef>> {
            Ok(self.game.clone())
        }

        async fn fetch_event_state(&self, _subject: &SubjectContext) -> FeedResult<EventState> {
            *self.calls.lock().unwrap() += 1;
            let mut states = self.states.lock().unwrap();
            if states.len() > 1 {
                states.pop_front().unwrap_or(Ok(EventState::Live))
            } else {
                states
                    .front()
                    .map(clone_result)
                    .unwrap_or(Ok(EventState::Live))
            }
        }

        async fn fetch_player_line(
            &self,
            _subject: &SubjectContext,
        ) -> FeedResult<Option<PlayerLine>> {
            Ok(Some(PlayerLine {
                name: "M. Rempe".to_string(),
                toi: "6:41".to_string(),
                shifts: Some(9),
                game_state: "LIVE".to_string(),
            }))
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn subject_for(&self, game_id: GameId) -> SubjectContext {
            SubjectContext {
                game_id,
                team_id: 3,
                sweater_number: 73,
            }
        }
    }

    pub(crate) fn fast_config() -> AppConfig {
        AppConfig {
            poll_interval: Duration::from_millis(10),
            fetch_timeout: Duration::from_millis(200),
            ..AppConfig::default()
        }
    }

    /// State whose poller effectively never ticks during a test
    pub(crate) fn idle_state(feed: ScriptedFeed) -> Arc<AppState> {
        let config = AppConfig {
            poll_interval: Duration::from_secs(3600),
            ..AppConfig::default()
        };
        Arc::new(AppState::new(Arc::new(feed), config))
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(SessionError::SessionClosed.code(), "SESSION_CLOSED");
        assert_eq!(SessionError::NoActiveSession.code(), "NO_ACTIVE_SESSION");
        assert_eq!(
            SessionError::DuplicateSession("m1".to_string()).code(),
            "DUPLICATE_SESSION"
        );
        assert_eq!(
            SessionError::MalformedInput(ToiError::Empty).code(),
            "MALFORMED_INPUT"
        );
        assert_eq!(
            SessionError::EventNotFinal(EventState::Live).code(),
            "EVENT_NOT_FINAL"
        );
    }

    #[test]
    fn test_not_final_messages() {
        assert!(SessionError::EventNotFinal(EventState::Scheduled)
            .to_string()
            .contains("not started"));
        assert!(SessionError::EventNotFinal(EventState::Live)
            .to_string()
            .contains("still live"));
    }

    #[tokio::test]
    async fn test_broadcast_without_receivers_is_fine() {
        let state = idle_state(ScriptedFeed::new(vec![]));
        state.broadcast_to_all(ServerMessage::Pong);

        let mut rx = state.subscribe();
        state.broadcast_to_all(ServerMessage::Pong);
        assert!(matches!(rx.recv().await, Ok(ServerMessage::Pong)));
    }
}
