pub mod boxscore;
mod fixture;
mod nhl;

use crate::types::{GameId, SubjectContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use fixture::FixtureFeed;
pub use nhl::NhlFeed;

pub const DEFAULT_NHL_API_BASE: &str = "https://api-web.nhle.com/v1";

/// Result type for feed operations
pub type FeedResult<T> = Result<T, FeedError>;

/// Errors that can occur while talking to the event source
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("API request failed: {0}")]
    Api(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Response parsing failed: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Where the predicted game stands, as seen by the feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EventState {
    Scheduled,
    Live,
    /// Game is over and the subject's time on ice is settled
    Final { actual_toi: String },
    /// Game is over (or called off) and the subject never played
    SubjectAbsent,
}

impl EventState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventState::Final { .. } | EventState::SubjectAbsent)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameRef {
    pub id: GameId,
    pub game_state: String,
    /// e.g. 20242025
    #[serde(default)]
    pub season: Option<u32>,
    /// 1 preseason, 2 regular season, 3 playoffs
    #[serde(default)]
    pub game_type: Option<u32>,
}

/// `gameType` of a regular-season game
pub const REGULAR_SEASON: u32 = 2;

/// Current box score line for the subject
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerLine {
    pub name: String,
    pub toi: String,
    pub shifts: Option<u32>,
    pub game_state: String,
}

/// Source of game state that the poller watches
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Today's game for the configured team
    async fn find_game(&self) -> FeedResult<Option<GameRef>>;

    async fn fetch_event_state(&self, subject: &SubjectContext) -> FeedResult<EventState>;

    /// The subject's line in the box score so far, if they are on it
    async fn fetch_player_line(&self, subject: &SubjectContext) -> FeedResult<Option<PlayerLine>>;

    fn name(&self) -> &str;

    /// Team and sweater number new sessions predict
    fn subject_for(&self, game_id: GameId) -> SubjectContext;
}

/// Configuration for the event feed
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub api_base: String,
    pub team_id: u32,
    pub sweater_number: u32,
    /// Read canned JSON from `mock_dir` instead of calling the API
    pub use_mock: bool,
    pub mock_dir: PathBuf,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_NHL_API_BASE.to_string(),
            team_id: 3,
            sweater_number: 73,
            use_mock: false,
            mock_dir: PathBuf::from("mocks"),
        }
    }
}

impl FeedConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_base = std::env::var("NHL_API_BASE")
            .ok()
            .and_then(|url| {
                let trimmed = url.trim().trim_end_matches('/');
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or(defaults.api_base);

        let use_mock = std::env::var("USE_MOCK_API")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        Self {
            api_base,
            team_id: std::env::var("NHL_TEAM_ID")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.team_id),
            sweater_number: std::env::var("NHL_SWEATER_NUMBER")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.sweater_number),
            use_mock,
            mock_dir: std::env::var("MOCK_DATA_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.mock_dir),
        }
    }

    /// `timeout` bounds each HTTP request of the live feed
    pub fn build_feed(&self, timeout: Duration) -> FeedResult<Arc<dyn EventFeed>> {
        if self.use_mock {
            tracing::info!("Using fixture feed from {}", self.mock_dir.display());
            return Ok(Arc::new(FixtureFeed::new(
                self.mock_dir.clone(),
                self.team_id,
                self.sweater_number,
            )));
        }

        Ok(Arc::new(NhlFeed::new(
            self.api_base.clone(),
            self.team_id,
            self.sweater_number,
            timeout,
        )?))
    }
}
