use super::boxscore::{BoxScore, ScoreNow};
use super::*;
use serde::de::DeserializeOwned;

/// Live NHL web API
pub struct NhlFeed {
    base_url: String,
    team_id: u32,
    sweater_number: u32,
    timeout: Duration,
    client: reqwest::Client,
}

impl NhlFeed {
    pub fn new(
        base_url: String,
        team_id: u32,
        sweater_number: u32,
        timeout: Duration,
    ) -> FeedResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Config(e.to_string()))?;

        Ok(Self {
            base_url,
            team_id,
            sweater_number,
            timeout,
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> FeedResult<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = tokio::time::timeout(self.timeout, self.client.get(&url).send())
            .await
            .map_err(|_| FeedError::Timeout(self.timeout))?
            .map_err(|e| FeedError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Api(format!(
                "NHL API returned status: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))
    }

    async fn boxscore(&self, game_id: GameId) -> FeedResult<BoxScore> {
        self.get_json(&format!("/gamecenter/{}/boxscore", game_id))
            .await
    }
}

#[async_trait]
impl EventFeed for NhlFeed {
    async fn find_game(&self) -> FeedResult<Option<GameRef>> {
        let score: ScoreNow = self.get_json("/score/now").await?;
        Ok(score.find_team_game(self.team_id))
    }

    async fn fetch_event_state(&self, subject: &SubjectContext) -> FeedResult<EventState> {
        self.boxscore(subject.game_id).await?.event_state(subject)
    }

    async fn fetch_player_line(&self, subject: &SubjectContext) -> FeedResult<Option<PlayerLine>> {
        Ok(self
            .boxscore(subject.game_id)
            .await?
            .player_line(subject.team_id, subject.sweater_number))
    }

    fn name(&self) -> &str {
        "nhl"
    }

    fn subject_for(&self, game_id: GameId) -> SubjectContext {
        SubjectContext {
            game_id,
            team_id: self.team_id,
            sweater_number: self.sweater_number,
        }
    }
}
