use super::boxscore::{BoxScore, ScoreNow};
use super::*;
use std::path::Path;

/// Reads `score.json` and `boxscore.json` from a directory instead of the network.
///
/// The files are re-read on every call so they can be edited while a session is
/// being polled.
pub struct FixtureFeed {
    dir: PathBuf,
    team_id: u32,
    sweater_number: u32,
}

impl FixtureFeed {
    pub fn new(dir: PathBuf, team_id: u32, sweater_number: u32) -> Self {
        Self {
            dir,
            team_id,
            sweater_number,
        }
    }

    async fn read<T: serde::de::DeserializeOwned>(&self, file: &str) -> FeedResult<T> {
        let path = self.dir.join(file);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| FeedError::Api(format!("{}: {}", display(&path), e)))?;
        serde_json::from_str(&raw).map_err(|e| FeedError::Parse(format!("{}: {}", display(&path), e)))
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[async_trait]
impl EventFeed for FixtureFeed {
    async fn find_game(&self) -> FeedResult<Option<GameRef>> {
        let score: ScoreNow = self.read("score.json").await?;
        Ok(score.find_team_game(self.team_id))
    }

    async fn fetch_event_state(&self, subject: &SubjectContext) -> FeedResult<EventState> {
        let boxscore: BoxScore = self.read("boxscore.json").await?;
        boxscore.event_state(subject)
    }

    async fn fetch_player_line(&self, subject: &SubjectContext) -> FeedResult<Option<PlayerLine>> {
        let boxscore: BoxScore = self.read("boxscore.json").await?;
        Ok(boxscore.player_line(subject.team_id, subject.sweater_number))
    }

    fn name(&self) -> &str {
        "fixture"
    }

    fn subject_for(&self, game_id: GameId) -> SubjectContext {
        SubjectContext {
            game_id,
            team_id: self.team_id,
            sweater_number: self.sweater_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::boxscore::tests::boxscore_json;

    fn write_fixtures(dir: &Path, game_state: &str) {
        std::fs::write(
            dir.join("score.json"),
            r#"{"games": [{"id": 2024020876, "gameState": "LIVE", "awayTeam": {"id": 3}, "homeTeam": {"id": 6}}]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("boxscore.json"),
            boxscore_json(game_state, Some("10:15")),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_fixture_feed_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path(), "LIVE");
        let feed = FixtureFeed::new(dir.path().to_path_buf(), 3, 73);

        let game = feed.find_game().await.unwrap().unwrap();
        assert_eq!(game.id, 2024020876);

        let subject = feed.subject_for(game.id);
        assert_eq!(
            feed.fetch_event_state(&subject).await.unwrap(),
            EventState::Live
        );

        // Edits are picked up on the next read
        write_fixtures(dir.path(), "OFF");
        assert_eq!(
            feed.fetch_event_state(&subject).await.unwrap(),
            EventState::Final {
                actual_toi: "10:15".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fixture_feed_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let feed = FixtureFeed::new(dir.path().to_path_buf(), 3, 73);
        assert!(matches!(feed.find_game().await, Err(FeedError::Api(_))));
    }

    #[tokio::test]
    async fn test_fixture_feed_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("score.json"), "{not json").unwrap();
        let feed = FixtureFeed::new(dir.path().to_path_buf(), 3, 73);
        assert!(matches!(feed.find_game().await, Err(FeedError::Parse(_))));
    }
}
