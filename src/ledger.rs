//! Durable history of prompts and their results.
//!
//! Every opened session gets an entry; the finalizer fills in its record. The ledger
//! feeds the leaderboard and lets a moderator backfill results for sessions that were
//! lost before the game ended (e.g. across a restart). It can be written out as a
//! pretty-printed JSON snapshot.

use crate::feed::{GameRef, REGULAR_SEASON};
use crate::state::resolve::outcome_for;
use crate::toi::{parse_toi, ToiError};
use crate::types::*;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Schema version for ledger snapshots
/// Version 1: initial format
pub const LEDGER_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Ledger schema version {0} is newer than supported version {max}", max = LEDGER_SCHEMA_VERSION)]
    UnsupportedSchema(u32),

    #[error("No pending prompt found for that date and time on ice")]
    NothingToBackfill,

    #[error("{0} pending prompts match; cannot pick one")]
    AmbiguousBackfill(usize),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Malformed time on ice: {0}")]
    Toi(#[from] ToiError),
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidDate(_) | LedgerError::Toi(_) => "MALFORMED_INPUT",
            LedgerError::NothingToBackfill => "NOTHING_TO_BACKFILL",
            LedgerError::AmbiguousBackfill(_) => "AMBIGUOUS_BACKFILL",
            _ => "LEDGER_ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub session_id: SessionId,
    pub channel_id: ChannelId,
    /// Unknown when a record arrives for a session that was never opened here
    pub game_id: Option<GameId>,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub game_type: Option<u32>,
    pub environment: Environment,
    pub prompt_toi: String,
    pub prompt_seconds: u32,
    pub opened_at: String,
    /// None while the session is pending
    pub record: Option<SessionRecord>,
    #[serde(default)]
    pub backfilled: bool,
}

impl LedgerEntry {
    fn finalized(&self) -> Option<&FinalizedResult> {
        match &self.record {
            Some(SessionRecord::Finalized(r)) => Some(r),
            _ => None,
        }
    }

    fn counts_toward(&self, season: Option<u32>, include_preseason: bool) -> bool {
        let in_season = season.is_none() || self.season == season;
        let game_type_ok = include_preseason || self.game_type == Some(REGULAR_SEASON);
        in_season && game_type_ok
    }

    fn opened_on(&self) -> Option<NaiveDate> {
        DateTime::parse_from_rfc3339(&self.opened_at)
            .ok()
            .map(|t| t.with_timezone(&Utc).date_naive())
    }
}

/// Serializable form of the whole ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub schema_version: u32,
    /// Snapshot timestamp (ISO8601)
    pub exported_at: String,
    pub entries: Vec<LedgerEntry>,
}

impl LedgerSnapshot {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.schema_version > LEDGER_SCHEMA_VERSION {
            return Err(LedgerError::UnsupportedSchema(self.schema_version));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: UserId,
    pub wins: u32,
}

/// Which finalized sessions a leaderboard counts
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardFilter {
    /// Defaults to the latest season in the ledger
    #[serde(default)]
    pub season: Option<u32>,
    /// Count preseason (and playoff) games too; regular season only otherwise
    #[serde(default)]
    pub include_preseason: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Leaderboard {
    pub environment: Environment,
    /// None when no recorded game carries a season
    pub season: Option<u32>,
    pub include_preseason: bool,
    pub entries: Vec<LeaderboardEntry>,
    /// Finalized sessions, pushes included
    pub games_completed: u32,
    pub votes_cast: u32,
}

/// Moderator-supplied result for a session whose votes were lost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillRequest {
    /// UTC day the prompt was opened, `YYYY-MM-DD`
    pub date: String,
    pub prompt_toi: String,
    pub actual_toi: String,
    #[serde(default)]
    pub winners: Vec<UserId>,
}

pub struct Ledger {
    entries: RwLock<Vec<LedgerEntry>>,
    path: Option<PathBuf>,
    environment: Environment,
}

impl Ledger {
    pub fn in_memory(environment: Environment) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            path: None,
            environment,
        }
    }

    /// Open the ledger file at `path`, starting empty if it does not exist yet
    pub async fn load(path: impl AsRef<Path>, environment: Environment) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let snapshot: LedgerSnapshot = serde_json::from_str(&raw)?;
                snapshot.validate()?;
                tracing::info!(
                    "Loaded {} ledger entries from {}",
                    snapshot.entries.len(),
                    path.display()
                );
                snapshot.entries
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No ledger at {}, starting fresh", path.display());
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path),
            environment,
        })
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Record a freshly opened session as pending
    pub async fn open(&self, session: &VoteSession, game: &GameRef) -> Result<(), LedgerError> {
        let mut entries = self.entries.write().await;
        entries.retain(|e| !(e.session_id == session.session_id && e.record.is_none()));
        entries.push(LedgerEntry {
            session_id: session.session_id.clone(),
            channel_id: session.channel_id.clone(),
            game_id: Some(session.subject.game_id),
            season: game.season,
            game_type: game.game_type,
            environment: self.environment,
            prompt_toi: session.prompt_toi.clone(),
            prompt_seconds: session.prompt_seconds,
            opened_at: session.created_at.clone(),
            record: None,
            backfilled: false,
        });
        self.persist(&entries).await
    }

    /// Attach the finalizer's record to the session's pending entry
    pub async fn record(&self, record: SessionRecord) -> Result<(), LedgerError> {
        let mut entries = self.entries.write().await;

        let pending = entries
            .iter_mut()
            .rev()
            .find(|e| e.session_id == record.session_id() && e.record.is_none());

        match pending {
            Some(entry) => entry.record = Some(record),
            None => {
                let (channel_id, prompt_seconds) = match &record {
                    SessionRecord::Finalized(r) => (r.channel_id.clone(), r.resolution.prompt_seconds),
                    SessionRecord::Cancelled(r) => (r.channel_id.clone(), r.prompt_seconds),
                };
                entries.push(LedgerEntry {
                    session_id: record.session_id().to_string(),
                    channel_id,
                    game_id: None,
                    season: None,
                    game_type: None,
                    environment: self.environment,
                    prompt_toi: crate::toi::format_toi(prompt_seconds),
                    prompt_seconds,
                    opened_at: Utc::now().to_rfc3339(),
                    record: Some(record),
                    backfilled: false,
                });
            }
        }

        self.persist(&entries).await
    }

    /// Wins per user over finalized sessions of one environment and season
    pub async fn leaderboard(
        &self,
        environment: Environment,
        filter: LeaderboardFilter,
        limit: usize,
    ) -> Leaderboard {
        let entries = self.entries.read().await;

        let season = filter.season.or_else(|| {
            entries
                .iter()
                .filter(|e| e.environment == environment)
                .filter_map(|e| e.season)
                .max()
        });

        let mut wins: HashMap<&str, u32> = HashMap::new();
        let mut games_completed = 0;
        let mut votes_cast = 0;

        for result in entries
            .iter()
            .filter(|e| e.environment == environment)
            .filter(|e| e.counts_toward(season, filter.include_preseason))
            .filter_map(|e| e.finalized())
        {
            games_completed += 1;
            votes_cast += result.votes_cast;
            for winner in &result.resolution.winners {
                *wins.entry(winner.as_str()).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(&str, u32)> = wins.into_iter().collect();
        // Sort by wins descending, then by user id for a stable order
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        Leaderboard {
            environment,
            season,
            include_preseason: filter.include_preseason,
            entries: ranked
                .into_iter()
                .take(limit)
                .enumerate()
                .map(|(i, (user_id, wins))| LeaderboardEntry {
                    rank: i + 1,
                    user_id: user_id.to_string(),
                    wins,
                })
                .collect(),
            games_completed,
            votes_cast,
        }
    }

    /// Settle a lost session by hand. Sessions still open in this process are skipped.
    pub async fn backfill(
        &self,
        request: &BackfillRequest,
        open_sessions: &HashSet<SessionId>,
    ) -> Result<FinalizedResult, LedgerError> {
        let date = NaiveDate::parse_from_str(request.date.trim(), "%Y-%m-%d")
            .map_err(|_| LedgerError::InvalidDate(request.date.clone()))?;
        let prompt_seconds = parse_toi(&request.prompt_toi)?;
        let actual_seconds = parse_toi(&request.actual_toi)?;

        let mut entries = self.entries.write().await;

        let candidates: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                e.record.is_none()
                    && e.environment == self.environment
                    && e.prompt_seconds == prompt_seconds
                    && e.opened_on() == Some(date)
                    && !open_sessions.contains(&e.session_id)
            })
            .map(|(i, _)| i)
            .collect();

        let index = match candidates.as_slice() {
            [] => return Err(LedgerError::NothingToBackfill),
            [index] => *index,
            many => return Err(LedgerError::AmbiguousBackfill(many.len())),
        };

        let outcome = outcome_for(prompt_seconds, actual_seconds);
        let winners: BTreeSet<UserId> = match outcome {
            Outcome::Push => BTreeSet::new(),
            _ => request
                .winners
                .iter()
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty())
                .collect(),
        };

        let entry = &mut entries[index];
        let result = FinalizedResult {
            session_id: entry.session_id.clone(),
            channel_id: entry.channel_id.clone(),
            resolution: Resolution {
                prompt_seconds,
                actual_seconds,
                outcome,
                winners,
            },
            votes_cast: 0,
            finalized_at: Utc::now().to_rfc3339(),
        };
        entry.record = Some(SessionRecord::Finalized(result.clone()));
        entry.backfilled = true;

        tracing::info!(
            "Backfilled session {} from {}: {:?} with {} winners",
            result.session_id,
            request.date,
            outcome,
            result.resolution.winners.len()
        );

        self.persist(&entries).await?;
        Ok(result)
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            schema_version: LEDGER_SCHEMA_VERSION,
            exported_at: Utc::now().to_rfc3339(),
            entries: self.entries.read().await.clone(),
        }
    }

    /// Write entries to disk via a temp file and rename; no-op for in-memory ledgers
    async fn persist(&self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let snapshot = LedgerSnapshot {
            schema_version: LEDGER_SCHEMA_VERSION,
            exported_at: Utc::now().to_rfc3339(),
            entries: entries.to_vec(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, toi: &str, seconds: u32) -> VoteSession {
        let mut s = VoteSession::new(
            "c1".to_string(),
            id.to_string(),
            toi.to_string(),
            seconds,
            SubjectContext {
                game_id: 2024020876,
                team_id: 3,
                sweater_number: 73,
            },
        );
        s.created_at = "2025-01-15T01:30:00+00:00".to_string();
        s
    }

    fn game(season: u32, game_type: u32) -> GameRef {
        GameRef {
            id: 2024020876,
            game_state: "FUT".to_string(),
            season: Some(season),
            game_type: Some(game_type),
        }
    }

    fn regular() -> GameRef {
        game(20242025, REGULAR_SEASON)
    }

    fn finalized(id: &str, winners: &[&str], outcome: Outcome, votes: u32) -> SessionRecord {
        SessionRecord::Finalized(FinalizedResult {
            session_id: id.to_string(),
            channel_id: "c1".to_string(),
            resolution: Resolution {
                prompt_seconds: 588,
                actual_seconds: 600,
                outcome,
                winners: winners.iter().map(|w| w.to_string()).collect(),
            },
            votes_cast: votes,
            finalized_at: Utc::now().to_rfc3339(),
        })
    }

    fn backfill_request(date: &str, prompt: &str, actual: &str, winners: &[&str]) -> BackfillRequest {
        BackfillRequest {
            date: date.to_string(),
            prompt_toi: prompt.to_string(),
            actual_toi: actual.to_string(),
            winners: winners.iter().map(|w| w.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_record_fills_pending_entry() {
        let ledger = Ledger::in_memory(Environment::Test);
        ledger.open(&session("m1", "9:48", 588), &regular()).await.unwrap();
        ledger
            .record(finalized("m1", &["a"], Outcome::Over, 2))
            .await
            .unwrap();

        let entries = ledger.snapshot().await.entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].game_id, Some(2024020876));
        assert!(entries[0].finalized().is_some());
    }

    #[tokio::test]
    async fn test_record_without_open_inserts_entry() {
        let ledger = Ledger::in_memory(Environment::Test);
        ledger
            .record(finalized("m9", &[], Outcome::Push, 0))
            .await
            .unwrap();

        let entries = ledger.snapshot().await.entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].game_id, None);
        assert_eq!(entries[0].prompt_toi, "9:48");
    }

    #[tokio::test]
    async fn test_leaderboard_ranks_by_wins() {
        let ledger = Ledger::in_memory(Environment::Production);
        for (id, winners) in [
            ("m1", vec!["bob", "amy"]),
            ("m2", vec!["amy"]),
            ("m3", vec!["cat", "bob"]),
        ] {
            ledger.open(&session(id, "9:48", 588), &regular()).await.unwrap();
            ledger
                .record(finalized(id, &winners, Outcome::Over, 3))
                .await
                .unwrap();
        }
        ledger.open(&session("m4", "9:48", 588), &regular()).await.unwrap();
        ledger
            .record(SessionRecord::Cancelled(CancellationRecord {
                session_id: "m4".to_string(),
                channel_id: "c1".to_string(),
                prompt_seconds: 588,
                reason: CancelReason::SubjectAbsent,
                cancelled_at: Utc::now().to_rfc3339(),
            }))
            .await
            .unwrap();

        let board = ledger
            .leaderboard(Environment::Production, LeaderboardFilter::default(), 10)
            .await;
        assert_eq!(board.games_completed, 3);
        assert_eq!(board.votes_cast, 9);
        let order: Vec<_> = board
            .entries
            .iter()
            .map(|e| (e.rank, e.user_id.as_str(), e.wins))
            .collect();
        assert_eq!(order, vec![(1, "amy", 2), (2, "bob", 2), (3, "cat", 1)]);

        let top = ledger
            .leaderboard(Environment::Production, LeaderboardFilter::default(), 1)
            .await;
        assert_eq!(top.entries.len(), 1);

        let other = ledger
            .leaderboard(Environment::Test, LeaderboardFilter::default(), 10)
            .await;
        assert!(other.entries.is_empty());
        assert_eq!(other.games_completed, 0);
    }

    #[tokio::test]
    async fn test_leaderboard_scoped_to_season_and_regular_games() {
        let ledger = Ledger::in_memory(Environment::Production);
        for (id, game, winner) in [
            ("m1", game(20232024, REGULAR_SEASON), "old"),
            ("m2", game(20242025, 1), "pre"),
            ("m3", game(20242025, REGULAR_SEASON), "amy"),
            ("m4", game(20242025, 3), "playoff"),
        ] {
            ledger.open(&session(id, "9:48", 588), &game).await.unwrap();
            ledger
                .record(finalized(id, &[winner], Outcome::Over, 1))
                .await
                .unwrap();
        }

        // Latest season, regular season games only
        let board = ledger
            .leaderboard(Environment::Production, LeaderboardFilter::default(), 10)
            .await;
        assert_eq!(board.season, Some(20242025));
        assert!(!board.include_preseason);
        assert_eq!(board.games_completed, 1);
        let users: Vec<_> = board.entries.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(users, vec!["amy"]);

        let with_preseason = LeaderboardFilter {
            season: None,
            include_preseason: true,
        };
        let board = ledger
            .leaderboard(Environment::Production, with_preseason, 10)
            .await;
        assert_eq!(board.games_completed, 3);
        assert!(board.entries.iter().all(|e| e.user_id != "old"));

        let last_season = LeaderboardFilter {
            season: Some(20232024),
            include_preseason: false,
        };
        let board = ledger
            .leaderboard(Environment::Production, last_season, 10)
            .await;
        assert_eq!(board.season, Some(20232024));
        assert_eq!(board.entries[0].user_id, "old");
        assert_eq!(board.games_completed, 1);
    }

    #[tokio::test]
    async fn test_backfill_pending_entry() {
        let ledger = Ledger::in_memory(Environment::Test);
        ledger.open(&session("m1", "9:48", 588), &regular()).await.unwrap();

        let result = ledger
            .backfill(
                &backfill_request("2025-01-15", "9:48", "10:15", &["u1", " u2 "]),
                &HashSet::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.session_id, "m1");
        assert_eq!(result.resolution.outcome, Outcome::Over);
        assert_eq!(result.resolution.winners.len(), 2);
        assert!(result.resolution.winners.contains("u2"));
        assert_eq!(result.votes_cast, 0);

        let entries = ledger.snapshot().await.entries;
        assert!(entries[0].backfilled);

        // Already settled now
        let again = ledger
            .backfill(
                &backfill_request("2025-01-15", "9:48", "10:15", &["u1"]),
                &HashSet::new(),
            )
            .await;
        assert!(matches!(again, Err(LedgerError::NothingToBackfill)));
    }

    #[tokio::test]
    async fn test_backfill_push_ignores_winners() {
        let ledger = Ledger::in_memory(Environment::Test);
        ledger.open(&session("m1", "9:48", 588), &regular()).await.unwrap();

        let result = ledger
            .backfill(
                &backfill_request("2025-01-15", "9:48", "9:48", &["u1"]),
                &HashSet::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.resolution.outcome, Outcome::Push);
        assert!(result.resolution.winners.is_empty());
    }

    #[tokio::test]
    async fn test_backfill_errors() {
        let ledger = Ledger::in_memory(Environment::Test);
        ledger.open(&session("m1", "9:48", 588), &regular()).await.unwrap();
        ledger.open(&session("m2", "9:48", 588), &regular()).await.unwrap();

        let open: HashSet<SessionId> = HashSet::new();
        assert!(matches!(
            ledger
                .backfill(&backfill_request("15/01/2025", "9:48", "9:50", &[]), &open)
                .await,
            Err(LedgerError::InvalidDate(_))
        ));
        assert!(matches!(
            ledger
                .backfill(&backfill_request("2025-01-15", "948", "9:50", &[]), &open)
                .await,
            Err(LedgerError::Toi(_))
        ));
        assert!(matches!(
            ledger
                .backfill(&backfill_request("2025-01-16", "9:48", "9:50", &[]), &open)
                .await,
            Err(LedgerError::NothingToBackfill)
        ));
        assert!(matches!(
            ledger
                .backfill(&backfill_request("2025-01-15", "9:48", "9:50", &[]), &open)
                .await,
            Err(LedgerError::AmbiguousBackfill(2))
        ));
        assert_eq!(LedgerError::AmbiguousBackfill(2).code(), "AMBIGUOUS_BACKFILL");
        assert_eq!(LedgerError::NothingToBackfill.code(), "NOTHING_TO_BACKFILL");

        // Excluding the live one leaves a single candidate
        let open: HashSet<SessionId> = ["m2".to_string()].into_iter().collect();
        let result = ledger
            .backfill(&backfill_request("2025-01-15", "9:48", "9:50", &[]), &open)
            .await
            .unwrap();
        assert_eq!(result.session_id, "m1");
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let ledger = Ledger::load(&path, Environment::Development).await.unwrap();
        ledger.open(&session("m1", "9:48", 588), &regular()).await.unwrap();
        ledger
            .record(finalized("m1", &["a"], Outcome::Over, 1))
            .await
            .unwrap();

        let reloaded = Ledger::load(&path, Environment::Development).await.unwrap();
        let entries = reloaded.snapshot().await.entries;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].finalized().unwrap().resolution.winners.contains("a"));
        assert!(!dir.path().join("ledger.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let snapshot = LedgerSnapshot {
            schema_version: LEDGER_SCHEMA_VERSION + 1,
            exported_at: Utc::now().to_rfc3339(),
            entries: Vec::new(),
        };
        std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

        let result = Ledger::load(&path, Environment::Test).await;
        assert!(matches!(result, Err(LedgerError::UnsupportedSchema(_))));
    }
}
