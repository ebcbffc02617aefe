use crate::state::{AppState, SessionError};
use crate::types::{SessionId, SubjectContext};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Why a session poller stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerExit {
    /// This poller observed the terminal state and settled the session
    Settled,
    /// The finalizer (or a replacement) cancelled it
    Cancelled,
    /// The session was already locked or removed by someone else
    SessionGone,
}

/// Result of a single tick
#[derive(Debug, PartialEq, Eq)]
enum Tick {
    Continue,
    Stop(PollerExit),
}

/// Spawn the background poller for one session.
///
/// Waits one full interval before the first fetch, then keeps asking the feed until
/// the game reaches a terminal state or the token is cancelled. Fetch failures are
/// logged and retried on the next tick.
pub fn spawn_session_poller(
    state: Arc<AppState>,
    session_id: SessionId,
    subject: SubjectContext,
    cancel: CancellationToken,
) -> JoinHandle<PollerExit> {
    tokio::spawn(async move {
        let period = state.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(
            target: "poller",
            "Poller started for session {} (game {}, every {:?})",
            session_id,
            subject.game_id,
            period
        );

        let exit = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break PollerExit::Cancelled,
                _ = ticker.tick() => {
                    if let Tick::Stop(exit) = poll_once(&state, &session_id, &subject).await {
                        break exit;
                    }
                }
            }
        };

        tracing::debug!(target: "poller", "Poller for session {} stopped: {:?}", session_id, exit);
        exit
    })
}

async fn poll_once(state: &AppState, session_id: &str, subject: &SubjectContext) -> Tick {
    let event = match state.fetch_event_state(subject).await {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                target: "poller",
                "Fetch for session {} failed, retrying next tick: {}",
                session_id,
                e
            );
            return Tick::Continue;
        }
    };

    if !event.is_terminal() {
        tracing::debug!(target: "poller", "Session {}: game {:?}", session_id, event);
        return Tick::Continue;
    }

    match state.apply_event_state(session_id, event).await {
        Ok(Some(_)) => Tick::Stop(PollerExit::Settled),
        Ok(None) => Tick::Continue,
        Err(SessionError::SessionClosed | SessionError::NoActiveSession) => {
            Tick::Stop(PollerExit::SessionGone)
        }
        Err(e) => {
            // e.g. an unparseable final TOI; the box score may still be corrected
            tracing::warn!(
                target: "poller",
                "Could not settle session {}, retrying next tick: {}",
                session_id,
                e
            );
            Tick::Continue
        }
    }
}
