//! Events published after a successful commit, and the sinks that receive them.
//!
//! The engine only emits; delivery, retries and formatting belong to the relay.

use crate::models::{MatchId, MatchState, TeamId, TournamentId, UserId};
use crate::store::TeamDirectory;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    MatchStateChanged {
        tournament_id: TournamentId,
        match_id: MatchId,
        from: MatchState,
        to: MatchState,
        version: u64,
        teams: Vec<TeamId>,
    },
    DisputeOpened {
        tournament_id: TournamentId,
        match_id: MatchId,
        reason: String,
        teams: Vec<TeamId>,
    },
    DisputeResolved {
        tournament_id: TournamentId,
        match_id: MatchId,
        admin: UserId,
        note: String,
        teams: Vec<TeamId>,
    },
    RoundGenerated {
        tournament_id: TournamentId,
        round: u32,
        matches: usize,
    },
    TournamentCompleted {
        tournament_id: TournamentId,
        champion: Option<TeamId>,
    },
}

impl EngineEvent {
    /// Teams whose captains should hear about this event.
    pub fn teams(&self) -> &[TeamId] {
        match self {
            EngineEvent::MatchStateChanged { teams, .. }
            | EngineEvent::DisputeOpened { teams, .. }
            | EngineEvent::DisputeResolved { teams, .. } => teams,
            EngineEvent::RoundGenerated { .. } => &[],
            EngineEvent::TournamentCompleted { champion, .. } => champion.as_slice(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            EngineEvent::MatchStateChanged { .. } => "Match update",
            EngineEvent::DisputeOpened { .. } => "Dispute opened",
            EngineEvent::DisputeResolved { .. } => "Dispute resolved",
            EngineEvent::RoundGenerated { .. } => "New round",
            EngineEvent::TournamentCompleted { .. } => "Tournament complete",
        }
    }

    pub fn message(&self) -> String {
        match self {
            EngineEvent::MatchStateChanged {
                match_id, from, to, ..
            } => format!("Match {match_id} moved from {from} to {to}"),
            EngineEvent::DisputeOpened {
                match_id, reason, ..
            } => format!("Match {match_id} is disputed: {reason}"),
            EngineEvent::DisputeResolved { match_id, note, .. } => {
                format!("Dispute on match {match_id} resolved: {note}")
            }
            EngineEvent::RoundGenerated { round, matches, .. } => {
                format!("Round {round} is up with {matches} matches")
            }
            EngineEvent::TournamentCompleted { tournament_id, .. } => {
                format!("Tournament {tournament_id} is complete")
            }
        }
    }
}

/// Receives committed events. Implementations must not block the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &EngineEvent);
}

/// Writes events to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &EngineEvent) {
        log::info!("{}: {}", event.title(), event.message());
    }
}

/// Keeps every event in memory, oldest first.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<EngineEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl Notifier for EventLog {
    fn notify(&self, event: &EngineEvent) {
        if let Ok(mut g) = self.events.lock() {
            g.push(event.clone());
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest {
    user_ids: Vec<String>,
    title: String,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct RelayResults {
    #[serde(default)]
    success: Vec<String>,
    #[serde(default)]
    failed: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    success: bool,
    #[serde(default)]
    results: RelayResults,
}

/// Forwards events to the notification relay's HTTP endpoint, best effort.
///
/// Must be created inside a tokio runtime; posting happens on a background task.
pub struct RelayNotifier {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl RelayNotifier {
    pub fn spawn(base_url: &str, teams: Arc<dyn TeamDirectory>) -> Self {
        let url = format!(
            "{}/api/send-discord-notification",
            base_url.trim_end_matches('/')
        );
        let (tx, mut rx) = mpsc::unbounded_channel::<EngineEvent>();
        let client = reqwest::Client::new();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let user_ids: Vec<String> = event
                    .teams()
                    .iter()
                    .filter_map(|id| teams.team(*id).ok())
                    .map(|t| t.captain.to_string())
                    .collect();
                if user_ids.is_empty() {
                    continue;
                }
                let body = RelayRequest {
                    user_ids,
                    title: event.title().to_string(),
                    message: event.message(),
                };
                match client.post(&url).json(&body).send().await {
                    Ok(resp) => match resp.json::<RelayResponse>().await {
                        Ok(r) if r.success && r.results.failed.is_empty() => {
                            log::debug!("Relay delivered to {} recipient(s)", r.results.success.len())
                        }
                        Ok(r) => log::warn!(
                            "Relay delivery failed for {} recipient(s)",
                            r.results.failed.len()
                        ),
                        Err(e) => log::warn!("Relay returned an unreadable response: {}", e),
                    },
                    Err(e) => log::warn!("Relay request failed: {}", e),
                }
            }
        });
        Self { tx }
    }
}

impl Notifier for RelayNotifier {
    fn notify(&self, event: &EngineEvent) {
        log::info!("{}: {}", event.title(), event.message());
        if self.tx.send(event.clone()).is_err() {
            log::warn!("Relay task is gone; dropping event");
        }
    }
}
