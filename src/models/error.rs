//! Typed errors returned by every engine operation.

use crate::models::game::{MatchId, MatchState};
use crate::models::team::TeamId;
use crate::models::tournament::{TournamentId, TournamentStatus};

/// Errors that can occur during tournament and match operations.
///
/// A failed operation never leaves a partial write behind; the stored match or
/// tournament is exactly what it was before the call.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// A team tried to act during the opponent's veto turn or side pick.
    #[error("it is not team {0}'s turn")]
    OutOfTurn(TeamId),
    /// Map is unknown or was already banned.
    #[error("map {0:?} is not available")]
    InvalidMap(String),
    /// The action is not valid from the match's current state.
    #[error("cannot {action} while the match is {state}")]
    InvalidTransition {
        state: MatchState,
        action: &'static str,
    },
    #[error("cannot {action} while the tournament is {status:?}")]
    InvalidTournamentState {
        status: TournamentStatus,
        action: &'static str,
    },
    /// The stored record moved on since the caller read it. Re-read and retry.
    #[error("stale state: expected version {expected}, found {found}")]
    StaleState { expected: u64, found: u64 },
    /// Actor is not a participant, or lacks admin privilege.
    #[error("actor is not allowed to perform this action")]
    Unauthorized,
    #[error("team {team} has {active} active players, 5 are required")]
    InsufficientRoster { team: TeamId, active: usize },
    #[error("need at least 2 teams to build a bracket, got {0}")]
    InsufficientTeams(usize),
    #[error("tied scores are not accepted")]
    TieScoreRejected,
    /// The match already has an unresolved dispute.
    #[error("match already has an open dispute")]
    DuplicateDispute,
    #[error("team {0} appears more than once")]
    DuplicateTeam(TeamId),
    #[error("team tag {0:?} is already taken in this tournament")]
    DuplicateTag(String),
    #[error("team tag {0:?} must be 1 to 5 characters")]
    InvalidTag(String),
    #[error("unknown tournament format {0:?}")]
    UnknownFormat(String),
    #[error("team {0} is not registered")]
    TeamNotRegistered(TeamId),
    #[error("{registered} of {target} teams registered")]
    TargetNotReached { registered: usize, target: usize },
    /// The ready-up deadline has not passed yet.
    #[error("ready-up window is still open")]
    ReadyWindowOpen,
    /// A downstream slot already holds a different entry than the one being advanced.
    #[error("slot in match {0} already holds a different entry")]
    SlotConflict(MatchId),
    #[error("invalid map pool: {0}")]
    InvalidMapPool(String),
    #[error("match {0} not found")]
    MatchNotFound(MatchId),
    #[error("tournament {0} not found")]
    TournamentNotFound(TournamentId),
    #[error("team {0} not found")]
    TeamNotFound(TeamId),
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Only concurrent-write conflicts are worth retrying automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::StaleState { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::MatchNotFound(_)
                | EngineError::TournamentNotFound(_)
                | EngineError::TeamNotFound(_)
        )
    }
}
