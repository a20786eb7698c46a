//! Data structures for the tournament engine: teams, matches, disputes, tournament state.

mod actor;
mod dispute;
mod error;
mod game;
mod team;
mod tournament;
mod veto;

pub use actor::Actor;
pub use dispute::{Dispute, DisputeDecision, Resolution};
pub use error::EngineError;
pub use game::{
    BestOf, BracketKind, Match, MatchId, MatchState, Outcome, Position, Score, Slot, TeamSlot,
};
pub use team::{RosterEntry, RosterRole, Team, TeamId, UserId, ACTIVE_ROSTER_SIZE, MAX_TAG_LEN};
pub use tournament::{
    BracketPlan, Format, Seeding, TeamSeed, Tournament, TournamentId, TournamentStatus,
};
pub use veto::{MapPool, Side, SideAssignment, VetoAction, VetoEntry, VetoTurn, STANDARD_MAPS};
