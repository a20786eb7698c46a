//! Esports tournament engine: brackets, match lifecycle and disputes.

pub mod config;
pub mod engine;
pub mod logic;
pub mod models;
pub mod notify;
pub mod store;

pub use config::{EngineSettings, ServerConfig, SideRule};
pub use engine::{Engine, NewTournament};
pub use logic::{Effect, Expected, MatchAction, Standing};
pub use models::{
    Actor, BestOf, BracketKind, DisputeDecision, EngineError, Format, Match, MatchId, MatchState,
    Outcome, Position, Score, Seeding, Side, Slot, Team, TeamId, TeamSlot, Tournament,
    TournamentId, TournamentStatus, UserId,
};
pub use notify::{EngineEvent, EventLog, LogNotifier, Notifier, RelayNotifier};
pub use store::{MemoryStore, Store, TeamDirectory, TeamRegistry};
