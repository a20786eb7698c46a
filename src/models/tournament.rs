//! Tournament record and bracket plan.

use crate::models::error::EngineError;
use crate::models::game::BestOf;
use crate::models::team::TeamId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a tournament.
pub type TournamentId = Uuid;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    SingleElimination,
    DoubleElimination,
    Swiss,
}

impl FromStr for Format {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "single-elimination" => Ok(Format::SingleElimination),
            "double-elimination" => Ok(Format::DoubleElimination),
            "swiss" => Ok(Format::Swiss),
            _ => Err(EngineError::UnknownFormat(s.to_string())),
        }
    }
}

/// Current phase of the tournament.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TournamentStatus {
    #[default]
    Draft,
    RegistrationOpen,
    InProgress,
    Completed,
}

/// How round-1 order is decided.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seeding {
    /// `teams` order is the ranking, best first.
    Ranked,
    /// Shuffle with the tournament seed.
    #[default]
    Random,
}

/// Swiss tie-break seed fixed when the bracket is built.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TeamSeed {
    pub team: TeamId,
    pub seed: u64,
}

/// Shape of the generated bracket, kept so downstream matches can be routed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BracketPlan {
    Elimination {
        /// Slot count, a power of two.
        size: u32,
        winners_rounds: u32,
        double: bool,
        grand_final_reset: bool,
    },
    Swiss {
        rounds: u32,
        tiebreak: Vec<TeamSeed>,
    },
}

/// Full tournament state as the engine sees it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub format: Format,
    pub best_of: BestOf,
    pub target_team_count: usize,
    /// Registered teams, in seeding order when `seeding` is ranked.
    pub teams: Vec<TeamId>,
    pub seeding: Seeding,
    pub status: TournamentStatus,
    /// Fixed RNG seed for shuffles, tie-breaks and coin flips.
    pub seed: u64,
    /// Swiss round count override; defaults to ceil(log2 N).
    pub swiss_rounds: Option<u32>,
    pub grand_final_reset: bool,
    pub plan: Option<BracketPlan>,
    /// Highest round generated so far (Swiss).
    pub current_round: u32,
    pub champion: Option<TeamId>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Tournament {
    /// Create a tournament open for registration with no teams.
    pub fn new(name: impl Into<String>, format: Format, best_of: BestOf, target_team_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            format,
            best_of,
            target_team_count,
            teams: Vec::new(),
            seeding: Seeding::Random,
            status: TournamentStatus::RegistrationOpen,
            seed: rand::random(),
            swiss_rounds: None,
            grand_final_reset: true,
            plan: None,
            current_round: 0,
            champion: None,
            version: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Create a tournament with initial teams. Still open for registration until started.
    pub fn with_teams(teams: Vec<TeamId>, format: Format, best_of: BestOf) -> Self {
        let target = teams.len();
        Self {
            teams,
            ..Self::new("Tournament", format, best_of, target)
        }
    }

    pub fn is_accepting_teams(&self) -> bool {
        matches!(
            self.status,
            TournamentStatus::Draft | TournamentStatus::RegistrationOpen
        )
    }
}
