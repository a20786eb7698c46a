//! Match, its slots, scores and lifecycle state.

use crate::models::dispute::Dispute;
use crate::models::team::TeamId;
use crate::models::tournament::TournamentId;
use crate::models::veto::{SideAssignment, VetoEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a match.
pub type MatchId = Uuid;

/// Which side of a match a team occupies.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSlot {
    #[default]
    One,
    Two,
}

impl TeamSlot {
    pub fn other(self) -> Self {
        match self {
            TeamSlot::One => TeamSlot::Two,
            TeamSlot::Two => TeamSlot::One,
        }
    }

    pub fn index(self) -> usize {
        match self {
            TeamSlot::One => 0,
            TeamSlot::Two => 1,
        }
    }
}

/// Occupant of a match slot.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// Waiting on an upstream result.
    #[default]
    Tbd,
    Team(TeamId),
    /// Nobody will ever fill this slot.
    Bye,
}

impl Slot {
    pub fn team(self) -> Option<TeamId> {
        match self {
            Slot::Team(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_resolved(self) -> bool {
        !matches!(self, Slot::Tbd)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum BestOf {
    #[default]
    #[serde(rename = "bo1")]
    Bo1,
    #[serde(rename = "bo3")]
    Bo3,
}

impl BestOf {
    /// Maps left on the board when the veto ends.
    pub fn maps_after_veto(self) -> usize {
        match self {
            BestOf::Bo1 => 1,
            BestOf::Bo3 => 3,
        }
    }

    /// Maps a team must win to take the series; used for walkover scores.
    pub fn maps_to_win(self) -> u32 {
        match self {
            BestOf::Bo1 => 1,
            BestOf::Bo3 => 2,
        }
    }
}

/// Lifecycle state of a match.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    #[default]
    Scheduled,
    ReadyUp,
    MapBanning,
    SideSelection,
    Playing,
    WaitingResults,
    Disputed,
    Complete,
    /// Voided: admin cancel, or both slots were byes.
    Cancelled,
}

impl MatchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchState::Complete | MatchState::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchState::Scheduled => "scheduled",
            MatchState::ReadyUp => "ready_up",
            MatchState::MapBanning => "map_banning",
            MatchState::SideSelection => "side_selection",
            MatchState::Playing => "playing",
            MatchState::WaitingResults => "waiting_results",
            MatchState::Disputed => "disputed",
            MatchState::Complete => "complete",
            MatchState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score as (team 1, team 2).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub team_1: u32,
    pub team_2: u32,
}

impl Score {
    pub fn new(team_1: u32, team_2: u32) -> Self {
        Self { team_1, team_2 }
    }

    /// Winning slot, or None on a tie.
    pub fn winner(self) -> Option<TeamSlot> {
        match self.team_1.cmp(&self.team_2) {
            std::cmp::Ordering::Greater => Some(TeamSlot::One),
            std::cmp::Ordering::Less => Some(TeamSlot::Two),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Walkover score in favour of `winner`.
    pub fn walkover(winner: TeamSlot, best_of: BestOf) -> Self {
        let w = best_of.maps_to_win();
        match winner {
            TeamSlot::One => Self::new(w, 0),
            TeamSlot::Two => Self::new(0, w),
        }
    }
}

/// How a complete match was decided.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Both teams reported the same score.
    Played,
    /// Ready-up timeout or admin forfeit.
    Walkover,
    /// Opponent slot was empty.
    Bye,
    /// Admin imposed the score on a dispute.
    AdminDecision,
    /// No result; the match was cancelled.
    Void,
}

/// Which part of the bracket a match belongs to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketKind {
    Winners,
    Losers,
    GrandFinal,
    Swiss,
}

impl BracketKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BracketKind::Winners => "winners",
            BracketKind::Losers => "losers",
            BracketKind::GrandFinal => "grand_final",
            BracketKind::Swiss => "swiss",
        }
    }
}

/// Location of a match in the bracket. Rounds are 1-based, indices 0-based.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Position {
    pub bracket: BracketKind,
    pub round: u32,
    pub index: u32,
}

impl Position {
    pub fn new(bracket: BracketKind, round: u32, index: u32) -> Self {
        Self {
            bracket,
            round,
            index,
        }
    }

    /// Stable id for the match at this position, so re-creating it is idempotent.
    pub fn match_id(&self, tournament: TournamentId) -> MatchId {
        let key = format!("{}:{}:{}", self.bracket.as_str(), self.round, self.index);
        Uuid::new_v5(&tournament, key.as_bytes())
    }
}

/// A single match between two slots.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub position: Position,
    /// 1-based display number within the round.
    pub number: u32,
    pub best_of: BestOf,
    pub team_1: Slot,
    pub team_2: Slot,
    pub state: MatchState,
    /// Bumped on every committed write; compare-and-swap key.
    pub version: u64,
    pub ready_1: bool,
    pub ready_2: bool,
    /// Forfeit deadline while in ready-up.
    pub ready_deadline: Option<DateTime<Utc>>,
    /// Pool snapshot taken when the veto starts.
    pub map_pool: Vec<String>,
    pub veto: Vec<VetoEntry>,
    /// Maps left after the veto; the series map list.
    pub maps: Vec<String>,
    pub side_chooser: Option<TeamSlot>,
    pub sides: Option<SideAssignment>,
    /// Each team's own score report; never shared.
    pub submission_1: Option<Score>,
    pub submission_2: Option<Score>,
    pub score: Option<Score>,
    pub winner: Option<TeamId>,
    pub outcome: Option<Outcome>,
    /// Every dispute ever opened, oldest first. The open one, if any, is last.
    pub disputes: Vec<Dispute>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Match {
    /// A scheduled match at `position` with the given slots.
    pub fn new(
        tournament_id: TournamentId,
        position: Position,
        best_of: BestOf,
        team_1: Slot,
        team_2: Slot,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: position.match_id(tournament_id),
            tournament_id,
            position,
            number: position.index + 1,
            best_of,
            team_1,
            team_2,
            state: MatchState::Scheduled,
            version: 0,
            ready_1: false,
            ready_2: false,
            ready_deadline: None,
            map_pool: Vec::new(),
            veto: Vec::new(),
            maps: Vec::new(),
            side_chooser: None,
            sides: None,
            submission_1: None,
            submission_2: None,
            score: None,
            winner: None,
            outcome: None,
            disputes: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// A match that is already decided because one slot is empty.
    pub fn bye(
        tournament_id: TournamentId,
        position: Position,
        best_of: BestOf,
        team: TeamId,
        now: DateTime<Utc>,
    ) -> Self {
        let mut m = Self::new(
            tournament_id,
            position,
            best_of,
            Slot::Team(team),
            Slot::Bye,
            now,
        );
        m.settle_slots(now);
        m
    }

    pub fn slot(&self, slot: TeamSlot) -> Slot {
        match slot {
            TeamSlot::One => self.team_1,
            TeamSlot::Two => self.team_2,
        }
    }

    pub fn set_slot(&mut self, slot: TeamSlot, value: Slot) {
        match slot {
            TeamSlot::One => self.team_1 = value,
            TeamSlot::Two => self.team_2 = value,
        }
    }

    pub fn team(&self, slot: TeamSlot) -> Option<TeamId> {
        self.slot(slot).team()
    }

    /// Slot `team` plays in, if it is in this match.
    pub fn slot_of(&self, team: TeamId) -> Option<TeamSlot> {
        if self.team_1 == Slot::Team(team) {
            Some(TeamSlot::One)
        } else if self.team_2 == Slot::Team(team) {
            Some(TeamSlot::Two)
        } else {
            None
        }
    }

    /// Both teams, when both slots hold one.
    pub fn teams(&self) -> Option<(TeamId, TeamId)> {
        Some((self.team_1.team()?, self.team_2.team()?))
    }

    pub fn is_ready(&self, slot: TeamSlot) -> bool {
        match slot {
            TeamSlot::One => self.ready_1,
            TeamSlot::Two => self.ready_2,
        }
    }

    pub fn set_ready(&mut self, slot: TeamSlot, ready: bool) {
        match slot {
            TeamSlot::One => self.ready_1 = ready,
            TeamSlot::Two => self.ready_2 = ready,
        }
    }

    pub fn submission(&self, slot: TeamSlot) -> Option<Score> {
        match slot {
            TeamSlot::One => self.submission_1,
            TeamSlot::Two => self.submission_2,
        }
    }

    pub fn set_submission(&mut self, slot: TeamSlot, score: Option<Score>) {
        match slot {
            TeamSlot::One => self.submission_1 = score,
            TeamSlot::Two => self.submission_2 = score,
        }
    }

    pub fn open_dispute(&self) -> Option<&Dispute> {
        self.disputes.last().filter(|d| d.is_open())
    }

    pub fn open_dispute_mut(&mut self) -> Option<&mut Dispute> {
        self.disputes.last_mut().filter(|d| d.is_open())
    }

    /// Slot of the winner, when the match is complete.
    pub fn winner_slot(&self) -> Option<TeamSlot> {
        self.slot_of(self.winner?)
    }

    /// Loser of a complete match that had two teams.
    pub fn loser(&self) -> Option<TeamId> {
        self.team(self.winner_slot()?.other())
    }

    /// Mark complete with `score`. Winner follows the score; callers reject ties first.
    pub fn finish(&mut self, score: Score, outcome: Outcome, now: DateTime<Utc>) {
        self.winner = score.winner().and_then(|s| self.team(s));
        self.score = Some(score);
        self.outcome = Some(outcome);
        self.state = MatchState::Complete;
        self.ready_deadline = None;
        self.completed_at = Some(now);
    }

    /// Void the match: no winner.
    pub fn void(&mut self, now: DateTime<Utc>) {
        self.winner = None;
        self.outcome = Some(Outcome::Void);
        self.state = MatchState::Cancelled;
        self.ready_deadline = None;
        self.completed_at = Some(now);
    }

    /// Resolve a scheduled match whose slots are both known and at least one is a bye.
    /// Returns true if the match became terminal.
    pub fn settle_slots(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != MatchState::Scheduled {
            return false;
        }
        match (self.team_1, self.team_2) {
            (Slot::Team(_), Slot::Bye) => {
                self.finish(Score::walkover(TeamSlot::One, BestOf::Bo1), Outcome::Bye, now);
                true
            }
            (Slot::Bye, Slot::Team(_)) => {
                self.finish(Score::walkover(TeamSlot::Two, BestOf::Bo1), Outcome::Bye, now);
                true
            }
            (Slot::Bye, Slot::Bye) => {
                self.void(now);
                true
            }
            _ => false,
        }
    }

    /// True when a complete match carries exactly one winner and a non-tied score.
    pub fn result_is_consistent(&self) -> bool {
        match self.state {
            MatchState::Complete => match (self.score, self.winner) {
                (Some(score), Some(winner)) => {
                    score.winner().and_then(|s| self.team(s)) == Some(winner)
                }
                _ => false,
            },
            MatchState::Cancelled => self.winner.is_none(),
            _ => self.winner.is_none() && self.score.is_none(),
        }
    }
}
