//! Advancement: pushes a finished match's teams into the matches it feeds, opens the
//! next Swiss round, and closes the tournament after its last match.
//!
//! Every write here is keyed by a deterministic match id and guarded by the stored version,
//! so delivering the same completion twice leaves the bracket exactly as one delivery would.

use crate::logic::bracket::{self, Route};
use crate::logic::swiss;
use crate::models::{
    BracketKind, BracketPlan, EngineError, Match, MatchId, MatchState, Outcome, Slot, TeamId,
    TeamSlot, Tournament, TournamentId, TournamentStatus,
};
use crate::notify::{EngineEvent, Notifier};
use crate::store::Store;
use chrono::{DateTime, Utc};

/// What one delivery changed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Effect {
    SlotFilled {
        match_id: MatchId,
        slot: TeamSlot,
        entry: Slot,
    },
    /// A downstream match was decided on the spot (bye or void).
    Settled { match_id: MatchId, state: MatchState },
    BracketReset { match_id: MatchId },
    RoundGenerated { round: u32, matches: usize },
    TournamentCompleted { champion: Option<TeamId> },
}

pub struct Coordinator<'a> {
    store: &'a dyn Store,
    notifier: &'a dyn Notifier,
    attempts: u32,
}

impl<'a> Coordinator<'a> {
    pub fn new(store: &'a dyn Store, notifier: &'a dyn Notifier, attempts: u32) -> Self {
        Self {
            store,
            notifier,
            attempts: attempts.max(1),
        }
    }

    /// Propagate the result of the terminal match `match_id`. Safe to call repeatedly.
    pub fn on_match_complete(
        &self,
        match_id: MatchId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, EngineError> {
        let finished = self.store.get_match(match_id)?;
        let mut effects = Vec::new();
        self.advance(&finished, now, &mut effects)?;
        Ok(effects)
    }

    fn advance(
        &self,
        finished: &Match,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) -> Result<(), EngineError> {
        if !finished.state.is_terminal() {
            return Err(EngineError::InvalidTransition {
                state: finished.state,
                action: "advance",
            });
        }
        let t = self.store.tournament(finished.tournament_id)?;
        if t.status == TournamentStatus::Completed {
            return Ok(());
        }
        let plan = t.plan.clone().ok_or(EngineError::InvalidTournamentState {
            status: t.status,
            action: "advance",
        })?;
        match &plan {
            BracketPlan::Swiss { rounds, .. } => {
                self.advance_swiss(&t, *rounds, finished, now, effects)
            }
            BracketPlan::Elimination { .. } => {
                self.advance_elimination(&t, &plan, finished, now, effects)
            }
        }
    }

    fn advance_elimination(
        &self,
        t: &Tournament,
        plan: &BracketPlan,
        finished: &Match,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) -> Result<(), EngineError> {
        let pos = finished.position;
        if pos == bracket::reset_position() {
            return self.complete_tournament(t, finished.winner, now, effects);
        }
        if Some(pos) == bracket::final_position(plan) {
            let reset_allowed = matches!(
                plan,
                BracketPlan::Elimination {
                    double: true,
                    grand_final_reset: true,
                    ..
                }
            );
            if reset_allowed && finished.outcome != Some(Outcome::Bye) {
                if let (Some(TeamSlot::Two), Some((team_1, team_2))) =
                    (finished.winner_slot(), finished.teams())
                {
                    return self.open_bracket_reset(t, team_1, team_2, now, effects);
                }
            }
            return self.complete_tournament(t, finished.winner, now, effects);
        }

        if let Some(route) = bracket::winner_route(plan, pos) {
            let entry = finished.winner.map(Slot::Team).unwrap_or(Slot::Bye);
            self.fill(t, plan, route, entry, now, effects)?;
        }
        if let Some(route) = bracket::loser_route(plan, pos) {
            let entry = finished.loser().map(Slot::Team).unwrap_or(Slot::Bye);
            self.fill(t, plan, route, entry, now, effects)?;
        }
        Ok(())
    }

    /// Write `entry` into the route's slot, creating the downstream match if needed.
    fn fill(
        &self,
        t: &Tournament,
        plan: &BracketPlan,
        route: Route,
        entry: Slot,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) -> Result<(), EngineError> {
        let mut found = 0;
        for _ in 0..self.attempts {
            let blank = Match::new(t.id, route.position, t.best_of, Slot::Tbd, Slot::Tbd, now);
            let existing = self.store.insert_match_if_absent(blank)?;
            found = existing.version;
            let current = existing.slot(route.slot);
            if current == entry {
                // Delivered before; make sure whatever it decided also went through.
                if existing.state.is_terminal() {
                    self.advance_elimination(t, plan, &existing, now, effects)?;
                }
                return Ok(());
            }
            if current.is_resolved() {
                return Err(EngineError::SlotConflict(existing.id));
            }

            let mut next = existing.clone();
            next.set_slot(route.slot, entry);
            let settled = next.settle_slots(now);
            next.version = existing.version + 1;
            next.updated_at = now;
            match self.store.swap_match(existing.version, next) {
                Ok(committed) => {
                    effects.push(Effect::SlotFilled {
                        match_id: committed.id,
                        slot: route.slot,
                        entry,
                    });
                    if settled {
                        effects.push(Effect::Settled {
                            match_id: committed.id,
                            state: committed.state,
                        });
                        self.notifier.notify(&EngineEvent::MatchStateChanged {
                            tournament_id: t.id,
                            match_id: committed.id,
                            from: existing.state,
                            to: committed.state,
                            version: committed.version,
                            teams: [committed.team_1, committed.team_2]
                                .iter()
                                .filter_map(|s| s.team())
                                .collect(),
                        });
                        self.advance_elimination(t, plan, &committed, now, effects)?;
                    }
                    return Ok(());
                }
                Err(e) if e.is_retryable() => {
                    log::debug!("Slot write on {} raced, re-reading", existing.id);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(EngineError::StaleState {
            expected: found,
            found: found + 1,
        })
    }

    fn open_bracket_reset(
        &self,
        t: &Tournament,
        team_1: TeamId,
        team_2: TeamId,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) -> Result<(), EngineError> {
        let reset = Match::new(
            t.id,
            bracket::reset_position(),
            t.best_of,
            Slot::Team(team_1),
            Slot::Team(team_2),
            now,
        );
        let id = reset.id;
        let stored = self.store.insert_match_if_absent(reset)?;
        if stored.version == 0 && stored.created_at == now {
            log::info!("Grand final of {} goes to a bracket reset", t.id);
            effects.push(Effect::BracketReset { match_id: id });
        }
        if stored.state.is_terminal() {
            return self.complete_tournament(t, stored.winner, now, effects);
        }
        Ok(())
    }

    fn advance_swiss(
        &self,
        t: &Tournament,
        rounds: u32,
        finished: &Match,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) -> Result<(), EngineError> {
        let round = finished.position.round;
        let all = self.store.matches(t.id)?;
        let round_open = all.iter().any(|m| {
            m.position.bracket == BracketKind::Swiss
                && m.position.round == round
                && !m.state.is_terminal()
        });
        if round_open {
            return Ok(());
        }
        let history: Vec<Match> = all
            .iter()
            .filter(|m| m.position.bracket == BracketKind::Swiss && m.position.round <= round)
            .cloned()
            .collect();

        if round >= rounds {
            let table = swiss::standings(t, &history);
            return self.complete_tournament(t, table.first().map(|s| s.team), now, effects);
        }

        let next_round = round + 1;
        let already = all
            .iter()
            .any(|m| m.position.bracket == BracketKind::Swiss && m.position.round == next_round);
        if !already {
            let pairings = swiss::pair_round(t, &history, next_round, now);
            let count = pairings.len();
            for m in pairings {
                self.store.insert_match_if_absent(m)?;
            }
            log::info!("Swiss round {} of {} paired ({} matches)", next_round, t.id, count);
            effects.push(Effect::RoundGenerated {
                round: next_round,
                matches: count,
            });
            self.notifier.notify(&EngineEvent::RoundGenerated {
                tournament_id: t.id,
                round: next_round,
                matches: count,
            });
        }
        self.bump_round(t.id, next_round)
    }

    fn bump_round(&self, id: TournamentId, round: u32) -> Result<(), EngineError> {
        for _ in 0..self.attempts {
            let t = self.store.tournament(id)?;
            if t.current_round >= round {
                return Ok(());
            }
            let mut next = t.clone();
            next.current_round = round;
            next.version = t.version + 1;
            match self.store.swap_tournament(t.version, next) {
                Ok(_) => return Ok(()),
                Err(e) if e.is_retryable() => continue,
                Err(e) => return Err(e),
            }
        }
        Err(EngineError::Storage(format!(
            "could not record round {} for tournament {}",
            round, id
        )))
    }

    fn complete_tournament(
        &self,
        t: &Tournament,
        champion: Option<TeamId>,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) -> Result<(), EngineError> {
        for _ in 0..self.attempts {
            let current = self.store.tournament(t.id)?;
            if current.status == TournamentStatus::Completed {
                return Ok(());
            }
            let mut next = current.clone();
            next.status = TournamentStatus::Completed;
            next.champion = champion;
            next.completed_at = Some(now);
            next.version = current.version + 1;
            match self.store.swap_tournament(current.version, next) {
                Ok(_) => {
                    log::info!("Tournament {} completed", t.id);
                    effects.push(Effect::TournamentCompleted { champion });
                    self.notifier.notify(&EngineEvent::TournamentCompleted {
                        tournament_id: t.id,
                        champion,
                    });
                    return Ok(());
                }
                Err(e) if e.is_retryable() => continue,
                Err(e) => return Err(e),
            }
        }
        Err(EngineError::Storage(format!(
            "could not complete tournament {}",
            t.id
        )))
    }
}
