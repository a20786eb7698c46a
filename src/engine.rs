//! The engine facade: every externally visible operation goes through here.
//!
//! Each write reads the record, validates it against the caller's expectation, computes the
//! next record and commits it with a version-guarded swap. Events go out only after a commit.

use crate::config::EngineSettings;
use crate::logic::advancement::{Coordinator, Effect};
use crate::logic::match_flow::{self, Env, Expected, MatchAction};
use crate::logic::swiss::{self, Standing};
use crate::logic::{bracket, setup, veto};
use crate::models::{
    Actor, BestOf, BracketKind, DisputeDecision, EngineError, Format, Match, MatchId, MatchState,
    Seeding, Team, TeamId, Tournament, TournamentId, TournamentStatus, VetoTurn,
};
use crate::notify::{EngineEvent, Notifier};
use crate::store::{Store, TeamDirectory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameters for a new tournament.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewTournament {
    pub name: String,
    pub format: Format,
    #[serde(default = "default_best_of")]
    pub best_of: BestOf,
    pub target_team_count: usize,
    #[serde(default)]
    pub seeding: Seeding,
    /// Fixed seed for reproducible brackets; drawn at random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub swiss_rounds: Option<u32>,
    /// Falls back to the engine setting.
    #[serde(default)]
    pub grand_final_reset: Option<bool>,
}

fn default_best_of() -> BestOf {
    BestOf::Bo1
}

pub struct Engine {
    store: Arc<dyn Store>,
    teams: Arc<dyn TeamDirectory>,
    notifier: Arc<dyn Notifier>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        teams: Arc<dyn TeamDirectory>,
        notifier: Arc<dyn Notifier>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            teams,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn coordinator(&self) -> Coordinator<'_> {
        Coordinator::new(
            self.store.as_ref(),
            self.notifier.as_ref(),
            self.settings.advancement_attempts,
        )
    }

    /// Admin only. The tournament opens for registration straight away.
    pub fn create_tournament(
        &self,
        actor: &Actor,
        draft: NewTournament,
        now: DateTime<Utc>,
    ) -> Result<Tournament, EngineError> {
        actor.require_admin()?;
        let mut t = Tournament::new(
            draft.name.trim(),
            draft.format,
            draft.best_of,
            draft.target_team_count,
        );
        t.seeding = draft.seeding;
        if let Some(seed) = draft.seed {
            t.seed = seed;
        }
        t.swiss_rounds = draft.swiss_rounds;
        t.grand_final_reset = draft
            .grand_final_reset
            .unwrap_or(self.settings.grand_final_reset);
        t.created_at = now;
        self.store.insert_tournament(t.clone())?;
        log::info!("Created tournament {} ({:?}, {} teams)", t.id, t.format, t.target_team_count);
        Ok(t)
    }

    pub fn tournament(&self, id: TournamentId) -> Result<Tournament, EngineError> {
        self.store.tournament(id)
    }

    pub fn tournaments(&self) -> Result<Vec<Tournament>, EngineError> {
        self.store.tournaments()
    }

    /// Enter `team_id` into the tournament. Admins may register any team, captains their own.
    pub fn register_team(
        &self,
        actor: &Actor,
        tournament_id: TournamentId,
        team_id: TeamId,
    ) -> Result<Tournament, EngineError> {
        match actor {
            Actor::Admin { .. } => {}
            Actor::Team { team, .. } if *team == team_id => self.check_roster(actor)?,
            _ => return Err(EngineError::Unauthorized),
        }
        let team = self.teams.team(team_id)?;
        let current = self.store.tournament(tournament_id)?;
        let entered: Vec<Team> = current
            .teams
            .iter()
            .map(|id| self.teams.team(*id))
            .collect::<Result<_, _>>()?;
        let mut next = current.clone();
        setup::register_team(&mut next, &team, &entered)?;
        next.version = current.version + 1;
        let committed = self.store.swap_tournament(current.version, next)?;
        log::info!(
            "Team {} registered for tournament {} ({}/{})",
            team.tag,
            tournament_id,
            committed.teams.len(),
            committed.target_team_count
        );
        Ok(committed)
    }

    /// Build the bracket and open round 1. `force` starts below the target team count.
    pub fn start_tournament(
        &self,
        actor: &Actor,
        tournament_id: TournamentId,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<Tournament, EngineError> {
        actor.require_admin()?;
        let current = self.store.tournament(tournament_id)?;
        setup::check_startable(&current, force)?;
        let teams: Vec<Team> = current
            .teams
            .iter()
            .map(|id| self.teams.team(*id))
            .collect::<Result<_, _>>()?;
        let built = bracket::build_bracket(&current, &teams, now)?;

        let decided: Vec<MatchId> = built
            .matches
            .iter()
            .filter(|m| m.state.is_terminal())
            .map(|m| m.id)
            .collect();
        let match_count = built.matches.len();

        let mut next = current.clone();
        next.plan = Some(built.plan);
        next.status = TournamentStatus::InProgress;
        next.current_round = 1;
        next.version = current.version + 1;
        let committed = self.store.commit_bracket(current.version, next, built.matches)?;
        log::info!(
            "Tournament {} started with {} teams, {} opening matches ({} byes)",
            tournament_id,
            teams.len(),
            match_count,
            decided.len()
        );
        self.notifier.notify(&EngineEvent::RoundGenerated {
            tournament_id,
            round: 1,
            matches: match_count,
        });

        for id in decided {
            if let Err(e) = self.coordinator().on_match_complete(id, now) {
                log::error!("Advancing bye match {} failed: {}", id, e);
            }
        }
        self.store.tournament(committed.id)
    }

    pub fn get_match(&self, id: MatchId) -> Result<Match, EngineError> {
        self.store.get_match(id)
    }

    /// Matches of a tournament in bracket order, optionally limited to one round.
    pub fn matches(
        &self,
        tournament_id: TournamentId,
        round: Option<(BracketKind, u32)>,
    ) -> Result<Vec<Match>, EngineError> {
        self.store.tournament(tournament_id)?;
        match round {
            Some((bracket, round)) => self.store.matches_in_round(tournament_id, bracket, round),
            None => self.store.matches(tournament_id),
        }
    }

    pub fn next_veto_action(&self, match_id: MatchId) -> Result<VetoTurn, EngineError> {
        veto::next_veto_action(&self.store.get_match(match_id)?)
    }

    /// Apply `action` to the match, provided it is still in the state and version the caller saw.
    ///
    /// The committed match is returned even if advancement afterwards fails; the failure is
    /// logged and a later `advance` call finishes the job.
    pub fn apply(
        &self,
        match_id: MatchId,
        expected: Expected,
        actor: &Actor,
        action: MatchAction,
        now: DateTime<Utc>,
    ) -> Result<Match, EngineError> {
        let current = self.store.get_match(match_id)?;
        expected.check(&current)?;
        self.check_roster(actor)?;
        let env = Env {
            now,
            settings: &self.settings,
            teams: self.teams.as_ref(),
        };
        let name = action.name();
        let next = match_flow::transition(&current, actor, action, &env)?;
        let committed = self.store.swap_match(current.version, next)?;
        log::info!(
            "Match {} {}: {} -> {} (v{})",
            committed.id,
            name,
            current.state,
            committed.state,
            committed.version
        );
        self.publish(&current, &committed);

        if committed.state.is_terminal() {
            if let Err(e) = self.coordinator().on_match_complete(committed.id, now) {
                log::error!("Advancement after match {} failed: {}", committed.id, e);
            }
        }
        Ok(committed)
    }

    pub fn resolve_dispute(
        &self,
        match_id: MatchId,
        expected: Expected,
        actor: &Actor,
        decision: DisputeDecision,
        note: String,
        now: DateTime<Utc>,
    ) -> Result<Match, EngineError> {
        self.apply(
            match_id,
            expected,
            actor,
            MatchAction::ResolveDispute { decision, note },
            now,
        )
    }

    /// Disputed matches across all tournaments. Admin only.
    pub fn open_disputes(&self, actor: &Actor) -> Result<Vec<Match>, EngineError> {
        actor.require_admin()?;
        let mut out = Vec::new();
        for t in self.store.tournaments()? {
            out.extend(
                self.store
                    .matches(t.id)?
                    .into_iter()
                    .filter(|m| m.state == MatchState::Disputed),
            );
        }
        Ok(out)
    }

    /// Re-deliver a finished match to advancement. Idempotent.
    pub fn advance(
        &self,
        actor: &Actor,
        match_id: MatchId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, EngineError> {
        if !actor.is_admin() && *actor != Actor::System {
            return Err(EngineError::Unauthorized);
        }
        self.coordinator().on_match_complete(match_id, now)
    }

    pub fn standings(&self, tournament_id: TournamentId) -> Result<Vec<Standing>, EngineError> {
        let t = self.store.tournament(tournament_id)?;
        if t.format != Format::Swiss {
            return Err(EngineError::InvalidTournamentState {
                status: t.status,
                action: "read Swiss standings",
            });
        }
        Ok(swiss::standings(&t, &self.store.matches(tournament_id)?))
    }

    /// Expire every ready-up window that has run out. Returns how many matches were forfeited.
    pub fn expire_ready_checks(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let mut forfeited = 0;
        for t in self.store.tournaments()? {
            if t.status != TournamentStatus::InProgress {
                continue;
            }
            let due = self.store.matches(t.id)?.into_iter().filter(|m| {
                m.state == MatchState::ReadyUp && m.ready_deadline.is_some_and(|d| d <= now)
            });
            for m in due {
                match self.apply(m.id, Expected::of(&m), &Actor::System, MatchAction::ExpireReady, now) {
                    Ok(done) if done.state.is_terminal() => forfeited += 1,
                    Ok(_) => log::info!("Match {}: nobody readied up, window renewed", m.id),
                    Err(e) if e.is_retryable() => {
                        log::debug!("Match {} changed during the ready sweep", m.id)
                    }
                    Err(e) => log::warn!("Ready sweep on match {} failed: {}", m.id, e),
                }
            }
        }
        Ok(forfeited)
    }

    /// A team actor must be on the roster of the team it claims to act for.
    fn check_roster(&self, actor: &Actor) -> Result<(), EngineError> {
        let Actor::Team { user, team } = actor else {
            return Ok(());
        };
        match self.teams.team(*team) {
            Ok(t) if t.has_member(*user) => Ok(()),
            Ok(_) => Err(EngineError::Unauthorized),
            Err(e) if e.is_not_found() => Err(EngineError::Unauthorized),
            Err(e) => Err(e),
        }
    }

    fn publish(&self, before: &Match, after: &Match) {
        let teams: Vec<TeamId> = [after.team_1, after.team_2]
            .iter()
            .filter_map(|s| s.team())
            .collect();
        if before.state != after.state {
            self.notifier.notify(&EngineEvent::MatchStateChanged {
                tournament_id: after.tournament_id,
                match_id: after.id,
                from: before.state,
                to: after.state,
                version: after.version,
                teams: teams.clone(),
            });
        }
        if after.disputes.len() > before.disputes.len() {
            if let Some(d) = after.disputes.last() {
                self.notifier.notify(&EngineEvent::DisputeOpened {
                    tournament_id: after.tournament_id,
                    match_id: after.id,
                    reason: d.reason.clone(),
                    teams: teams.clone(),
                });
            }
        }
        let was_open = before.open_dispute().is_some();
        if was_open && after.open_dispute().is_none() {
            if let Some(r) = after.disputes.last().and_then(|d| d.resolution.as_ref()) {
                self.notifier.notify(&EngineEvent::DisputeResolved {
                    tournament_id: after.tournament_id,
                    match_id: after.id,
                    admin: r.admin,
                    note: r.note.clone(),
                    teams,
                });
            }
        }
    }
}
