//! Per-match protocol: ready-up, map veto, side pick, play, result reports, disputes.
//!
//! `transition` is a pure function of (current match, actor, action). It never touches
//! the input, so a rejected request cannot leave a partial write. Committing the returned
//! match is the caller's job, guarded by the version it read.

use crate::config::EngineSettings;
use crate::logic::{dispute, veto};
use crate::models::{
    Actor, DisputeDecision, EngineError, Match, MatchState, Outcome, Resolution, Score, Side,
    SideAssignment, TeamSlot, UserId,
};
use crate::store::TeamDirectory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A requested state change.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchAction {
    /// Open check-in once both slots hold teams with full lineups.
    OpenReadyUp,
    Ready,
    Unready,
    /// Forfeit the non-ready side once the ready deadline has passed.
    ExpireReady,
    Ban { map: String },
    ChooseSide { side: Side },
    SubmitScore { score: Score },
    ResolveDispute { decision: DisputeDecision, note: String },
    ForceForfeit { winner: TeamSlot },
    Cancel,
}

impl MatchAction {
    pub fn name(&self) -> &'static str {
        match self {
            MatchAction::OpenReadyUp => "open ready-up",
            MatchAction::Ready => "ready up",
            MatchAction::Unready => "un-ready",
            MatchAction::ExpireReady => "expire ready-up",
            MatchAction::Ban { .. } => "ban a map",
            MatchAction::ChooseSide { .. } => "choose a side",
            MatchAction::SubmitScore { .. } => "submit a score",
            MatchAction::ResolveDispute { .. } => "resolve a dispute",
            MatchAction::ForceForfeit { .. } => "force a forfeit",
            MatchAction::Cancel => "cancel",
        }
    }
}

/// The state and version a request expects to find.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Expected {
    pub state: MatchState,
    pub version: u64,
}

impl Expected {
    pub fn of(m: &Match) -> Self {
        Self {
            state: m.state,
            version: m.version,
        }
    }

    /// `StaleState` unless `m` is exactly what the caller read.
    pub fn check(&self, m: &Match) -> Result<(), EngineError> {
        if self.version != m.version || self.state != m.state {
            return Err(EngineError::StaleState {
                expected: self.version,
                found: m.version,
            });
        }
        Ok(())
    }
}

/// What a transition may consult besides the match itself.
pub struct Env<'a> {
    pub now: DateTime<Utc>,
    pub settings: &'a EngineSettings,
    pub teams: &'a dyn TeamDirectory,
}

fn invalid(m: &Match, action: &'static str) -> EngineError {
    EngineError::InvalidTransition {
        state: m.state,
        action,
    }
}

/// Apply `action` by `actor` to `current`, returning the next version of the match.
pub fn transition(
    current: &Match,
    actor: &Actor,
    action: MatchAction,
    env: &Env<'_>,
) -> Result<Match, EngineError> {
    use MatchState::*;

    let mut next = match (current.state, action) {
        (Complete | Cancelled, action) => Err(invalid(current, action.name())),
        (_, MatchAction::ForceForfeit { winner }) => force_forfeit(current, actor, winner, env.now),
        (_, MatchAction::Cancel) => cancel(current, actor, env.now),
        (Scheduled, MatchAction::OpenReadyUp) => open_ready_up(current, actor, env),
        (ReadyUp, MatchAction::Ready) => ready(current, actor, env),
        (ReadyUp, MatchAction::Unready) => unready(current, actor, env),
        (ReadyUp, MatchAction::ExpireReady) => expire_ready(current, actor, env),
        (MapBanning, MatchAction::Ban { map }) => {
            let team = match actor {
                Actor::Team { team, .. } => *team,
                _ => return Err(EngineError::Unauthorized),
            };
            veto::apply_ban(current, team, &map, env.settings.bo1_side_rule, env.now)
        }
        (SideSelection, MatchAction::ChooseSide { side }) => choose_side(current, actor, side),
        (Playing | WaitingResults, MatchAction::SubmitScore { score }) => {
            submit_score(current, actor, score, env.now)
        }
        (Disputed, MatchAction::SubmitScore { .. }) => {
            actor.participant_slot(current)?;
            Err(EngineError::DuplicateDispute)
        }
        (Disputed, MatchAction::ResolveDispute { decision, note }) => {
            dispute::resolve(current, actor, decision, &note, env.now)
        }
        (_, action) => Err(invalid(current, action.name())),
    }?;

    next.version = current.version + 1;
    next.updated_at = env.now;
    Ok(next)
}

fn open_ready_up(current: &Match, actor: &Actor, env: &Env<'_>) -> Result<Match, EngineError> {
    actor.require_participant_or_operator(current)?;
    let (team_1, team_2) = current
        .teams()
        .ok_or_else(|| invalid(current, "open ready-up"))?;
    for id in [team_1, team_2] {
        let team = env.teams.team(id)?;
        if !team.has_full_lineup() {
            return Err(EngineError::InsufficientRoster {
                team: id,
                active: team.active_players.len(),
            });
        }
    }
    let mut next = current.clone();
    next.state = MatchState::ReadyUp;
    next.ready_1 = false;
    next.ready_2 = false;
    next.ready_deadline = Some(env.now + env.settings.ready_timeout);
    Ok(next)
}

fn ready(current: &Match, actor: &Actor, env: &Env<'_>) -> Result<Match, EngineError> {
    let slot = actor.participant_slot(current)?;
    if current.is_ready(slot) {
        return Err(invalid(current, "ready up twice"));
    }
    let mut next = current.clone();
    next.set_ready(slot, true);
    if next.ready_1 && next.ready_2 {
        next.ready_deadline = None;
        next.state = MatchState::MapBanning;
        veto::begin_veto(&mut next, &env.settings.map_pool);
    }
    Ok(next)
}

/// Un-ready is only possible while the opponent has not readied; it restarts the clock.
fn unready(current: &Match, actor: &Actor, env: &Env<'_>) -> Result<Match, EngineError> {
    let slot = actor.participant_slot(current)?;
    if !current.is_ready(slot) {
        return Err(invalid(current, "un-ready without being ready"));
    }
    let mut next = current.clone();
    next.set_ready(slot, false);
    next.ready_deadline = Some(env.now + env.settings.ready_timeout);
    Ok(next)
}

fn expire_ready(current: &Match, actor: &Actor, env: &Env<'_>) -> Result<Match, EngineError> {
    actor.require_participant_or_operator(current)?;
    match current.ready_deadline {
        Some(deadline) if env.now >= deadline => {}
        _ => return Err(EngineError::ReadyWindowOpen),
    }
    let mut next = current.clone();
    match (current.ready_1, current.ready_2) {
        (true, false) => next.finish(
            Score::walkover(TeamSlot::One, current.best_of),
            Outcome::Walkover,
            env.now,
        ),
        (false, true) => next.finish(
            Score::walkover(TeamSlot::Two, current.best_of),
            Outcome::Walkover,
            env.now,
        ),
        // Nobody showed up: keep waiting, an admin decides the forfeit.
        (false, false) => next.ready_deadline = Some(env.now + env.settings.ready_timeout),
        (true, true) => return Err(invalid(current, "expire ready-up")),
    }
    Ok(next)
}

fn choose_side(current: &Match, actor: &Actor, side: Side) -> Result<Match, EngineError> {
    let slot = actor.participant_slot(current)?;
    let chooser = current
        .side_chooser
        .ok_or_else(|| invalid(current, "choose a side"))?;
    if slot != chooser || current.sides.is_some() {
        let team = current.team(slot).ok_or(EngineError::Unauthorized)?;
        return Err(EngineError::OutOfTurn(team));
    }
    let (team_1, team_2) = match slot {
        TeamSlot::One => (side, side.opposite()),
        TeamSlot::Two => (side.opposite(), side),
    };
    let mut next = current.clone();
    next.sides = Some(SideAssignment {
        chosen_by: slot,
        team_1,
        team_2,
    });
    next.state = MatchState::Playing;
    Ok(next)
}

/// Each team reports its own score. Agreement completes the match, disagreement opens a dispute.
fn submit_score(
    current: &Match,
    actor: &Actor,
    score: Score,
    now: DateTime<Utc>,
) -> Result<Match, EngineError> {
    let slot = actor.participant_slot(current)?;
    if score.winner().is_none() {
        return Err(EngineError::TieScoreRejected);
    }
    if current.submission(slot).is_some() {
        return Err(invalid(current, "submit a score twice"));
    }
    let mut next = current.clone();
    next.set_submission(slot, Some(score));
    match (next.submission_1, next.submission_2) {
        (Some(a), Some(b)) if a == b => next.finish(a, Outcome::Played, now),
        (Some(a), Some(b)) => dispute::open(&mut next, a, b, now),
        _ => next.state = MatchState::WaitingResults,
    }
    Ok(next)
}

fn force_forfeit(
    current: &Match,
    actor: &Actor,
    winner: TeamSlot,
    now: DateTime<Utc>,
) -> Result<Match, EngineError> {
    let admin = actor.require_admin()?;
    if current.teams().is_none() {
        return Err(invalid(current, "force a forfeit"));
    }
    let score = Score::walkover(winner, current.best_of);
    let mut next = current.clone();
    close_open_dispute(
        &mut next,
        admin,
        DisputeDecision::Override { score },
        "closed by forfeit",
        now,
    );
    next.finish(score, Outcome::Walkover, now);
    Ok(next)
}

fn cancel(current: &Match, actor: &Actor, now: DateTime<Utc>) -> Result<Match, EngineError> {
    let admin = actor.require_admin()?;
    let mut next = current.clone();
    close_open_dispute(
        &mut next,
        admin,
        DisputeDecision::Dismiss,
        "match cancelled",
        now,
    );
    next.void(now);
    Ok(next)
}

fn close_open_dispute(
    m: &mut Match,
    admin: UserId,
    decision: DisputeDecision,
    note: &str,
    now: DateTime<Utc>,
) {
    if let Some(dispute) = m.open_dispute_mut() {
        dispute.resolution = Some(Resolution {
            admin,
            decision,
            note: note.to_string(),
            resolved_at: now,
        });
    }
}
