//! Map veto: strict alternating bans until one (BO1) or three (BO3) maps remain.

use crate::config::SideRule;
use crate::models::{
    BestOf, EngineError, MapPool, Match, MatchState, TeamId, TeamSlot, VetoAction, VetoEntry,
    VetoTurn,
};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Copy the pool onto the match and clear any previous transcript.
pub(crate) fn begin_veto(m: &mut Match, pool: &MapPool) {
    m.map_pool = pool.maps().to_vec();
    m.veto.clear();
    m.maps.clear();
}

/// Maps not yet banned, in pool order.
pub fn remaining_maps(m: &Match) -> Vec<String> {
    m.map_pool
        .iter()
        .filter(|map| !m.veto.iter().any(|v| v.map == **map))
        .cloned()
        .collect()
}

/// Team 1 bans first, then strict alternation by slot.
fn acting_slot(m: &Match) -> TeamSlot {
    if m.veto.len() % 2 == 0 {
        TeamSlot::One
    } else {
        TeamSlot::Two
    }
}

/// Who bans next and what is left.
pub fn next_veto_action(m: &Match) -> Result<VetoTurn, EngineError> {
    if m.state != MatchState::MapBanning {
        return Err(EngineError::InvalidTransition {
            state: m.state,
            action: "read veto turn",
        });
    }
    let acting_slot = acting_slot(m);
    let acting_team = m.team(acting_slot).ok_or(EngineError::InvalidTransition {
        state: m.state,
        action: "read veto turn",
    })?;
    Ok(VetoTurn {
        acting_team,
        acting_slot,
        remaining_maps: remaining_maps(m),
    })
}

/// Apply one ban by `team`. When the terminal map count is reached the match moves to side selection.
///
/// Returns the updated match; `m` itself is untouched, so a rejected ban writes nothing.
pub fn apply_ban(
    m: &Match,
    team: TeamId,
    map: &str,
    side_rule: SideRule,
    now: DateTime<Utc>,
) -> Result<Match, EngineError> {
    let turn = next_veto_action(m)?;
    if m.slot_of(team).is_none() {
        return Err(EngineError::Unauthorized);
    }
    if turn.acting_team != team {
        return Err(EngineError::OutOfTurn(team));
    }
    let canonical = turn
        .remaining_maps
        .iter()
        .find(|name| name.eq_ignore_ascii_case(map.trim()))
        .cloned()
        .ok_or_else(|| EngineError::InvalidMap(map.to_string()))?;

    let mut next = m.clone();
    next.veto.push(VetoEntry {
        index: m.veto.len() as u32,
        team,
        slot: turn.acting_slot,
        action: VetoAction::Ban,
        map: canonical,
        at: now,
    });

    let remaining = remaining_maps(&next);
    if remaining.len() <= m.best_of.maps_after_veto() {
        next.maps = remaining;
        next.side_chooser = Some(side_chooser(&next, side_rule));
        next.state = MatchState::SideSelection;
    }
    Ok(next)
}

/// The team that did not make the last ban picks sides, unless BO1 uses a coin flip.
fn side_chooser(m: &Match, rule: SideRule) -> TeamSlot {
    if m.best_of == BestOf::Bo1 && rule == SideRule::CoinFlip {
        let mut rng = StdRng::seed_from_u64(m.id.as_u128() as u64);
        return if rng.gen_bool(0.5) {
            TeamSlot::One
        } else {
            TeamSlot::Two
        };
    }
    m.veto
        .last()
        .map(|last| last.slot.other())
        .unwrap_or(TeamSlot::One)
}
