//! Swiss rounds: standings, tie-breaks and repeat-free pairing.

use crate::models::{
    BracketKind, BracketPlan, Match, MatchState, Outcome, Position, Slot, TeamId, Tournament,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Upper bound on backtracking steps before falling back to pairing with repeats.
const SEARCH_BUDGET: u32 = 200_000;

/// One row of the Swiss table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    /// 1-based.
    pub rank: u32,
    pub team: TeamId,
    /// Byes count as wins.
    pub wins: u32,
    pub losses: u32,
    pub byes: u32,
    /// Wins against teams on the same number of wins.
    pub head_to_head: u32,
    /// Mean win rate of the teams played (Buchholz-style).
    pub opponent_win_pct: f64,
    pub tiebreak_seed: u64,
}

#[derive(Default)]
struct Record {
    wins: u32,
    losses: u32,
    byes: u32,
    opponents: Vec<TeamId>,
}

fn participants(t: &Tournament) -> Vec<(TeamId, u64)> {
    match &t.plan {
        Some(BracketPlan::Swiss { tiebreak, .. }) => {
            tiebreak.iter().map(|s| (s.team, s.seed)).collect()
        }
        _ => t
            .teams
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i as u64))
            .collect(),
    }
}

/// Decided Swiss matches: (winner, loser) for played games.
fn decided(matches: &[Match]) -> impl Iterator<Item = (TeamId, TeamId)> + '_ {
    matches.iter().filter_map(|m| {
        if m.position.bracket != BracketKind::Swiss || m.state != MatchState::Complete {
            return None;
        }
        if m.outcome == Some(Outcome::Bye) {
            return None;
        }
        Some((m.winner?, m.loser()?))
    })
}

/// Ranked table. Order: wins, then head-to-head among teams on equal wins,
/// then opponent win percentage, then the tie-break seed.
pub fn standings(t: &Tournament, matches: &[Match]) -> Vec<Standing> {
    let teams = participants(t);
    let mut records: HashMap<TeamId, Record> =
        teams.iter().map(|(id, _)| (*id, Record::default())).collect();

    for m in matches.iter().filter(|m| {
        m.position.bracket == BracketKind::Swiss
            && m.state == MatchState::Complete
            && m.outcome == Some(Outcome::Bye)
    }) {
        if let Some(r) = m.winner.and_then(|w| records.get_mut(&w)) {
            r.wins += 1;
            r.byes += 1;
        }
    }
    for (winner, loser) in decided(matches) {
        if let Some(r) = records.get_mut(&winner) {
            r.wins += 1;
            r.opponents.push(loser);
        }
        if let Some(r) = records.get_mut(&loser) {
            r.losses += 1;
            r.opponents.push(winner);
        }
    }

    let win_rate = |id: &TeamId| -> f64 {
        records
            .get(id)
            .map(|r| {
                let played = r.wins + r.losses;
                if played == 0 {
                    0.0
                } else {
                    f64::from(r.wins) / f64::from(played)
                }
            })
            .unwrap_or(0.0)
    };
    let wins_of = |id: &TeamId| records.get(id).map(|r| r.wins).unwrap_or(0);

    let mut head_to_head: HashMap<TeamId, u32> = HashMap::new();
    for (winner, loser) in decided(matches) {
        if wins_of(&winner) == wins_of(&loser) {
            *head_to_head.entry(winner).or_default() += 1;
        }
    }

    let mut table: Vec<Standing> = teams
        .iter()
        .map(|&(team, seed)| {
            let r = &records[&team];
            let opponent_win_pct = if r.opponents.is_empty() {
                0.0
            } else {
                r.opponents.iter().map(&win_rate).sum::<f64>() / r.opponents.len() as f64
            };
            Standing {
                rank: 0,
                team,
                wins: r.wins,
                losses: r.losses,
                byes: r.byes,
                head_to_head: head_to_head.get(&team).copied().unwrap_or(0),
                opponent_win_pct,
                tiebreak_seed: seed,
            }
        })
        .collect();

    table.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then(b.head_to_head.cmp(&a.head_to_head))
            .then(b.opponent_win_pct.total_cmp(&a.opponent_win_pct))
            .then(a.tiebreak_seed.cmp(&b.tiebreak_seed))
    });
    for (i, s) in table.iter_mut().enumerate() {
        s.rank = i as u32 + 1;
    }
    table
}

fn pair_key(a: TeamId, b: TeamId) -> (TeamId, TeamId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Pair `remaining` in order, each team taking the nearest opponent it has not met.
fn search(
    remaining: &mut Vec<TeamId>,
    met: &HashSet<(TeamId, TeamId)>,
    out: &mut Vec<(TeamId, TeamId)>,
    budget: &mut u32,
) -> bool {
    if remaining.is_empty() {
        return true;
    }
    if *budget == 0 {
        return false;
    }
    *budget -= 1;

    let first = remaining.remove(0);
    for i in 0..remaining.len() {
        let opponent = remaining[i];
        if met.contains(&pair_key(first, opponent)) {
            continue;
        }
        remaining.remove(i);
        out.push((first, opponent));
        if search(remaining, met, out, budget) {
            return true;
        }
        out.pop();
        remaining.insert(i, opponent);
    }
    remaining.insert(0, first);
    false
}

fn pair_without_repeats(
    order: &[TeamId],
    met: &HashSet<(TeamId, TeamId)>,
    budget: &mut u32,
) -> Option<Vec<(TeamId, TeamId)>> {
    let mut remaining = order.to_vec();
    let mut out = Vec::with_capacity(order.len() / 2);
    search(&mut remaining, met, &mut out, budget).then_some(out)
}

fn chosen_has_repeats(pairs: &[(TeamId, TeamId)], met: &HashSet<(TeamId, TeamId)>) -> bool {
    pairs.iter().any(|&(a, b)| met.contains(&pair_key(a, b)))
}

/// Pairings for `round` from the standings after `history`. The odd team out gets a bye match.
///
/// Deterministic for the same inputs, so regenerating a round yields identical matches.
pub fn pair_round(
    t: &Tournament,
    history: &[Match],
    round: u32,
    now: DateTime<Utc>,
) -> Vec<Match> {
    let order: Vec<TeamId> = standings(t, history).into_iter().map(|s| s.team).collect();
    let met: HashSet<(TeamId, TeamId)> = history
        .iter()
        .filter(|m| m.position.bracket == BracketKind::Swiss)
        .filter_map(|m| m.teams())
        .map(|(a, b)| pair_key(a, b))
        .collect();
    let had_bye: HashSet<TeamId> = history
        .iter()
        .filter(|m| m.position.bracket == BracketKind::Swiss && m.outcome == Some(Outcome::Bye))
        .filter_map(|m| m.winner)
        .collect();

    // Bye candidates: lowest ranked first, teams that already had one last.
    let candidates: Vec<Option<TeamId>> = if order.len() % 2 == 1 {
        let mut c: Vec<TeamId> = order.iter().rev().copied().collect();
        c.sort_by_key(|id| had_bye.contains(id));
        c.into_iter().map(Some).collect()
    } else {
        vec![None]
    };

    let mut budget = SEARCH_BUDGET;
    let mut chosen: Option<(Option<TeamId>, Vec<(TeamId, TeamId)>)> = None;
    for bye in &candidates {
        let rest: Vec<TeamId> = order.iter().copied().filter(|id| Some(*id) != *bye).collect();
        if let Some(pairs) = pair_without_repeats(&rest, &met, &mut budget) {
            chosen = Some((*bye, pairs));
            break;
        }
    }
    let (bye, pairs) = chosen.unwrap_or_else(|| {
        // No repeat-free pairing exists: pair neighbours in standings order.
        let bye = candidates.first().copied().flatten();
        let rest: Vec<TeamId> = order.iter().copied().filter(|id| Some(*id) != bye).collect();
        let pairs = rest.chunks_exact(2).map(|c| (c[0], c[1])).collect();
        (bye, pairs)
    });
    if chosen_has_repeats(&pairs, &met) {
        log::warn!("Swiss round {} of {} repeats an earlier pairing", round, t.id);
    }

    let mut matches: Vec<Match> = pairs
        .into_iter()
        .enumerate()
        .map(|(i, (a, b))| {
            Match::new(
                t.id,
                Position::new(BracketKind::Swiss, round, i as u32),
                t.best_of,
                Slot::Team(a),
                Slot::Team(b),
                now,
            )
        })
        .collect();
    if let Some(team) = bye {
        let position = Position::new(BracketKind::Swiss, round, matches.len() as u32);
        matches.push(Match::bye(t.id, position, t.best_of, team, now));
    }
    matches
}
