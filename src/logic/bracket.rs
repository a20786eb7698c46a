//! Bracket construction and elimination routing.
//!
//! Only round 1 is built up front. Later matches are created on demand by advancement,
//! at positions computed by `winner_route` / `loser_route`.

use crate::logic::{setup, swiss};
use crate::models::{
    BracketKind, BracketPlan, EngineError, Format, Match, Position, Seeding, Slot, Team, TeamId,
    TeamSeed, TeamSlot, Tournament,
};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A freshly built bracket: its plan and the round-1 matches (byes already decided).
#[derive(Clone, Debug)]
pub struct Bracket {
    pub plan: BracketPlan,
    pub matches: Vec<Match>,
}

/// Where a finished match sends one of its teams.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Route {
    pub position: Position,
    pub slot: TeamSlot,
}

/// Build the opening round for `tournament` from `teams`.
///
/// Validates the field first; nothing is returned (and so nothing can be persisted) on error.
pub fn build_bracket(
    tournament: &Tournament,
    teams: &[Team],
    now: DateTime<Utc>,
) -> Result<Bracket, EngineError> {
    setup::validate_field(teams)?;

    let mut rng = StdRng::seed_from_u64(tournament.seed);
    let mut order: Vec<TeamId> = teams.iter().map(|t| t.id).collect();
    if tournament.seeding == Seeding::Random {
        order.shuffle(&mut rng);
    }

    match tournament.format {
        Format::SingleElimination => Ok(build_elimination(tournament, &order, false, now)),
        Format::DoubleElimination => Ok(build_elimination(tournament, &order, true, now)),
        Format::Swiss => {
            // Seed = place in the (possibly shuffled) opening order; lower is better.
            let tiebreak: Vec<TeamSeed> = order
                .iter()
                .enumerate()
                .map(|(i, &team)| TeamSeed {
                    team,
                    seed: i as u64,
                })
                .collect();
            let rounds = tournament
                .swiss_rounds
                .unwrap_or_else(|| default_swiss_rounds(order.len()))
                .max(1);
            let plan = BracketPlan::Swiss { rounds, tiebreak };
            let mut planned = tournament.clone();
            planned.plan = Some(plan.clone());
            let matches = swiss::pair_round(&planned, &[], 1, now);
            Ok(Bracket { plan, matches })
        }
    }
}

/// ceil(log2 n), at least 1.
pub fn default_swiss_rounds(n: usize) -> u32 {
    (n.max(2).next_power_of_two().trailing_zeros()).max(1)
}

/// Round-1 positions that receive byes: even positions first, then odd, from the top.
fn bye_positions(slots: usize, byes: usize) -> Vec<usize> {
    (0..slots)
        .step_by(2)
        .chain((1..slots).step_by(2))
        .take(byes)
        .collect()
}

fn build_elimination(
    tournament: &Tournament,
    order: &[TeamId],
    double: bool,
    now: DateTime<Utc>,
) -> Bracket {
    let n = order.len();
    let size = n.next_power_of_two();
    let slots = size / 2;
    let byes = bye_positions(slots, size - n);

    // Top seeds take the byes, the rest pair up in order.
    let mut seeds = order.iter().copied();
    let mut assigned: Vec<Option<TeamId>> = vec![None; slots];
    for &pos in &byes {
        assigned[pos] = seeds.next();
    }
    let mut matches = Vec::with_capacity(slots);
    for (index, bye_team) in assigned.into_iter().enumerate() {
        let position = Position::new(BracketKind::Winners, 1, index as u32);
        let m = match bye_team {
            Some(team) => Match::bye(tournament.id, position, tournament.best_of, team, now),
            None => {
                let a = seeds.next().map(Slot::Team).unwrap_or(Slot::Bye);
                let b = seeds.next().map(Slot::Team).unwrap_or(Slot::Bye);
                let mut m = Match::new(tournament.id, position, tournament.best_of, a, b, now);
                m.settle_slots(now);
                m
            }
        };
        matches.push(m);
    }

    Bracket {
        plan: BracketPlan::Elimination {
            size: size as u32,
            winners_rounds: size.trailing_zeros(),
            double,
            grand_final_reset: double && tournament.grand_final_reset,
        },
        matches,
    }
}

/// Number of losers-bracket rounds for a winners bracket of `winners_rounds` rounds.
pub fn losers_rounds(winners_rounds: u32) -> u32 {
    2 * winners_rounds.saturating_sub(1)
}

/// Matches in losers round `round` (1-based) of a bracket with `size` slots.
pub fn losers_round_matches(size: u32, round: u32) -> u32 {
    let depth = round.div_ceil(2) + 1;
    (size >> depth).max(1)
}

/// Where the winner of the match at `pos` goes next. None for the last match of a bracket.
pub fn winner_route(plan: &BracketPlan, pos: Position) -> Option<Route> {
    let BracketPlan::Elimination {
        winners_rounds,
        double,
        ..
    } = *plan
    else {
        return None;
    };
    match pos.bracket {
        BracketKind::Winners if pos.round < winners_rounds => Some(Route {
            position: Position::new(BracketKind::Winners, pos.round + 1, pos.index / 2),
            slot: slot_for(pos.index),
        }),
        BracketKind::Winners if double => Some(Route {
            position: Position::new(BracketKind::GrandFinal, 1, 0),
            slot: TeamSlot::One,
        }),
        BracketKind::Losers if pos.round < losers_rounds(winners_rounds) => {
            let round = pos.round + 1;
            // Odd rounds feed the drop-in round at the same index; even rounds halve.
            if pos.round % 2 == 1 {
                Some(Route {
                    position: Position::new(BracketKind::Losers, round, pos.index),
                    slot: TeamSlot::One,
                })
            } else {
                Some(Route {
                    position: Position::new(BracketKind::Losers, round, pos.index / 2),
                    slot: slot_for(pos.index),
                })
            }
        }
        BracketKind::Losers => Some(Route {
            position: Position::new(BracketKind::GrandFinal, 1, 0),
            slot: TeamSlot::Two,
        }),
        _ => None,
    }
}

/// Where the loser of the match at `pos` drops to. Only winners-bracket matches of a
/// double-elimination bracket have one.
///
/// Round 1 losers enter losers round 1; losers of winners round r >= 2 enter losers
/// round 2(r-1) in reversed order.
pub fn loser_route(plan: &BracketPlan, pos: Position) -> Option<Route> {
    let BracketPlan::Elimination {
        size,
        winners_rounds,
        double: true,
        ..
    } = *plan
    else {
        return None;
    };
    if pos.bracket != BracketKind::Winners {
        return None;
    }
    if winners_rounds == 1 {
        return Some(Route {
            position: Position::new(BracketKind::GrandFinal, 1, 0),
            slot: TeamSlot::Two,
        });
    }
    if pos.round == 1 {
        return Some(Route {
            position: Position::new(BracketKind::Losers, 1, pos.index / 2),
            slot: slot_for(pos.index),
        });
    }
    let round = 2 * (pos.round - 1);
    let count = losers_round_matches(size, round);
    Some(Route {
        position: Position::new(
            BracketKind::Losers,
            round,
            count.saturating_sub(1).saturating_sub(pos.index),
        ),
        slot: TeamSlot::Two,
    })
}

fn slot_for(index: u32) -> TeamSlot {
    if index % 2 == 0 {
        TeamSlot::One
    } else {
        TeamSlot::Two
    }
}

/// Position of the match whose result decides the tournament (before any bracket reset).
pub fn final_position(plan: &BracketPlan) -> Option<Position> {
    match *plan {
        BracketPlan::Elimination {
            winners_rounds,
            double: false,
            ..
        } => Some(Position::new(BracketKind::Winners, winners_rounds, 0)),
        BracketPlan::Elimination { double: true, .. } => {
            Some(Position::new(BracketKind::GrandFinal, 1, 0))
        }
        BracketPlan::Swiss { .. } => None,
    }
}

/// The replayed grand final after the losers-bracket team wins the first one.
pub fn reset_position() -> Position {
    Position::new(BracketKind::GrandFinal, 2, 0)
}
