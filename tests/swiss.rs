//! Integration tests for Swiss rounds: pairing, byes, standings and completion.

mod common;

use common::{harness, now, Harness};
use esports_tournament_engine::logic::swiss::pair_round;
use esports_tournament_engine::{
    BestOf, BracketKind, EngineError, Format, Match, Outcome, TeamId, TeamSlot, Tournament,
    TournamentStatus,
};
use std::collections::HashSet;

fn play_round(h: &Harness, t: &Tournament, round: u32) {
    let matches = h
        .engine
        .matches(t.id, Some((BracketKind::Swiss, round)))
        .unwrap();
    for m in matches.iter().filter(|m| m.outcome != Some(Outcome::Bye)) {
        h.play(m.id, TeamSlot::One);
    }
}

fn pairs(matches: &[Match]) -> Vec<(TeamId, TeamId)> {
    matches
        .iter()
        .filter_map(|m| m.teams())
        .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
        .collect()
}

#[test]
fn eight_teams_play_three_rounds_without_rematches() {
    let h = harness(8);
    let t = h.started(Format::Swiss, BestOf::Bo1);
    assert_eq!(
        h.engine.matches(t.id, Some((BracketKind::Swiss, 1))).unwrap().len(),
        4
    );

    for round in 1..=3 {
        play_round(&h, &t, round);
    }

    let all = h.engine.matches(t.id, None).unwrap();
    assert_eq!(all.len(), 12);
    let played = pairs(&all);
    let unique: HashSet<_> = played.iter().collect();
    assert_eq!(unique.len(), played.len());

    let t = h.engine.tournament(t.id).unwrap();
    assert_eq!(t.status, TournamentStatus::Completed);
    assert_eq!(t.current_round, 3);

    let table = h.engine.standings(t.id).unwrap();
    assert_eq!(table.len(), 8);
    assert_eq!(table[0].wins, 3);
    assert_eq!(t.champion, Some(table[0].team));
    assert!(table.windows(2).all(|w| w[0].wins >= w[1].wins));
    assert_eq!(table.iter().map(|s| s.rank).collect::<Vec<_>>(), (1..=8).collect::<Vec<_>>());
}

#[test]
fn odd_field_rotates_the_bye() {
    let h = harness(5);
    let t = h.started(Format::Swiss, BestOf::Bo1);
    let first = h
        .engine
        .matches(t.id, Some((BracketKind::Swiss, 1)))
        .unwrap();
    assert_eq!(first.len(), 3);
    let bye = first.iter().find(|m| m.outcome == Some(Outcome::Bye)).unwrap();
    // Lowest seed sits out first.
    assert_eq!(bye.winner, Some(h.teams[4].id));

    for round in 1..=3 {
        play_round(&h, &t, round);
    }

    let all = h.engine.matches(t.id, None).unwrap();
    let bye_teams: Vec<TeamId> = all
        .iter()
        .filter(|m| m.outcome == Some(Outcome::Bye))
        .filter_map(|m| m.winner)
        .collect();
    assert_eq!(bye_teams.len(), 3);
    assert_eq!(bye_teams.iter().collect::<HashSet<_>>().len(), 3);

    let played = pairs(&all);
    assert_eq!(played.iter().collect::<HashSet<_>>().len(), played.len());

    let table = h.engine.standings(t.id).unwrap();
    assert!(table.iter().all(|s| s.byes <= 1));
    assert_eq!(
        h.engine.tournament(t.id).unwrap().status,
        TournamentStatus::Completed
    );
}

#[test]
fn next_round_waits_for_every_match() {
    let h = harness(4);
    let t = h.started(Format::Swiss, BestOf::Bo1);
    let round_1 = h
        .engine
        .matches(t.id, Some((BracketKind::Swiss, 1)))
        .unwrap();
    h.play(round_1[0].id, TeamSlot::One);
    assert!(h
        .engine
        .matches(t.id, Some((BracketKind::Swiss, 2)))
        .unwrap()
        .is_empty());

    h.play(round_1[1].id, TeamSlot::One);
    let round_2 = h
        .engine
        .matches(t.id, Some((BracketKind::Swiss, 2)))
        .unwrap();
    assert_eq!(round_2.len(), 2);
    // Winners meet winners.
    let (a, c) = (h.teams[0].id, h.teams[2].id);
    assert_eq!(round_2[0].teams(), Some((a, c)));
    assert_eq!(h.engine.tournament(t.id).unwrap().current_round, 2);

    // Re-delivering the last result does not pair the round twice.
    let effects = h.engine.advance(&h.admin, round_1[1].id, now()).unwrap();
    assert!(effects.is_empty());
    assert_eq!(
        h.engine
            .matches(t.id, Some((BracketKind::Swiss, 2)))
            .unwrap(),
        round_2
    );
}

#[test]
fn standings_break_ties_by_head_to_head_then_seed() {
    let h = harness(4);
    let t = h.started(Format::Swiss, BestOf::Bo1);
    play_round(&h, &t, 1);

    let table = h.engine.standings(t.id).unwrap();
    let (a, b, c, d) = (h.teams[0].id, h.teams[1].id, h.teams[2].id, h.teams[3].id);
    assert_eq!(
        table.iter().map(|s| s.team).collect::<Vec<_>>(),
        vec![a, c, b, d]
    );
    assert_eq!(table[0].wins, 1);
    assert_eq!(table[2].losses, 1);
    // B and D both lost to 1-0 teams, so the seed decides.
    assert_eq!(table[2].opponent_win_pct, table[3].opponent_win_pct);
    assert!(table[2].tiebreak_seed < table[3].tiebreak_seed);
}

#[test]
fn pairing_is_deterministic() {
    let h = harness(6);
    let t = h.started(Format::Swiss, BestOf::Bo1);
    play_round(&h, &t, 1);
    let t = h.engine.tournament(t.id).unwrap();
    let history = h
        .engine
        .matches(t.id, Some((BracketKind::Swiss, 1)))
        .unwrap();
    assert_eq!(
        pair_round(&t, &history, 2, now()),
        pair_round(&t, &history, 2, now())
    );
}

#[test]
fn standings_are_only_for_swiss() {
    let h = harness(4);
    let t = h.started(Format::SingleElimination, BestOf::Bo1);
    assert!(matches!(
        h.engine.standings(t.id),
        Err(EngineError::InvalidTournamentState { .. })
    ));
}
