//! Concurrent writers on the same match: compare-and-swap keeps exactly one outcome.

mod common;

use common::{harness, now, Harness};
use esports_tournament_engine::{
    Actor, BestOf, BracketKind, EngineError, EngineEvent, Expected, Format, Match, MatchAction,
    MatchId, MatchState, Position, Score, TeamSlot, TournamentStatus,
};
use std::sync::Barrier;
use std::thread;

/// Submit with client-style retries: on a stale read, re-read and try again.
fn submit(
    h: &Harness,
    id: MatchId,
    actor: &Actor,
    score: Score,
    barrier: &Barrier,
) -> Result<Match, EngineError> {
    let seen = h.engine.get_match(id).unwrap();
    barrier.wait();
    let mut expected = Expected::of(&seen);
    loop {
        match h.engine.apply(id, expected, actor, MatchAction::SubmitScore { score }, now()) {
            Err(e) if e.is_retryable() => {
                expected = Expected::of(&h.engine.get_match(id).unwrap());
            }
            other => return other,
        }
    }
}

#[test]
fn simultaneous_conflicting_reports_end_in_one_dispute() {
    for _ in 0..20 {
        let h = harness(2);
        let t = h.started(Format::SingleElimination, BestOf::Bo1);
        let m = h.engine.matches(t.id, None).unwrap().remove(0);
        let (a, b) = m.teams().unwrap();
        h.to_playing(m.id);
        let (one, two) = (h.captain(a), h.captain(b));
        let barrier = Barrier::new(2);

        let (r1, r2) = thread::scope(|s| {
            let x = s.spawn(|| submit(&h, m.id, &one, Score::new(13, 7), &barrier));
            let y = s.spawn(|| submit(&h, m.id, &two, Score::new(7, 13), &barrier));
            (x.join().unwrap(), y.join().unwrap())
        });
        assert!(r1.is_ok() && r2.is_ok());

        let stored = h.engine.get_match(m.id).unwrap();
        assert_eq!(stored.state, MatchState::Disputed);
        assert_eq!(stored.disputes.len(), 1);
        assert!(stored.winner.is_none());
        let opened = h
            .events
            .events()
            .into_iter()
            .filter(|e| matches!(e, EngineEvent::DisputeOpened { .. }))
            .count();
        assert_eq!(opened, 1);
    }
}

#[test]
fn simultaneous_matching_reports_complete_once() {
    for _ in 0..20 {
        let h = harness(2);
        let t = h.started(Format::SingleElimination, BestOf::Bo1);
        let m = h.engine.matches(t.id, None).unwrap().remove(0);
        let (a, b) = m.teams().unwrap();
        h.to_playing(m.id);
        let (one, two) = (h.captain(a), h.captain(b));
        let barrier = Barrier::new(2);

        let (r1, r2) = thread::scope(|s| {
            let x = s.spawn(|| submit(&h, m.id, &one, Score::new(13, 11), &barrier));
            let y = s.spawn(|| submit(&h, m.id, &two, Score::new(13, 11), &barrier));
            (x.join().unwrap(), y.join().unwrap())
        });
        let completed = [&r1, &r2]
            .iter()
            .filter(|r| matches!(r, Ok(m) if m.state == MatchState::Complete))
            .count();
        assert_eq!(completed, 1);

        let stored = h.engine.get_match(m.id).unwrap();
        assert_eq!(stored.state, MatchState::Complete);
        assert_eq!(stored.winner, Some(a));
        let t = h.engine.tournament(t.id).unwrap();
        assert_eq!(t.status, TournamentStatus::Completed);
        let finishes = h
            .events
            .events()
            .into_iter()
            .filter(|e| matches!(e, EngineEvent::MatchStateChanged { to: MatchState::Complete, .. }))
            .count();
        assert_eq!(finishes, 1);
    }
}

#[test]
fn racing_admin_writes_leave_one_winner() {
    let h = harness(2);
    let t = h.started(Format::SingleElimination, BestOf::Bo1);
    let m = h.engine.matches(t.id, None).unwrap().remove(0);
    let seen = Expected::of(&m);
    let barrier = Barrier::new(2);

    let results: Vec<Result<Match, EngineError>> = thread::scope(|s| {
        let forfeit = s.spawn(|| {
            barrier.wait();
            h.engine.apply(
                m.id,
                seen,
                &h.admin,
                MatchAction::ForceForfeit {
                    winner: TeamSlot::One,
                },
                now(),
            )
        });
        let cancel = s.spawn(|| {
            barrier.wait();
            h.engine.apply(m.id, seen, &h.admin, MatchAction::Cancel, now())
        });
        vec![forfeit.join().unwrap(), cancel.join().unwrap()]
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(EngineError::StaleState { .. }))));
    assert!(h.engine.get_match(m.id).unwrap().state.is_terminal());
}

#[test]
fn semifinals_finishing_together_both_reach_the_final() {
    for _ in 0..20 {
        let h = harness(4);
        let t = h.started(Format::SingleElimination, BestOf::Bo1);
        let semis = h.engine.matches(t.id, None).unwrap();
        let mut closers = Vec::new();
        for m in &semis {
            let (a, b) = m.teams().unwrap();
            h.to_playing(m.id);
            h.act(
                m.id,
                &h.captain(a),
                MatchAction::SubmitScore {
                    score: Score::new(13, 9),
                },
            );
            closers.push((m.id, h.captain(b)));
        }
        let barrier = Barrier::new(2);

        thread::scope(|s| {
            let handles: Vec<_> = closers
                .iter()
                .map(|(id, actor)| {
                    let (h, barrier) = (&h, &barrier);
                    s.spawn(move || submit(h, *id, actor, Score::new(13, 9), barrier))
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap().unwrap().state, MatchState::Complete);
            }
        });

        let final_id = Position::new(BracketKind::Winners, 2, 0).match_id(t.id);
        let final_match = h.engine.get_match(final_id).unwrap();
        assert_eq!(
            final_match.teams(),
            Some((semis[0].team_1.team().unwrap(), semis[1].team_1.team().unwrap()))
        );
        assert_eq!(final_match.state, MatchState::Scheduled);
        assert_eq!(h.engine.matches(t.id, None).unwrap().len(), 3);
    }
}
