//! Integration tests for the per-match protocol: ready-up, veto, sides, results and disputes.

mod common;

use chrono::Duration;
use common::{harness, harness_with, now, Harness};
use esports_tournament_engine::{
    Actor, BestOf, DisputeDecision, EngineError, EngineSettings, Expected, Format, Match,
    MatchAction, MatchId, MatchState, Outcome, Score, Side, SideRule, TeamSlot,
    TournamentStatus,
};
use std::collections::HashSet;
use uuid::Uuid;

/// Two teams, one match: the final.
fn single_match(best_of: BestOf) -> (Harness, Match) {
    let h = harness(2);
    let t = h.started(Format::SingleElimination, best_of);
    let m = h.engine.matches(t.id, None).unwrap().remove(0);
    (h, m)
}

fn captains(h: &Harness, m: &Match) -> (Actor, Actor) {
    let (a, b) = m.teams().unwrap();
    (h.captain(a), h.captain(b))
}

#[test]
fn both_teams_ready_opens_the_veto() {
    let (h, m) = single_match(BestOf::Bo1);
    let (one, two) = captains(&h, &m);
    let m = h.act(m.id, &h.admin, MatchAction::OpenReadyUp);
    assert_eq!(m.state, MatchState::ReadyUp);
    assert_eq!(m.ready_deadline, Some(now() + Duration::seconds(300)));

    let m = h.act(m.id, &one, MatchAction::Ready);
    assert_eq!(m.state, MatchState::ReadyUp);
    let m = h.act(m.id, &two, MatchAction::Ready);
    assert_eq!(m.state, MatchState::MapBanning);
    assert_eq!(m.map_pool.len(), 7);
    assert!(m.ready_deadline.is_none());
}

#[test]
fn bo1_veto_ends_after_six_bans_with_one_map() {
    let (h, m) = single_match(BestOf::Bo1);
    let (one, two) = captains(&h, &m);
    h.act(m.id, &h.admin, MatchAction::OpenReadyUp);
    h.act(m.id, &one, MatchAction::Ready);
    h.act(m.id, &two, MatchAction::Ready);

    let bans = ["Ascent", "Bind", "Haven", "Split", "Lotus", "Sunset"];
    let mut last = None;
    for (i, map) in bans.iter().enumerate() {
        let actor = if i % 2 == 0 { &one } else { &two };
        let turn = h.engine.next_veto_action(m.id).unwrap();
        assert_eq!(turn.acting_slot, if i % 2 == 0 { TeamSlot::One } else { TeamSlot::Two });
        assert_eq!(turn.remaining_maps.len(), 7 - i);
        last = Some(h.act(m.id, actor, MatchAction::Ban { map: map.to_string() }));
    }
    let m = last.unwrap();
    assert_eq!(m.state, MatchState::SideSelection);
    assert_eq!(m.maps, vec!["Icebox".to_string()]);
    assert_eq!(m.veto.len(), 6);
    // Team 2 made the last ban, so team 1 picks.
    assert_eq!(m.side_chooser, Some(TeamSlot::One));
}

#[test]
fn bo3_veto_leaves_three_maps() {
    let (h, m) = single_match(BestOf::Bo3);
    let (one, two) = captains(&h, &m);
    h.act(m.id, &h.admin, MatchAction::OpenReadyUp);
    h.act(m.id, &one, MatchAction::Ready);
    h.act(m.id, &two, MatchAction::Ready);

    for (i, map) in ["Ascent", "Bind", "Haven", "Split"].iter().enumerate() {
        let actor = if i % 2 == 0 { &one } else { &two };
        h.act(m.id, actor, MatchAction::Ban { map: map.to_string() });
    }
    let m = h.engine.get_match(m.id).unwrap();
    assert_eq!(m.state, MatchState::SideSelection);
    assert_eq!(m.maps, vec!["Lotus", "Sunset", "Icebox"]);
}

#[test]
fn veto_rejects_out_of_turn_and_unavailable_maps() {
    let (h, m) = single_match(BestOf::Bo1);
    let (one, two) = captains(&h, &m);
    h.act(m.id, &h.admin, MatchAction::OpenReadyUp);
    h.act(m.id, &one, MatchAction::Ready);
    let m = h.act(m.id, &two, MatchAction::Ready);

    let err = h
        .engine
        .apply(m.id, Expected::of(&m), &two, MatchAction::Ban { map: "Bind".into() }, now())
        .unwrap_err();
    assert_eq!(err, EngineError::OutOfTurn(m.team_2.team().unwrap()));

    let err = h
        .engine
        .apply(m.id, Expected::of(&m), &one, MatchAction::Ban { map: "Dust2".into() }, now())
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidMap(_)));

    // Names match case-insensitively and are stored as the pool spells them.
    let m = h.act(m.id, &one, MatchAction::Ban { map: "bind".into() });
    assert_eq!(m.veto[0].map, "Bind");

    let err = h
        .engine
        .apply(m.id, Expected::of(&m), &two, MatchAction::Ban { map: "BIND".into() }, now())
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidMap(_)));
    assert_eq!(h.engine.get_match(m.id).unwrap().veto.len(), 1);
}

#[test]
fn only_the_chooser_picks_sides() {
    let (h, m) = single_match(BestOf::Bo1);
    let (one, two) = captains(&h, &m);
    h.act(m.id, &h.admin, MatchAction::OpenReadyUp);
    h.act(m.id, &one, MatchAction::Ready);
    h.act(m.id, &two, MatchAction::Ready);
    for i in 0..6 {
        let turn = h.engine.next_veto_action(m.id).unwrap();
        let actor = if i % 2 == 0 { &one } else { &two };
        h.act(m.id, actor, MatchAction::Ban { map: turn.remaining_maps[0].clone() });
    }
    let m = h.engine.get_match(m.id).unwrap();
    let err = h
        .engine
        .apply(m.id, Expected::of(&m), &two, MatchAction::ChooseSide { side: Side::Attack }, now())
        .unwrap_err();
    assert!(matches!(err, EngineError::OutOfTurn(_)));

    let m = h.act(m.id, &one, MatchAction::ChooseSide { side: Side::Defense });
    assert_eq!(m.state, MatchState::Playing);
    let sides = m.sides.unwrap();
    assert_eq!(sides.team_1, Side::Defense);
    assert_eq!(sides.team_2, Side::Attack);
}

#[test]
fn agreeing_reports_complete_the_match() {
    let (h, m) = single_match(BestOf::Bo1);
    let (one, two) = captains(&h, &m);
    h.to_playing(m.id);

    let m1 = h.act(m.id, &one, MatchAction::SubmitScore { score: Score::new(13, 9) });
    assert_eq!(m1.state, MatchState::WaitingResults);
    assert!(m1.score.is_none());

    let done = h.act(m.id, &two, MatchAction::SubmitScore { score: Score::new(13, 9) });
    assert_eq!(done.state, MatchState::Complete);
    assert_eq!(done.outcome, Some(Outcome::Played));
    assert_eq!(done.winner, m.team_1.team());
    assert!(done.result_is_consistent());

    // The only match was the final.
    let t = h.engine.tournament(m.tournament_id).unwrap();
    assert_eq!(t.status, TournamentStatus::Completed);
    assert_eq!(t.champion, m.team_1.team());
}

#[test]
fn tied_reports_are_rejected() {
    let (h, m) = single_match(BestOf::Bo1);
    let (one, _) = captains(&h, &m);
    let m = h.to_playing(m.id);
    let err = h
        .engine
        .apply(
            m.id,
            Expected::of(&m),
            &one,
            MatchAction::SubmitScore { score: Score::new(12, 12) },
            now(),
        )
        .unwrap_err();
    assert_eq!(err, EngineError::TieScoreRejected);
    assert_eq!(h.engine.get_match(m.id).unwrap().state, MatchState::Playing);
}

#[test]
fn conflicting_reports_open_a_dispute_and_admin_override_completes() {
    let (h, m) = single_match(BestOf::Bo1);
    let (one, two) = captains(&h, &m);
    h.to_playing(m.id);
    h.act(m.id, &one, MatchAction::SubmitScore { score: Score::new(13, 7) });
    let disputed = h.act(m.id, &two, MatchAction::SubmitScore { score: Score::new(7, 13) });

    assert_eq!(disputed.state, MatchState::Disputed);
    assert_eq!(disputed.disputes.len(), 1);
    assert_eq!(disputed.disputes[0].team_1_submission, Score::new(13, 7));
    assert_eq!(disputed.disputes[0].team_2_submission, Score::new(7, 13));
    assert!(disputed.winner.is_none());

    // A further report while disputed is refused.
    let err = h
        .engine
        .apply(
            m.id,
            Expected::of(&disputed),
            &one,
            MatchAction::SubmitScore { score: Score::new(13, 7) },
            now(),
        )
        .unwrap_err();
    assert_eq!(err, EngineError::DuplicateDispute);

    // Captains cannot resolve.
    let err = h
        .engine
        .resolve_dispute(
            m.id,
            Expected::of(&disputed),
            &one,
            DisputeDecision::Override { score: Score::new(13, 7) },
            "we won".into(),
            now(),
        )
        .unwrap_err();
    assert_eq!(err, EngineError::Unauthorized);

    let done = h
        .engine
        .resolve_dispute(
            m.id,
            Expected::of(&disputed),
            &h.admin,
            DisputeDecision::Override { score: Score::new(13, 7) },
            "checked the demo".into(),
            now(),
        )
        .unwrap();
    assert_eq!(done.state, MatchState::Complete);
    assert_eq!(done.winner, m.team_1.team());
    assert_eq!(done.outcome, Some(Outcome::AdminDecision));
    assert_eq!(done.disputes.len(), 1);
    assert_eq!(done.disputes[0].team_2_submission, Score::new(7, 13));
    assert!(done.disputes[0].resolution.is_some());
}

#[test]
fn dismissed_dispute_returns_to_playing() {
    let (h, m) = single_match(BestOf::Bo1);
    let (one, two) = captains(&h, &m);
    h.to_playing(m.id);
    h.act(m.id, &one, MatchAction::SubmitScore { score: Score::new(13, 7) });
    h.act(m.id, &two, MatchAction::SubmitScore { score: Score::new(7, 13) });

    let m = h.act(
        m.id,
        &h.admin,
        MatchAction::ResolveDispute {
            decision: DisputeDecision::Dismiss,
            note: "replay the reports".into(),
        },
    );
    assert_eq!(m.state, MatchState::Playing);
    assert!(m.submission_1.is_none() && m.submission_2.is_none());
    assert!(m.open_dispute().is_none());

    h.act(m.id, &one, MatchAction::SubmitScore { score: Score::new(7, 13) });
    let done = h.act(m.id, &two, MatchAction::SubmitScore { score: Score::new(7, 13) });
    assert_eq!(done.state, MatchState::Complete);
    assert_eq!(done.winner, done.team_2.team());
    assert_eq!(done.disputes.len(), 1);
}

#[test]
fn tied_override_is_rejected() {
    let (h, m) = single_match(BestOf::Bo1);
    let (one, two) = captains(&h, &m);
    h.to_playing(m.id);
    h.act(m.id, &one, MatchAction::SubmitScore { score: Score::new(13, 7) });
    let m = h.act(m.id, &two, MatchAction::SubmitScore { score: Score::new(7, 13) });
    let err = h
        .engine
        .resolve_dispute(
            m.id,
            Expected::of(&m),
            &h.admin,
            DisputeDecision::Override { score: Score::new(10, 10) },
            String::new(),
            now(),
        )
        .unwrap_err();
    assert_eq!(err, EngineError::TieScoreRejected);
}

#[test]
fn outsiders_cannot_act() {
    let (h, m) = single_match(BestOf::Bo1);
    let m = h.act(m.id, &h.admin, MatchAction::OpenReadyUp);
    let stranger = Actor::Team {
        user: Uuid::from_u128(99),
        team: Uuid::from_u128(98),
    };
    let err = h
        .engine
        .apply(m.id, Expected::of(&m), &stranger, MatchAction::Ready, now())
        .unwrap_err();
    assert_eq!(err, EngineError::Unauthorized);

    let (one, _) = captains(&h, &m);
    let err = h
        .engine
        .apply(m.id, Expected::of(&m), &one, MatchAction::Cancel, now())
        .unwrap_err();
    assert_eq!(err, EngineError::Unauthorized);
}

#[test]
fn stale_expectation_is_rejected_without_writing() {
    let (h, m) = single_match(BestOf::Bo1);
    let (one, _) = captains(&h, &m);
    let seen = Expected::of(&m);
    h.act(m.id, &h.admin, MatchAction::OpenReadyUp);

    let err = h
        .engine
        .apply(m.id, seen, &one, MatchAction::Ready, now())
        .unwrap_err();
    assert!(err.is_retryable());
    let stored = h.engine.get_match(m.id).unwrap();
    assert_eq!(stored.version, 1);
    assert!(!stored.ready_1);
}

#[test]
fn ready_timeout_forfeits_the_absent_team() {
    let (h, m) = single_match(BestOf::Bo3);
    let (_, two) = captains(&h, &m);
    h.act(m.id, &h.admin, MatchAction::OpenReadyUp);
    let m = h.act(m.id, &two, MatchAction::Ready);

    let early = h
        .engine
        .apply(m.id, Expected::of(&m), &Actor::System, MatchAction::ExpireReady, now())
        .unwrap_err();
    assert_eq!(early, EngineError::ReadyWindowOpen);

    let later = now() + Duration::seconds(301);
    assert_eq!(h.engine.expire_ready_checks(later).unwrap(), 1);
    let done = h.engine.get_match(m.id).unwrap();
    assert_eq!(done.state, MatchState::Complete);
    assert_eq!(done.outcome, Some(Outcome::Walkover));
    assert_eq!(done.winner, m.team_2.team());
    assert_eq!(done.score, Some(Score::new(0, 2)));
}

#[test]
fn ready_timeout_with_nobody_ready_renews_the_window() {
    let (h, m) = single_match(BestOf::Bo1);
    let m = h.act(m.id, &h.admin, MatchAction::OpenReadyUp);
    let later = now() + Duration::seconds(400);
    let renewed = h
        .engine
        .apply(m.id, Expected::of(&m), &Actor::System, MatchAction::ExpireReady, later)
        .unwrap();
    assert_eq!(renewed.state, MatchState::ReadyUp);
    assert_eq!(renewed.ready_deadline, Some(later + Duration::seconds(300)));
}

#[test]
fn ready_up_needs_full_lineups() {
    let (h, m) = single_match(BestOf::Bo1);
    let (a, _) = m.teams().unwrap();
    let mut short = h.teams.iter().find(|t| t.id == a).unwrap().clone();
    short.active_players.pop();
    h.registry.upsert(short).unwrap();

    let err = h
        .engine
        .apply(m.id, Expected::of(&m), &h.admin, MatchAction::OpenReadyUp, now())
        .unwrap_err();
    assert_eq!(err, EngineError::InsufficientRoster { team: a, active: 4 });
}

#[test]
fn admin_forfeit_and_cancel_are_terminal() {
    let (h, m) = single_match(BestOf::Bo1);
    h.to_playing(m.id);
    let done = h.act(m.id, &h.admin, MatchAction::ForceForfeit { winner: TeamSlot::Two });
    assert_eq!(done.state, MatchState::Complete);
    assert_eq!(done.outcome, Some(Outcome::Walkover));
    assert_eq!(done.winner, m.team_2.team());

    let err = h
        .engine
        .apply(m.id, Expected::of(&done), &h.admin, MatchAction::Cancel, now())
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    let (h, m) = single_match(BestOf::Bo1);
    let cancelled = h.act(m.id, &h.admin, MatchAction::Cancel);
    assert_eq!(cancelled.state, MatchState::Cancelled);
    assert!(cancelled.winner.is_none());
    assert!(cancelled.result_is_consistent());
}

#[test]
fn unready_restarts_the_ready_clock() {
    let (h, m) = single_match(BestOf::Bo1);
    let (one, two) = captains(&h, &m);
    h.act(m.id, &h.admin, MatchAction::OpenReadyUp);
    let m = h.act(m.id, &one, MatchAction::Ready);

    let later = now() + Duration::seconds(120);
    let m = h
        .engine
        .apply(m.id, Expected::of(&m), &one, MatchAction::Unready, later)
        .unwrap();
    assert_eq!(m.state, MatchState::ReadyUp);
    assert!(!m.ready_1);
    assert_eq!(m.ready_deadline, Some(later + Duration::seconds(300)));

    // The original window would have run out by now; the renewed one has not.
    let before_deadline = now() + Duration::seconds(360);
    let err = h
        .engine
        .apply(m.id, Expected::of(&m), &Actor::System, MatchAction::ExpireReady, before_deadline)
        .unwrap_err();
    assert_eq!(err, EngineError::ReadyWindowOpen);

    // Un-ready needs a prior ready.
    let err = h
        .engine
        .apply(m.id, Expected::of(&m), &two, MatchAction::Unready, later)
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

/// Ready both teams and ban until only the played maps remain.
fn finish_veto(h: &Harness, id: MatchId) -> Match {
    let m = h.act(id, &h.admin, MatchAction::OpenReadyUp);
    let (one, two) = captains(h, &m);
    h.act(id, &one, MatchAction::Ready);
    let mut m = h.act(id, &two, MatchAction::Ready);
    while m.state == MatchState::MapBanning {
        let turn = h.engine.next_veto_action(id).unwrap();
        m = h.act(
            id,
            &h.captain(turn.acting_team),
            MatchAction::Ban { map: turn.remaining_maps[0].clone() },
        );
    }
    m
}

#[test]
fn coin_flip_picks_the_bo1_side_chooser() {
    let settings = EngineSettings {
        bo1_side_rule: SideRule::CoinFlip,
        ..EngineSettings::default()
    };
    let mut choosers = HashSet::new();
    for _ in 0..32 {
        let h = harness_with(2, settings.clone());
        let t = h.started(Format::SingleElimination, BestOf::Bo1);
        let m = finish_veto(&h, h.engine.matches(t.id, None).unwrap()[0].id);
        assert_eq!(m.state, MatchState::SideSelection);
        choosers.insert(m.side_chooser.unwrap());
    }
    // Under the veto-loser rule slot one would choose every time.
    assert_eq!(choosers.len(), 2);

    // BO3 keeps the veto-loser rule.
    let h = harness_with(2, settings);
    let t = h.started(Format::SingleElimination, BestOf::Bo3);
    let m = finish_veto(&h, h.engine.matches(t.id, None).unwrap()[0].id);
    assert_eq!(m.side_chooser, Some(m.veto.last().unwrap().slot.other()));
}

#[test]
fn only_rostered_players_act_for_a_team() {
    let (h, m) = single_match(BestOf::Bo1);
    let (a, _) = m.teams().unwrap();
    let m = h.act(m.id, &h.admin, MatchAction::OpenReadyUp);
    let impostor = Actor::Team {
        user: Uuid::from_u128(97),
        team: a,
    };
    let err = h
        .engine
        .apply(m.id, Expected::of(&m), &impostor, MatchAction::Ready, now())
        .unwrap_err();
    assert_eq!(err, EngineError::Unauthorized);

    // Any roster member may act, not only the captain.
    let team = h.teams.iter().find(|t| t.id == a).unwrap();
    let member = team.roster.iter().find(|r| r.user != team.captain).unwrap();
    let m = h.act(
        m.id,
        &Actor::Team {
            user: member.user,
            team: a,
        },
        MatchAction::Ready,
    );
    assert!(m.is_ready(TeamSlot::One));
}
