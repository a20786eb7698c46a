//! Shared fixtures: an in-memory engine, generated teams and a driver that plays a match out.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use esports_tournament_engine::logic::generate_test_teams;
use esports_tournament_engine::{
    Actor, BestOf, Engine, EngineSettings, EventLog, Expected, Format, Match, MatchAction,
    MatchId, MatchState, MemoryStore, NewTournament, Score, Seeding, Side, Team, TeamId,
    TeamRegistry, TeamSlot, Tournament,
};
use std::sync::Arc;
use uuid::Uuid;

pub struct Harness {
    pub engine: Engine,
    pub registry: Arc<TeamRegistry>,
    pub events: Arc<EventLog>,
    pub admin: Actor,
    pub teams: Vec<Team>,
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap()
}

pub fn harness(team_count: usize) -> Harness {
    harness_with(team_count, EngineSettings::default())
}

pub fn harness_with(team_count: usize, settings: EngineSettings) -> Harness {
    let registry = Arc::new(TeamRegistry::new());
    let teams = generate_test_teams(team_count, 7);
    for t in &teams {
        registry.upsert(t.clone()).unwrap();
    }
    let events = Arc::new(EventLog::new());
    let engine = Engine::new(
        Arc::new(MemoryStore::new()),
        registry.clone(),
        events.clone(),
        settings,
    );
    Harness {
        engine,
        registry,
        events,
        admin: Actor::Admin {
            user: Uuid::from_u128(1),
        },
        teams,
    }
}

impl Harness {
    /// Default draft: ranked seeding, fixed seed, target equal to the harness field.
    pub fn draft(&self, format: Format, best_of: BestOf) -> NewTournament {
        NewTournament {
            name: "Spring Cup".to_string(),
            format,
            best_of,
            target_team_count: self.teams.len(),
            seeding: Seeding::Ranked,
            seed: Some(42),
            swiss_rounds: None,
            grand_final_reset: None,
        }
    }

    /// Create a tournament from `draft` with every harness team registered, not yet started.
    pub fn register_all(&self, draft: NewTournament) -> Tournament {
        let t = self
            .engine
            .create_tournament(&self.admin, draft, now())
            .unwrap();
        for team in &self.teams {
            self.engine
                .register_team(&self.admin, t.id, team.id)
                .unwrap();
        }
        self.engine.tournament(t.id).unwrap()
    }

    pub fn tournament(&self, format: Format, best_of: BestOf) -> Tournament {
        self.register_all(self.draft(format, best_of))
    }

    pub fn started(&self, format: Format, best_of: BestOf) -> Tournament {
        let t = self.tournament(format, best_of);
        self.engine
            .start_tournament(&self.admin, t.id, false, now())
            .unwrap()
    }

    pub fn captain(&self, team: TeamId) -> Actor {
        let t = self.teams.iter().find(|t| t.id == team).unwrap();
        Actor::Team {
            user: t.captain,
            team: t.id,
        }
    }

    pub fn act(&self, id: MatchId, actor: &Actor, action: MatchAction) -> Match {
        let m = self.engine.get_match(id).unwrap();
        self.engine
            .apply(id, Expected::of(&m), actor, action, now())
            .unwrap()
    }

    /// Drive a scheduled match to the side pick being done (state `playing`).
    pub fn to_playing(&self, id: MatchId) -> Match {
        let m = self.engine.get_match(id).unwrap();
        let (a, b) = m.teams().unwrap();
        if m.state == MatchState::Scheduled {
            self.act(id, &self.admin, MatchAction::OpenReadyUp);
        }
        self.act(id, &self.captain(a), MatchAction::Ready);
        let mut m = self.act(id, &self.captain(b), MatchAction::Ready);
        while m.state == MatchState::MapBanning {
            let turn = self.engine.next_veto_action(id).unwrap();
            m = self.act(
                id,
                &self.captain(turn.acting_team),
                MatchAction::Ban {
                    map: turn.remaining_maps[0].clone(),
                },
            );
        }
        let chooser = m.team(m.side_chooser.unwrap()).unwrap();
        self.act(
            id,
            &self.captain(chooser),
            MatchAction::ChooseSide { side: Side::Attack },
        )
    }

    /// Play the match out with both captains reporting the same result.
    pub fn play(&self, id: MatchId, winner: TeamSlot) -> Match {
        let m = self.to_playing(id);
        let (a, b) = m.teams().unwrap();
        let win = m.best_of.maps_to_win();
        let score = match winner {
            TeamSlot::One => Score::new(win, 0),
            TeamSlot::Two => Score::new(0, win),
        };
        self.act(id, &self.captain(a), MatchAction::SubmitScore { score });
        self.act(id, &self.captain(b), MatchAction::SubmitScore { score })
    }

    /// Play `id` so that `team` wins.
    pub fn win(&self, id: MatchId, team: TeamId) -> Match {
        let m = self.engine.get_match(id).unwrap();
        let slot = m.slot_of(team).unwrap();
        self.play(id, slot)
    }

    /// Matches with two teams that are still waiting to be played.
    pub fn playable(&self, t: &Tournament) -> Vec<Match> {
        self.engine
            .matches(t.id, None)
            .unwrap()
            .into_iter()
            .filter(|m| m.state == MatchState::Scheduled && m.teams().is_some())
            .collect()
    }
}
