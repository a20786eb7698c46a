//! Setup phase: registration checks, field validation and test-team generation.

use crate::models::{
    EngineError, Team, TeamId, Tournament, ACTIVE_ROSTER_SIZE,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use uuid::Uuid;

/// Add `team` to the tournament's list (registration must still be open).
/// `entered` holds the teams already registered; tags must stay unique among them.
pub fn register_team(
    tournament: &mut Tournament,
    team: &Team,
    entered: &[Team],
) -> Result<(), EngineError> {
    if !tournament.is_accepting_teams() {
        return Err(EngineError::InvalidTournamentState {
            status: tournament.status,
            action: "register a team",
        });
    }
    if !team.registered {
        return Err(EngineError::TeamNotRegistered(team.id));
    }
    if !team.tag_is_valid() {
        return Err(EngineError::InvalidTag(team.tag.clone()));
    }
    if tournament.teams.contains(&team.id) {
        return Err(EngineError::DuplicateTeam(team.id));
    }
    if entered.iter().any(|other| other.tag_key() == team.tag_key()) {
        return Err(EngineError::DuplicateTag(team.tag.clone()));
    }
    tournament.teams.push(team.id);
    Ok(())
}

/// Check the tournament may start: registration open and, unless forced, the target reached.
pub fn check_startable(tournament: &Tournament, force: bool) -> Result<(), EngineError> {
    if !tournament.is_accepting_teams() {
        return Err(EngineError::InvalidTournamentState {
            status: tournament.status,
            action: "start the tournament",
        });
    }
    let registered = tournament.teams.len();
    if !force && registered < tournament.target_team_count {
        return Err(EngineError::TargetNotReached {
            registered,
            target: tournament.target_team_count,
        });
    }
    Ok(())
}

/// Reject fields a bracket cannot be built from: fewer than 2 teams, repeated ids,
/// unregistered teams, bad or repeated tags (tags compare case-insensitively).
pub fn validate_field(teams: &[Team]) -> Result<(), EngineError> {
    if teams.len() < 2 {
        return Err(EngineError::InsufficientTeams(teams.len()));
    }
    let mut ids: HashSet<TeamId> = HashSet::new();
    let mut tags: HashSet<String> = HashSet::new();
    for team in teams {
        if !ids.insert(team.id) {
            return Err(EngineError::DuplicateTeam(team.id));
        }
        if !team.registered {
            return Err(EngineError::TeamNotRegistered(team.id));
        }
        if !team.tag_is_valid() {
            return Err(EngineError::InvalidTag(team.tag.clone()));
        }
        if !tags.insert(team.tag_key()) {
            return Err(EngineError::DuplicateTag(team.tag.clone()));
        }
    }
    Ok(())
}

/// Most teams a single `generate_test_teams` call produces.
pub const MAX_TEST_TEAMS: usize = 256;

/// Generate `count` registered teams with full lineups, for exercising brackets.
/// Counts above `MAX_TEST_TEAMS` are clamped.
pub fn generate_test_teams(count: usize, seed: u64) -> Vec<Team> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count.min(MAX_TEST_TEAMS))
        .map(|i| {
            let captain = Uuid::from_u128(rng.gen());
            let mut team = Team::new(format!("Test Team {}", i + 1), format!("T{:03}", i + 1), captain);
            team.id = Uuid::from_u128(rng.gen());
            team.add_member(captain);
            while team.active_players.len() < ACTIVE_ROSTER_SIZE {
                team.add_member(Uuid::from_u128(rng.gen()));
            }
            team
        })
        .collect()
}
