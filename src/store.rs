//! Persistence boundary: versioned compare-and-swap on matches and tournaments,
//! plus the read-only team directory. In-memory implementations back the server and tests.

use crate::models::{
    BracketKind, EngineError, Match, MatchId, Team, TeamId, Tournament, TournamentId,
};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Transactional storage for tournaments and matches.
///
/// Every write is a compare-and-swap on the stored version: the call succeeds only if the
/// record still carries `expected_version`, and otherwise returns `StaleState` with nothing written.
pub trait Store: Send + Sync {
    fn tournament(&self, id: TournamentId) -> Result<Tournament, EngineError>;
    fn tournaments(&self) -> Result<Vec<Tournament>, EngineError>;
    fn insert_tournament(&self, tournament: Tournament) -> Result<(), EngineError>;
    fn swap_tournament(
        &self,
        expected_version: u64,
        next: Tournament,
    ) -> Result<Tournament, EngineError>;

    fn get_match(&self, id: MatchId) -> Result<Match, EngineError>;
    /// All matches of a tournament ordered by bracket position.
    fn matches(&self, tournament: TournamentId) -> Result<Vec<Match>, EngineError>;
    /// Insert `m` unless a match with its id exists; returns whichever is stored.
    fn insert_match_if_absent(&self, m: Match) -> Result<Match, EngineError>;
    fn swap_match(&self, expected_version: u64, next: Match) -> Result<Match, EngineError>;
    /// Atomically swap the tournament and insert a freshly built bracket. All or nothing.
    fn commit_bracket(
        &self,
        expected_version: u64,
        tournament: Tournament,
        matches: Vec<Match>,
    ) -> Result<Tournament, EngineError>;

    fn matches_in_round(
        &self,
        tournament: TournamentId,
        bracket: BracketKind,
        round: u32,
    ) -> Result<Vec<Match>, EngineError> {
        Ok(self
            .matches(tournament)?
            .into_iter()
            .filter(|m| m.position.bracket == bracket && m.position.round == round)
            .collect())
    }
}

/// Source of team and roster data owned by the registration service.
pub trait TeamDirectory: Send + Sync {
    fn team(&self, id: TeamId) -> Result<Team, EngineError>;
}

#[derive(Default)]
struct Tables {
    tournaments: HashMap<TournamentId, Tournament>,
    matches: HashMap<MatchId, Match>,
}

/// In-memory store: all tables behind one lock so bracket commits are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, EngineError> {
        self.tables
            .read()
            .map_err(|_| EngineError::Storage("lock error".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, EngineError> {
        self.tables
            .write()
            .map_err(|_| EngineError::Storage("lock error".to_string()))
    }
}

fn check_version(expected: u64, found: u64) -> Result<(), EngineError> {
    if expected != found {
        log::debug!("Rejected write: expected version {}, found {}", expected, found);
        return Err(EngineError::StaleState { expected, found });
    }
    Ok(())
}

impl Store for MemoryStore {
    fn tournament(&self, id: TournamentId) -> Result<Tournament, EngineError> {
        self.read()?
            .tournaments
            .get(&id)
            .cloned()
            .ok_or(EngineError::TournamentNotFound(id))
    }

    fn tournaments(&self) -> Result<Vec<Tournament>, EngineError> {
        let mut all: Vec<_> = self.read()?.tournaments.values().cloned().collect();
        all.sort_by_key(|t| t.created_at);
        Ok(all)
    }

    fn insert_tournament(&self, tournament: Tournament) -> Result<(), EngineError> {
        let mut g = self.write()?;
        if g.tournaments.contains_key(&tournament.id) {
            return Err(EngineError::Storage(format!(
                "tournament {} already exists",
                tournament.id
            )));
        }
        g.tournaments.insert(tournament.id, tournament);
        Ok(())
    }

    fn swap_tournament(
        &self,
        expected_version: u64,
        next: Tournament,
    ) -> Result<Tournament, EngineError> {
        let mut g = self.write()?;
        let stored = g
            .tournaments
            .get_mut(&next.id)
            .ok_or(EngineError::TournamentNotFound(next.id))?;
        check_version(expected_version, stored.version)?;
        *stored = next.clone();
        Ok(next)
    }

    fn get_match(&self, id: MatchId) -> Result<Match, EngineError> {
        self.read()?
            .matches
            .get(&id)
            .cloned()
            .ok_or(EngineError::MatchNotFound(id))
    }

    fn matches(&self, tournament: TournamentId) -> Result<Vec<Match>, EngineError> {
        let mut out: Vec<_> = self
            .read()?
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.position);
        Ok(out)
    }

    fn insert_match_if_absent(&self, m: Match) -> Result<Match, EngineError> {
        let mut g = self.write()?;
        Ok(g.matches.entry(m.id).or_insert(m).clone())
    }

    fn swap_match(&self, expected_version: u64, next: Match) -> Result<Match, EngineError> {
        let mut g = self.write()?;
        let stored = g
            .matches
            .get_mut(&next.id)
            .ok_or(EngineError::MatchNotFound(next.id))?;
        check_version(expected_version, stored.version)?;
        *stored = next.clone();
        Ok(next)
    }

    fn commit_bracket(
        &self,
        expected_version: u64,
        tournament: Tournament,
        matches: Vec<Match>,
    ) -> Result<Tournament, EngineError> {
        let mut g = self.write()?;
        let stored = g
            .tournaments
            .get(&tournament.id)
            .ok_or(EngineError::TournamentNotFound(tournament.id))?;
        check_version(expected_version, stored.version)?;
        if let Some(m) = matches.iter().find(|m| g.matches.contains_key(&m.id)) {
            return Err(EngineError::Storage(format!("match {} already exists", m.id)));
        }
        for m in matches {
            g.matches.insert(m.id, m);
        }
        g.tournaments.insert(tournament.id, tournament.clone());
        Ok(tournament)
    }
}

/// In-memory stand-in for the registration service's team records.
#[derive(Default)]
pub struct TeamRegistry {
    teams: RwLock<HashMap<TeamId, Team>>,
}

impl TeamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, team: Team) -> Result<(), EngineError> {
        let mut g = self
            .teams
            .write()
            .map_err(|_| EngineError::Storage("lock error".to_string()))?;
        g.insert(team.id, team);
        Ok(())
    }
}

impl TeamDirectory for TeamRegistry {
    fn team(&self, id: TeamId) -> Result<Team, EngineError> {
        self.teams
            .read()
            .map_err(|_| EngineError::Storage("lock error".to_string()))?
            .get(&id)
            .cloned()
            .ok_or(EngineError::TeamNotFound(id))
    }
}
