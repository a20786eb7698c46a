//! Team and roster data, as supplied by the registration service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a team (used in match slots and lookups).
pub type TeamId = Uuid;

/// Identity of a person acting on the engine (captain, admin).
pub type UserId = Uuid;

/// Number of active players a team must field before a match can start.
pub const ACTIVE_ROSTER_SIZE: usize = 5;

/// Longest allowed team tag.
pub const MAX_TAG_LEN: usize = 5;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterRole {
    Owner,
    Captain,
    Member,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub user: UserId,
    pub role: RosterRole,
}

/// A registered team. The engine only reads teams; roster management lives elsewhere.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    /// Short tag shown in brackets, unique per tournament.
    pub tag: String,
    pub captain: UserId,
    /// Ordered member list.
    pub roster: Vec<RosterEntry>,
    /// Players fielded for matches; exactly 5 required.
    pub active_players: Vec<UserId>,
    pub registered: bool,
}

impl Team {
    /// Create a registered team whose captain is also its owner. Roster starts with the captain only.
    pub fn new(name: impl Into<String>, tag: impl Into<String>, captain: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tag: tag.into(),
            captain,
            roster: vec![RosterEntry {
                user: captain,
                role: RosterRole::Owner,
            }],
            active_players: Vec::new(),
            registered: true,
        }
    }

    /// Add a member to the roster and, while there is room, to the active lineup.
    pub fn add_member(&mut self, user: UserId) {
        if !self.roster.iter().any(|r| r.user == user) {
            self.roster.push(RosterEntry {
                user,
                role: RosterRole::Member,
            });
        }
        if self.active_players.len() < ACTIVE_ROSTER_SIZE && !self.active_players.contains(&user) {
            self.active_players.push(user);
        }
    }

    /// Whether `user` is on the roster in any role.
    pub fn has_member(&self, user: UserId) -> bool {
        self.roster.iter().any(|r| r.user == user)
    }

    /// Tag as compared for uniqueness within a tournament.
    pub fn tag_key(&self) -> String {
        self.tag.trim().to_ascii_uppercase()
    }

    pub fn has_full_lineup(&self) -> bool {
        self.active_players.len() == ACTIVE_ROSTER_SIZE
    }

    pub fn tag_is_valid(&self) -> bool {
        let len = self.tag.trim().chars().count();
        len > 0 && len <= MAX_TAG_LEN
    }
}
