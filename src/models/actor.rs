//! Who is issuing a request. Always passed explicitly; the engine keeps no "current user".

use crate::models::error::EngineError;
use crate::models::game::{Match, TeamSlot};
use crate::models::team::{TeamId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Actor {
    /// A captain acting on behalf of `team`.
    Team { user: UserId, team: TeamId },
    /// Tournament operator with elevated privilege.
    Admin { user: UserId },
    /// Engine-internal driver: timeouts, advancement.
    System,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin { .. })
    }

    /// Slot the acting team occupies in `m`, or `Unauthorized` for anyone else.
    pub fn participant_slot(&self, m: &Match) -> Result<TeamSlot, EngineError> {
        match self {
            Actor::Team { team, .. } => m.slot_of(*team).ok_or(EngineError::Unauthorized),
            _ => Err(EngineError::Unauthorized),
        }
    }

    /// Admin user id, or `Unauthorized`.
    pub fn require_admin(&self) -> Result<UserId, EngineError> {
        match self {
            Actor::Admin { user } => Ok(*user),
            _ => Err(EngineError::Unauthorized),
        }
    }

    /// Participants, admins and the system may all drive the match clock.
    pub fn require_participant_or_operator(&self, m: &Match) -> Result<(), EngineError> {
        match self {
            Actor::Admin { .. } | Actor::System => Ok(()),
            Actor::Team { .. } => self.participant_slot(m).map(|_| ()),
        }
    }
}
