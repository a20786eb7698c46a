//! Map pool, veto transcript entries and starting sides.

use crate::models::error::EngineError;
use crate::models::game::TeamSlot;
use crate::models::team::TeamId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Competitive map rotation used when no pool is configured.
pub const STANDARD_MAPS: [&str; 7] = [
    "Ascent", "Bind", "Haven", "Split", "Lotus", "Sunset", "Icebox",
];

/// Ordered set of maps a veto runs over.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MapPool {
    maps: Vec<String>,
}

impl Default for MapPool {
    fn default() -> Self {
        Self {
            maps: STANDARD_MAPS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl MapPool {
    /// Build a pool from names. Needs more than 3 distinct maps so a BO3 veto has at least one ban.
    pub fn new<I, S>(maps: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for m in maps {
            let name = m.into().trim().to_string();
            if name.is_empty() {
                continue;
            }
            if out.iter().any(|o| o.eq_ignore_ascii_case(&name)) {
                return Err(EngineError::InvalidMapPool(format!("duplicate map {name}")));
            }
            out.push(name);
        }
        if out.len() <= 3 {
            return Err(EngineError::InvalidMapPool(format!(
                "need at least 4 maps, got {}",
                out.len()
            )));
        }
        Ok(Self { maps: out })
    }

    pub fn maps(&self) -> &[String] {
        &self.maps
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

/// Starting side for the first half.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Attack,
    Defense,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Attack => Side::Defense,
            Side::Defense => Side::Attack,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VetoAction {
    Ban,
}

/// One accepted veto step. Entries are append-only.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct VetoEntry {
    /// 0-based position in the veto sequence.
    pub index: u32,
    pub team: TeamId,
    pub slot: TeamSlot,
    pub action: VetoAction,
    pub map: String,
    pub at: DateTime<Utc>,
}

/// Whose turn it is and what is left to ban.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct VetoTurn {
    pub acting_team: TeamId,
    pub acting_slot: TeamSlot,
    pub remaining_maps: Vec<String>,
}

/// Sides fixed by the side pick.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SideAssignment {
    pub chosen_by: TeamSlot,
    pub team_1: Side,
    pub team_2: Side,
}
