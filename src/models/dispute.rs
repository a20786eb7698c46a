//! Dispute payload and admin resolution record.

use crate::models::game::Score;
use crate::models::team::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an admin decided about a dispute.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisputeDecision {
    /// Throw the submissions away; the match goes back to playing and both teams resubmit.
    Dismiss,
    /// Impose the final score and complete the match.
    Override { score: Score },
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub admin: UserId,
    pub decision: DisputeDecision,
    pub note: String,
    pub resolved_at: DateTime<Utc>,
}

/// Conflicting score reports. Kept on the match after resolution for audit.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub reason: String,
    /// What team 1 reported.
    pub team_1_submission: Score,
    /// What team 2 reported.
    pub team_2_submission: Score,
    pub opened_at: DateTime<Utc>,
    pub resolution: Option<Resolution>,
}

impl Dispute {
    pub fn is_open(&self) -> bool {
        self.resolution.is_none()
    }
}
