//! Dispute handling: opening a dispute from conflicting reports and admin resolution.

use crate::models::{
    Actor, Dispute, DisputeDecision, EngineError, Match, MatchState, Outcome, Resolution, Score,
};
use chrono::{DateTime, Utc};

/// Freeze `m` in `disputed` with both raw submissions stored.
pub(crate) fn open(m: &mut Match, team_1: Score, team_2: Score, now: DateTime<Utc>) {
    m.disputes.push(Dispute {
        reason: format!(
            "score mismatch: team 1 reported {}-{}, team 2 reported {}-{}",
            team_1.team_1, team_1.team_2, team_2.team_1, team_2.team_2
        ),
        team_1_submission: team_1,
        team_2_submission: team_2,
        opened_at: now,
        resolution: None,
    });
    m.state = MatchState::Disputed;
}

/// Resolve the open dispute on `m`. Only admins may do this.
///
/// `Dismiss` sends the match back to playing with both reports cleared; `Override`
/// completes it with the imposed score. The dispute record is kept either way.
pub fn resolve(
    m: &Match,
    actor: &Actor,
    decision: DisputeDecision,
    note: &str,
    now: DateTime<Utc>,
) -> Result<Match, EngineError> {
    let admin = actor.require_admin()?;
    if m.state != MatchState::Disputed || m.open_dispute().is_none() {
        return Err(EngineError::InvalidTransition {
            state: m.state,
            action: "resolve dispute",
        });
    }
    if let DisputeDecision::Override { score } = decision {
        if score.winner().is_none() {
            return Err(EngineError::TieScoreRejected);
        }
    }

    let mut next = m.clone();
    if let Some(dispute) = next.open_dispute_mut() {
        dispute.resolution = Some(Resolution {
            admin,
            decision,
            note: note.trim().to_string(),
            resolved_at: now,
        });
    }
    match decision {
        DisputeDecision::Dismiss => {
            next.submission_1 = None;
            next.submission_2 = None;
            next.state = MatchState::Playing;
        }
        DisputeDecision::Override { score } => next.finish(score, Outcome::AdminDecision, now),
    }
    Ok(next)
}
