use std::collections::{HashMap, HashSet};

use rocket::http::Status;

use crate::error::{Error, Rejection, Result};
use crate::model::{
    api::ballot::BallotSpec,
    common::department::candidate_visible,
    db::{Candidate, ElectionConfig, Position},
    mongodb::Id,
};

/// Check a submitted ballot against the current positions and candidates.
///
/// Every selection must name a real position, and a candidate standing for
/// that position whom the student is allowed to see. Each position the
/// student has any visible candidates for must be covered exactly once.
pub fn validate_ballot(
    selections: &[BallotSpec],
    positions: &[Position],
    candidates: &[Candidate],
    config: Option<&ElectionConfig>,
    department: &str,
) -> Result<()> {
    if selections.is_empty() {
        return Err(Error::rejected(Rejection::IncompleteBallot));
    }

    let known_positions: HashSet<Id> = positions.iter().map(|p| p.id).collect();
    let candidates_by_id: HashMap<Id, &Candidate> = candidates.iter().map(|c| (c.id, c)).collect();

    let mut covered = HashSet::new();
    for selection in selections {
        let position_id: Id = selection.position_id.into();
        let candidate_id: Id = selection.candidate_id.into();
        if !known_positions.contains(&position_id) {
            return Err(Error::Status(
                Status::BadRequest,
                format!("Unknown position {}", selection.position_id),
            ));
        }
        let candidate = candidates_by_id
            .get(&candidate_id)
            .ok_or_else(|| {
                Error::Status(
                    Status::BadRequest,
                    format!("Unknown candidate {}", selection.candidate_id),
                )
            })?;
        if candidate.position_id != position_id {
            return Err(Error::Status(
                Status::BadRequest,
                format!(
                    "{} is not standing for position {}",
                    candidate.name, selection.position_id
                ),
            ));
        }
        if !candidate_visible(config, department, candidate) {
            return Err(Error::Status(
                Status::Forbidden,
                format!("You cannot vote for {} in your department", candidate.name),
            ));
        }
        if !covered.insert(position_id) {
            return Err(Error::Status(
                Status::BadRequest,
                format!("More than one selection for position {}", selection.position_id),
            ));
        }
    }

    let uncovered = candidates
        .iter()
        .filter(|candidate| candidate_visible(config, department, candidate))
        .any(|candidate| !covered.contains(&candidate.position_id));
    if uncovered {
        return Err(Error::rejected(Rejection::IncompleteBallot));
    }

    Ok(())
}
