use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{
    api::{id::ApiId, position::PositionDescription},
    db::{Candidate, Position, Vote},
    mongodb::Id,
};

/// `part` as a percentage of `whole`, to one decimal place.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / whole as f64).round() / 10.0
}

/// One candidate's share of the vote for their position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub id: ApiId,
    pub name: String,
    #[serde(rename = "class")]
    pub department: String,
    pub votes: u64,
    pub percentage: f64,
}

/// Tallies for a single position, leading candidate first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionResult {
    pub position: PositionDescription,
    pub total_votes: u64,
    pub candidates: Vec<CandidateResult>,
}

/// Tallies for every position, ordered by position name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub positions: Vec<PositionResult>,
}

impl ElectionResults {
    pub fn tally(mut positions: Vec<Position>, candidates: Vec<Candidate>, votes: &[Vote]) -> Self {
        let mut counts: HashMap<(Id, Id), u64> = HashMap::new();
        for vote in votes {
            *counts.entry((vote.position_id, vote.candidate_id)).or_default() += 1;
        }

        let mut by_position: HashMap<Id, Vec<Candidate>> = HashMap::new();
        for candidate in candidates {
            by_position
                .entry(candidate.position_id)
                .or_default()
                .push(candidate);
        }

        positions.sort_by(|a, b| a.name.cmp(&b.name));
        let positions = positions
            .into_iter()
            .map(|position| {
                let standing = by_position.remove(&position.id).unwrap_or_default();
                let tallied: Vec<(Candidate, u64)> = standing
                    .into_iter()
                    .map(|candidate| {
                        let votes = counts
                            .get(&(position.id, candidate.id))
                            .copied()
                            .unwrap_or(0);
                        (candidate, votes)
                    })
                    .collect();
                let total_votes = tallied.iter().map(|(_, votes)| votes).sum();

                let mut candidates: Vec<CandidateResult> = tallied
                    .into_iter()
                    .map(|(candidate, votes)| CandidateResult {
                        id: candidate.id.into(),
                        name: candidate.candidate.name,
                        department: candidate.candidate.department,
                        votes,
                        percentage: percentage(votes, total_votes),
                    })
                    .collect();
                candidates.sort_by(|a, b| b.votes.cmp(&a.votes));

                PositionResult {
                    position: position.into(),
                    total_votes,
                    candidates,
                }
            })
            .collect();

        Self { positions }
    }
}

/// Turnout figures for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionStats {
    pub total_students: u64,
    pub voted_students: u64,
    pub total_votes: u64,
    pub turnout_percentage: f64,
}

impl ElectionStats {
    pub fn new(total_students: u64, voted_students: u64, total_votes: u64) -> Self {
        Self {
            total_students,
            voted_students,
            total_votes,
            turnout_percentage: percentage(voted_students, total_students),
        }
    }
}
