use serde::{Deserialize, Serialize};

use crate::model::db::{Candidate, ElectionConfig};

/// Can a student from `department` vote for this candidate?
pub fn candidate_visible(
    config: Option<&ElectionConfig>,
    department: &str,
    candidate: &Candidate,
) -> bool {
    match config {
        Some(config) if config.restricts_departments() => candidate.department == department,
        _ => true,
    }
}

/// Filter `candidates` down to the ones a student from `department` may vote for.
pub fn visible_candidates(
    config: Option<&ElectionConfig>,
    department: &str,
    candidates: Vec<Candidate>,
) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|candidate| candidate_visible(config, department, candidate))
        .collect()
}

/// Tells a student which candidates they are being shown. Only sent while
/// departmental voting is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentNotice {
    pub user_department: String,
    pub restricted_mode: bool,
    pub message: String,
}

impl DepartmentNotice {
    pub fn new(config: Option<&ElectionConfig>, department: &str) -> Option<Self> {
        let config = config.filter(|config| config.enable_departmental_voting)?;
        let restricted_mode = config.restricts_departments();
        let message = if restricted_mode {
            format!("You can only vote for candidates from your department ({department})")
        } else {
            "You can vote for candidates from all departments".to_string()
        };
        Some(Self {
            user_department: department.to_string(),
            restricted_mode,
            message,
        })
    }
}
