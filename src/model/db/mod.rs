//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Students are keyed by their student ID rather than a generated one.

pub mod admin;
pub use admin::{Admin, AdminCore, NewAdmin};

mod candidate;
pub use candidate::{Candidate, CandidateCore, NewCandidate};

mod device;
pub use device::DeviceUsage;

mod election_config;
pub use election_config::{ElectionConfig, DEFAULT_VOTING_HOURS, ELECTION_CONFIG_ID};

mod position;
pub use position::{NewPosition, Position, PositionCore};

mod student;
pub use student::{Student, StudentChanges, DEFAULT_STUDENT_PASSWORD};

pub mod sweeper;

mod vote;
pub use vote::Vote;
