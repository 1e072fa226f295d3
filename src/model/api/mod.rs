//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.
//! - Student passwords only appear in admin-facing types.

pub mod admin;
pub mod auth;
pub mod ballot;
pub mod candidate;
pub mod id;
pub mod position;
pub mod results;
pub mod schedule;
pub mod student;
