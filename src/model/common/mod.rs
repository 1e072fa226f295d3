//! Election rules that don't belong to any one stored record.

pub mod ballot;
pub mod department;
pub mod device;
pub mod schedule;
