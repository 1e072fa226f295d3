//! Data types, split by where they are used.
//!
//! - [`api`] types cross the HTTP boundary.
//! - [`db`] types are persisted.
//! - [`common`] holds the election rules shared by both.
//! - [`store`] is the persistence boundary, with [`mongodb`] helpers for the production store.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
pub mod store;
