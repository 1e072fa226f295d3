//! MongoDB server error codes the store needs to recognise.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

/// Raised when an insert collides on `_id` or a unique index.
pub const DUPLICATE_KEY: i32 = 11000;

/// Did this write fail only because the key already exists?
pub fn is_duplicate_key_error<T>(result: Result<T, &DbError>) -> bool {
    match result {
        Err(err) => matches!(
            *err.kind,
            ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY
        ),
        Ok(_) => false,
    }
}
