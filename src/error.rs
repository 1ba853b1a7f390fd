//! Stable, matchable error kinds for the editing pipeline.
//!
//! The teacher (`avian`) returns `Result<_, &'static str>` from its editor.
//! The protocol here needs four *specific* outcomes that the broadcaster
//! branches on by variant, so an enum replaces the string literals.

use std::io;
use thiserror::Error;

/// One of the four stable outcomes a markdown primitive or command dispatch
/// can fail with. `Copy` because none of these carry heap data — the
/// offending text is already known to the caller (it's the command itself).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EditError {
    /// Position out of range, inverted range, malformed heading level,
    /// zero-length delete, ordered-list adjacency/overflow, or a command
    /// that failed to parse.
    #[error("invalid cursor position")]
    InvalidPosition,
    /// A range primitive's span lies entirely inside a pending delete from
    /// the same version.
    #[error("position lies within a pending delete")]
    DeletedPosition,
    /// The command's declared version no longer matches the document.
    #[error("command targets an outdated document version")]
    OutdatedVersion,
    /// An editing command arrived from a read-only role.
    #[error("unauthorised: read-only role cannot edit")]
    Unauthorised,
}

impl EditError {
    /// The token used in `EDIT <user> <command> Reject <TOKEN>` broadcast lines.
    pub fn reject_token(self) -> &'static str {
        match self {
            EditError::InvalidPosition => "INVALID_POSITION",
            EditError::DeletedPosition => "DELETED_POSITION",
            EditError::OutdatedVersion => "OUTDATED_VERSION",
            EditError::Unauthorised => "UNAUTHORISED",
        }
    }
}

/// Failure reading or parsing the roles file. Distinct from "user not
/// found", which is a normal `None`/`false`, not an error.
#[derive(Debug, Error)]
pub enum RoleLookupError {
    #[error("failed to read roles file: {0}")]
    Io(#[from] io::Error),
}

/// Transport I/O failure during a session's handshake or command loop.
/// Terminates only the affected session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("client disconnected before completing the handshake")]
    IncompleteHandshake,
}
