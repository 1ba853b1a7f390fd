//! The role oracle: `<username> <role>` lines read from a flat file.
//!
//! Grounded on `original_source/source/server.c`'s `check_user_role`, which
//! reads `roles.txt` with `fgets`/`sscanf("%127s %7s", ...)` — the `%127s`
//! and `%7s` field widths are a *reading* contract (truncate, don't reject),
//! not a hard parser limit, per `original_source/libs/helper.h`'s
//! `USERNAME_LEN`/`ROLE_LEN`. Kept as an effective truncation here.

use crate::error::RoleLookupError;
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_USERNAME_LEN: usize = 127;
pub const MAX_ROLE_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Read,
    Write,
}

impl Role {
    fn from_field(field: &str) -> Option<Role> {
        let field = &field[..field.len().min(MAX_ROLE_LEN)];
        match field {
            "read" => Some(Role::Read),
            "write" => Some(Role::Write),
            _ => None,
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    let mut end = s.len().min(max);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Looks a username up against some source of `(username, role)` pairs.
pub trait RoleOracle {
    fn lookup(&self, username: &str) -> Result<Option<Role>, RoleLookupError>;
}

/// Reads `<username> <role>` lines from a file on every lookup — the role
/// file is small and changes rarely, so there's no caching layer here; a
/// long-lived server would reload edits to the file without a restart.
pub struct FileRoleOracle {
    path: PathBuf,
}

impl FileRoleOracle {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileRoleOracle { path: path.as_ref().to_path_buf() }
    }
}

impl RoleOracle for FileRoleOracle {
    fn lookup(&self, username: &str) -> Result<Option<Role>, RoleLookupError> {
        let contents = fs::read_to_string(&self.path)?;
        let wanted = truncate(username, MAX_USERNAME_LEN);
        for line in contents.lines() {
            let mut fields = line.split_whitespace();
            let (Some(user_field), Some(role_field)) = (fields.next(), fields.next()) else {
                continue;
            };
            if truncate(user_field, MAX_USERNAME_LEN) == wanted {
                return Ok(Role::from_field(role_field));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{contents}").unwrap();
        f
    }

    #[test]
    fn finds_known_user() {
        let f = fixture("alice write\nbob read\n");
        let oracle = FileRoleOracle::new(f.path());
        assert_eq!(oracle.lookup("bob").unwrap(), Some(Role::Read));
        assert_eq!(oracle.lookup("alice").unwrap(), Some(Role::Write));
    }

    #[test]
    fn unknown_user_is_none_not_error() {
        let f = fixture("alice write\n");
        let oracle = FileRoleOracle::new(f.path());
        assert_eq!(oracle.lookup("mallory").unwrap(), None);
    }

    #[test]
    fn malformed_line_is_skipped() {
        let f = fixture("not-a-valid-line\nbob read\n");
        let oracle = FileRoleOracle::new(f.path());
        assert_eq!(oracle.lookup("bob").unwrap(), Some(Role::Read));
    }

    #[test]
    fn missing_file_is_an_error() {
        let oracle = FileRoleOracle::new("/nonexistent/roles.txt");
        assert!(oracle.lookup("anyone").is_err());
    }
}
