//! The client-side replica: a local document kept in step with the server
//! purely by replaying `SUCCESS` lines from broadcast blocks.
//!
//! Grounded on `original_source/source/client.c`'s `apply_broadcasts`: for
//! each `VERSION n` block, re-run every accepted command against the local
//! document, commit once, then adopt `n` as the local version. Unlike the
//! original, the initial snapshot is written straight into the buffer
//! instead of left pending — see `DESIGN.md` for why.

use log::warn;

use crate::command::Command;
use crate::document::Document;
use crate::outcome::parse_outcome_line;
use crate::roles::Role;

pub struct Replica {
    document: Document,
    role: Role,
    log_lines: Vec<String>,
}

impl Replica {
    pub fn new(role: Role, version: u64, content: &[u8]) -> Self {
        let mut document = Document::new();
        document.apply_insert(0, content);
        document.set_version(version);
        Replica { document, role, log_lines: Vec::new() }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn version(&self) -> u64 {
        self.document.version()
    }

    pub fn flatten(&self) -> Vec<u8> {
        self.document.flatten()
    }

    /// Every broadcast line ever received, in order, for `LOG?`.
    pub fn log_lines(&self) -> &[String] {
        &self.log_lines
    }

    /// Ingests one broadcast block: `lines[0]` is `VERSION n`, the rest are
    /// outcome lines up to (and including) `END`. Every line is retained
    /// verbatim for `LOG?` regardless of outcome; only `SUCCESS` lines
    /// affect the document.
    pub fn apply_block(&mut self, lines: &[String]) {
        self.log_lines.extend(lines.iter().cloned());

        let Some(version_line) = lines.first() else { return };
        let Some(n) = version_line.strip_prefix("VERSION ").and_then(|s| s.trim().parse::<u64>().ok()) else {
            warn!("malformed broadcast header: {version_line:?}");
            return;
        };

        for line in lines.iter().skip(1) {
            if line == "END" {
                break;
            }
            let Some((_, command_text, true)) = parse_outcome_line(line) else {
                continue;
            };
            let Some(command) = Command::parse(command_text) else {
                warn!("could not re-parse broadcast command: {command_text:?}");
                continue;
            };
            let local_version = self.document.version();
            if let Err(err) = command.dispatch(&mut self.document, local_version) {
                warn!("local replay of {command_text:?} diverged from server: {err}");
            }
        }

        self.document.commit_version();
        self.document.set_version(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn seeds_initial_content_and_version() {
        let replica = Replica::new(Role::Write, 4, b"hello");
        assert_eq!(replica.version(), 4);
        assert_eq!(replica.flatten(), b"hello");
    }

    #[test]
    fn replays_success_lines_and_adopts_new_version() {
        let mut replica = Replica::new(Role::Write, 0, b"hello");
        replica.apply_block(&lines(&["VERSION 1", "EDIT alice INSERT 5 ! SUCCESS", "END"]));
        assert_eq!(replica.version(), 1);
        assert_eq!(replica.flatten(), b"hello!");
    }

    #[test]
    fn rejections_are_logged_but_not_applied() {
        let mut replica = Replica::new(Role::Write, 0, b"hello");
        replica.apply_block(&lines(&["VERSION 1", "EDIT bob DEL 99 1 Reject INVALID_POSITION", "END"]));
        assert_eq!(replica.version(), 1);
        assert_eq!(replica.flatten(), b"hello");
        assert_eq!(replica.log_lines().len(), 3);
    }

    #[test]
    fn empty_tick_still_advances_version() {
        let mut replica = Replica::new(Role::Write, 2, b"x");
        replica.apply_block(&lines(&["VERSION 3", "END"]));
        assert_eq!(replica.version(), 3);
    }
}
