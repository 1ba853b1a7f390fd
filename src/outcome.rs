//! Version log entries and the textual broadcast block format from §6.

use crate::error::EditError;

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Success,
    Rejected(EditError),
}

/// One processed command, in the canonical broadcast line form.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionLogEntry {
    pub username: String,
    pub command_text: String,
    pub outcome: CommandOutcome,
}

impl VersionLogEntry {
    pub fn to_line(&self) -> String {
        match &self.outcome {
            CommandOutcome::Success => format!("EDIT {} {} SUCCESS", self.username, self.command_text),
            CommandOutcome::Rejected(err) => {
                format!("EDIT {} {} Reject {}", self.username, self.command_text, err.reject_token())
            }
        }
    }
}

/// The version a tick bumped to, plus every command processed in it.
#[derive(Debug, Clone, Default)]
pub struct VersionLog {
    pub version: u64,
    pub entries: Vec<VersionLogEntry>,
}

/// Renders `VERSION <n>\n<line>\n...\nEND\n`.
pub fn render_block(version: u64, log: &VersionLog) -> String {
    let mut out = format!("VERSION {version}\n");
    for entry in &log.entries {
        out.push_str(&entry.to_line());
        out.push('\n');
    }
    out.push_str("END\n");
    out
}

/// Splits one outcome line back into `(username, command_text, succeeded)`.
/// `command_text` itself may contain spaces (e.g. `INSERT 3 hello world`),
/// so this anchors on the trailing `SUCCESS`/`Reject` marker rather than
/// splitting on every space.
pub fn parse_outcome_line(line: &str) -> Option<(&str, &str, bool)> {
    let rest = line.strip_prefix("EDIT ")?;
    let (username, rest) = rest.split_once(' ')?;
    if let Some(command_text) = rest.strip_suffix(" SUCCESS") {
        Some((username, command_text, true))
    } else if let Some(idx) = rest.find(" Reject ") {
        Some((username, &rest[..idx], false))
    } else {
        None
    }
}
