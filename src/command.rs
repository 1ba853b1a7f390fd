//! Parsing and dispatch for the twelve editing command lines.
//!
//! A `Command` is the parsed form of one line from §6's grammar. Parsing is
//! deliberately permissive about whitespace but strict about arity — an
//! extra trailing token is a parse failure, not silently ignored. Grounded
//! on `original_source/libs/helper.h`'s `UNKNOWN_COMMAND` fallback: a line
//! that doesn't parse is not a panic, it's just another rejectable outcome
//! (see `crate::outcome`).

use crate::document::Document;
use crate::error::EditError;
use crate::markdown;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Insert { pos: usize, text: String },
    Delete { pos: usize, len: usize },
    Newline { pos: usize },
    Heading { level: u8, pos: usize },
    Bold { start: usize, end: usize },
    Italic { start: usize, end: usize },
    Code { start: usize, end: usize },
    Link { start: usize, end: usize, url: String },
    Blockquote { pos: usize },
    OrderedList { pos: usize },
    UnorderedList { pos: usize },
    HorizontalRule { pos: usize },
}

fn parse_range(rest: &str) -> Option<(usize, usize)> {
    let mut parts = rest.split_whitespace();
    let start = parts.next()?.parse().ok()?;
    let end = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((start, end))
}

fn parse_single_pos(rest: &str) -> Option<usize> {
    let mut parts = rest.split_whitespace();
    let pos = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(pos)
}

impl Command {
    /// Parses one command line (without its trailing newline). Returns
    /// `None` for anything that doesn't match the grammar in §6 — callers
    /// treat that the same as `INVALID_CURSOR_POS`.
    pub fn parse(line: &str) -> Option<Command> {
        let mut top = line.splitn(2, ' ');
        let verb = top.next()?;
        let rest = top.next().unwrap_or("");
        match verb {
            "INSERT" => {
                let mut parts = rest.splitn(2, ' ');
                let pos = parts.next()?.parse().ok()?;
                let text = parts.next()?.to_string();
                Some(Command::Insert { pos, text })
            }
            "DEL" => {
                let mut parts = rest.split_whitespace();
                let pos = parts.next()?.parse().ok()?;
                let len = parts.next()?.parse().ok()?;
                if parts.next().is_some() {
                    return None;
                }
                Some(Command::Delete { pos, len })
            }
            "NEWLINE" => parse_single_pos(rest).map(|pos| Command::Newline { pos }),
            "HEADING" => {
                let mut parts = rest.split_whitespace();
                let level = parts.next()?.parse().ok()?;
                let pos = parts.next()?.parse().ok()?;
                if parts.next().is_some() {
                    return None;
                }
                Some(Command::Heading { level, pos })
            }
            "BOLD" => parse_range(rest).map(|(start, end)| Command::Bold { start, end }),
            "ITALIC" => parse_range(rest).map(|(start, end)| Command::Italic { start, end }),
            "CODE" => parse_range(rest).map(|(start, end)| Command::Code { start, end }),
            "LINK" => {
                let mut parts = rest.splitn(3, ' ');
                let start = parts.next()?.parse().ok()?;
                let end = parts.next()?.parse().ok()?;
                let url = parts.next()?.to_string();
                if url.is_empty() {
                    return None;
                }
                Some(Command::Link { start, end, url })
            }
            "BLOCKQUOTE" => parse_single_pos(rest).map(|pos| Command::Blockquote { pos }),
            "ORDERED_LIST" => parse_single_pos(rest).map(|pos| Command::OrderedList { pos }),
            "UNORDERED_LIST" => parse_single_pos(rest).map(|pos| Command::UnorderedList { pos }),
            "HORIZONTAL_RULE" => parse_single_pos(rest).map(|pos| Command::HorizontalRule { pos }),
            _ => None,
        }
    }

    /// Validates and enqueues this command's edits against `doc` at
    /// `version`. Mutation is deferred to the next `commit_version`.
    pub fn dispatch(&self, doc: &mut Document, version: u64) -> Result<(), EditError> {
        match self {
            Command::Insert { pos, text } => markdown::insert(doc, version, *pos, text.as_bytes()),
            Command::Delete { pos, len } => markdown::delete(doc, version, *pos, *len),
            Command::Newline { pos } => markdown::newline(doc, version, *pos),
            Command::Heading { level, pos } => markdown::heading(doc, version, *level, *pos),
            Command::Bold { start, end } => markdown::bold(doc, version, *start, *end),
            Command::Italic { start, end } => markdown::italic(doc, version, *start, *end),
            Command::Code { start, end } => markdown::code(doc, version, *start, *end),
            Command::Link { start, end, url } => markdown::link(doc, version, *start, *end, url),
            Command::Blockquote { pos } => markdown::blockquote(doc, version, *pos),
            Command::OrderedList { pos } => markdown::ordered_list(doc, version, *pos),
            Command::UnorderedList { pos } => markdown::unordered_list(doc, version, *pos),
            Command::HorizontalRule { pos } => markdown::horizontal_rule(doc, version, *pos),
        }
    }
}

/// Command lines a client may handle purely locally — these are never sent
/// to the server.
pub fn is_local_only(line: &str) -> bool {
    matches!(line, "PERM?" | "LOG?" | "DOC?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_insert_with_spaces_in_text() {
        assert_eq!(
            Command::parse("INSERT 3 hello world"),
            Some(Command::Insert { pos: 3, text: "hello world".to_string() })
        );
    }

    #[test]
    fn parses_delete() {
        assert_eq!(Command::parse("DEL 0 5"), Some(Command::Delete { pos: 0, len: 5 }));
    }

    #[test]
    fn rejects_extra_trailing_token() {
        assert_eq!(Command::parse("DEL 0 5 9"), None);
    }

    #[test]
    fn parses_heading() {
        assert_eq!(Command::parse("HEADING 2 10"), Some(Command::Heading { level: 2, pos: 10 }));
    }

    #[test]
    fn parses_link_with_url() {
        assert_eq!(
            Command::parse("LINK 0 4 https://example.com"),
            Some(Command::Link { start: 0, end: 4, url: "https://example.com".to_string() })
        );
    }

    #[test]
    fn rejects_unknown_verb() {
        assert_eq!(Command::parse("FROBNICATE 1 2"), None);
    }

    #[test]
    fn rejects_non_numeric_position() {
        assert_eq!(Command::parse("NEWLINE abc"), None);
    }

    #[test]
    fn local_only_commands_are_recognised() {
        assert!(is_local_only("DOC?"));
        assert!(is_local_only("LOG?"));
        assert!(is_local_only("PERM?"));
        assert!(!is_local_only("DISCONNECT"));
        assert!(!is_local_only("INSERT 0 x"));
    }
}
