//! The twelve markdown formatting primitives.
//!
//! Each primitive is a pure enqueuer: it validates its arguments and the
//! caller's declared version, adjusts positions against any edits already
//! pending this version, then queues inserts/deletes on the [`Document`]
//! without mutating the buffer itself. Mutation happens later, in
//! [`Document::commit_version`], which is what lets a whole batch of
//! commands reference the same coordinate frame.
//!
//! Grounded on `original_source/source/markdown.c`, which implements the
//! same twelve operations (`markdown_insert`, `markdown_delete`,
//! `markdown_heading`, `markdown_bold`, ..., `markdown_ordered_list`)
//! against a near-identical chunk buffer.

use crate::document::Document;
use crate::error::EditError;

fn check_pos(ok: bool) -> Result<(), EditError> {
    if ok {
        Ok(())
    } else {
        Err(EditError::InvalidPosition)
    }
}

fn check_version(doc: &Document, version: u64) -> Result<(), EditError> {
    if doc.version() == version {
        Ok(())
    } else {
        Err(EditError::OutdatedVersion)
    }
}

fn at_start_of_line(doc: &Document, pos: usize) -> bool {
    pos == 0 || doc.byte_before(pos) == Some(b'\n')
}

/// `[start, end)` intervals covered by this version's still-pending deletes.
fn deleted_ranges(doc: &Document) -> Vec<(usize, usize)> {
    use crate::document::PendingEdit;
    doc.pending()
        .iter()
        .filter_map(|e| match e {
            PendingEdit::Delete { pos, len } => Some((*pos, pos + len)),
            PendingEdit::Insert { .. } => None,
        })
        .collect()
}

/// Snaps a single-position primitive's target to the start of any deleted
/// range it falls strictly inside.
fn snap_single(pos: usize, ranges: &[(usize, usize)]) -> usize {
    for &(s, e) in ranges {
        if pos > s && pos < e {
            return s;
        }
    }
    pos
}

/// Adjusts a range primitive's `[start, end)` against pending deletes:
/// rejects if the whole span lies inside one deleted range, otherwise snaps
/// each endpoint independently to the nearer edge of whichever range it
/// falls strictly inside (ties favor the start edge).
fn adjust_range(start: usize, end: usize, ranges: &[(usize, usize)]) -> Result<(usize, usize), EditError> {
    for &(s, e) in ranges {
        if s <= start && end <= e {
            return Err(EditError::DeletedPosition);
        }
    }
    let snap_endpoint = |p: usize| -> usize {
        for &(s, e) in ranges {
            if p > s && p < e {
                return if (e - p) < (p - s) { e } else { s };
            }
        }
        p
    };
    Ok((snap_endpoint(start), snap_endpoint(end)))
}

/// Raw insert: no position snapping — this is the primitive the formatting
/// operations below are built from, not one of them.
pub fn insert(doc: &mut Document, version: u64, pos: usize, text: &[u8]) -> Result<(), EditError> {
    check_pos(pos <= doc.length())?;
    check_version(doc, version)?;
    doc.queue_insert(pos, text.to_vec());
    Ok(())
}

/// Raw delete: no position snapping, same reasoning as [`insert`].
pub fn delete(doc: &mut Document, version: u64, pos: usize, len: usize) -> Result<(), EditError> {
    check_pos(pos <= doc.length() && len > 0)?;
    check_version(doc, version)?;
    doc.queue_delete(pos, len);
    Ok(())
}

pub fn newline(doc: &mut Document, version: u64, pos: usize) -> Result<(), EditError> {
    check_pos(pos <= doc.length())?;
    check_version(doc, version)?;
    let ranges = deleted_ranges(doc);
    let pos = snap_single(pos, &ranges);
    doc.queue_insert(pos, b"\n".to_vec());
    Ok(())
}

pub fn heading(doc: &mut Document, version: u64, level: u8, pos: usize) -> Result<(), EditError> {
    check_pos(pos <= doc.length() && (1..=3).contains(&level))?;
    check_version(doc, version)?;
    let ranges = deleted_ranges(doc);
    let pos = snap_single(pos, &ranges);

    let mut prefix = format!("{} ", "#".repeat(level as usize));
    if pos > 0 && doc.byte_before(pos) != Some(b'\n') {
        prefix = format!("\n{prefix}");
    }
    doc.queue_insert(pos, prefix.into_bytes());
    Ok(())
}

fn wrap_range(
    doc: &mut Document,
    version: u64,
    start: usize,
    end: usize,
    open: &[u8],
    close: &[u8],
) -> Result<(), EditError> {
    check_pos(start <= end && end <= doc.length())?;
    check_version(doc, version)?;
    let ranges = deleted_ranges(doc);
    let (start, end) = adjust_range(start, end, &ranges)?;
    // Closing marker is queued first so `start`'s position is still valid
    // in the coordinate frame both inserts share.
    doc.queue_insert(end, close.to_vec());
    doc.queue_insert(start, open.to_vec());
    Ok(())
}

pub fn bold(doc: &mut Document, version: u64, start: usize, end: usize) -> Result<(), EditError> {
    wrap_range(doc, version, start, end, b"**", b"**")
}

pub fn italic(doc: &mut Document, version: u64, start: usize, end: usize) -> Result<(), EditError> {
    wrap_range(doc, version, start, end, b"*", b"*")
}

pub fn code(doc: &mut Document, version: u64, start: usize, end: usize) -> Result<(), EditError> {
    wrap_range(doc, version, start, end, b"`", b"`")
}

pub fn link(doc: &mut Document, version: u64, start: usize, end: usize, url: &str) -> Result<(), EditError> {
    let close = format!("]({url})");
    wrap_range(doc, version, start, end, b"[", close.as_bytes())
}

pub fn blockquote(doc: &mut Document, version: u64, pos: usize) -> Result<(), EditError> {
    check_pos(pos <= doc.length())?;
    check_version(doc, version)?;
    let ranges = deleted_ranges(doc);
    let pos = snap_single(pos, &ranges);
    let mut prefix = String::from("> ");
    if !at_start_of_line(doc, pos) {
        prefix = format!("\n{prefix}");
    }
    doc.queue_insert(pos, prefix.into_bytes());
    Ok(())
}

pub fn unordered_list(doc: &mut Document, version: u64, pos: usize) -> Result<(), EditError> {
    check_pos(pos <= doc.length())?;
    check_version(doc, version)?;
    let ranges = deleted_ranges(doc);
    let pos = snap_single(pos, &ranges);
    let mut prefix = String::from("- ");
    if !at_start_of_line(doc, pos) {
        prefix = format!("\n{prefix}");
    }
    doc.queue_insert(pos, prefix.into_bytes());
    Ok(())
}

pub fn horizontal_rule(doc: &mut Document, version: u64, pos: usize) -> Result<(), EditError> {
    check_pos(pos <= doc.length())?;
    check_version(doc, version)?;
    let ranges = deleted_ranges(doc);
    let pos = snap_single(pos, &ranges);

    let mut rule = String::from("---");
    if !at_start_of_line(doc, pos) {
        rule = format!("\n{rule}");
    }
    if doc.byte_at(pos) != Some(b'\n') && pos != doc.length() {
        rule.push('\n');
    }
    doc.queue_insert(pos, rule.into_bytes());
    Ok(())
}

fn line_start(flat: &[u8], pos: usize) -> usize {
    let mut i = pos;
    while i > 0 && flat[i - 1] != b'\n' {
        i -= 1;
    }
    i
}

fn next_line_start(flat: &[u8], pos: usize) -> Option<usize> {
    let mut i = pos;
    while i < flat.len() && flat[i] != b'\n' {
        i += 1;
    }
    if i < flat.len() {
        Some(i + 1)
    } else {
        None
    }
}

/// The digit of a `D. ` ordered-list prefix starting exactly at `at`, if any.
fn ordered_prefix_digit(flat: &[u8], at: usize) -> Option<u8> {
    if at + 3 <= flat.len() && flat[at].is_ascii_digit() && flat[at + 1] == b'.' && flat[at + 2] == b' ' {
        Some(flat[at] - b'0')
    } else {
        None
    }
}

fn is_adjacent_to_ordered_prefix(flat: &[u8], pos: usize) -> bool {
    let matches_at = |start: isize| -> bool {
        if start < 0 {
            return false;
        }
        ordered_prefix_digit(flat, start as usize).is_some()
    };
    matches_at(pos as isize - 3) || matches_at(pos as isize)
}

/// Number to continue from: pos's own line counts as the first line
/// examined, then each earlier line in turn, stopping at the first `D. `
/// prefix found. If pos's line is the document's first line, there is no
/// earlier line to fall back to and this returns `None` unconditionally
/// (even if pos's own line happens to start with a prefix) — inserting a
/// list item is only ever "continuing" something above it.
fn preceding_ordered_number(flat: &[u8], pos: usize) -> Option<u8> {
    let mut scan = line_start(flat, pos);
    while scan > 0 {
        let line = line_start(flat, scan);
        if let Some(d) = ordered_prefix_digit(flat, line) {
            return Some(d);
        }
        if line == 0 {
            break;
        }
        scan = line - 1;
    }
    None
}

/// The one composite primitive: inserts a numbered item at `pos`, inferring
/// its number from the nearest preceding ordered-list line, then walks
/// forward renumbering every contiguous ordered-list line that follows.
pub fn ordered_list(doc: &mut Document, version: u64, pos: usize) -> Result<(), EditError> {
    check_pos(pos <= doc.length())?;
    check_version(doc, version)?;
    let ranges = deleted_ranges(doc);
    let pos = snap_single(pos, &ranges);

    let flat = doc.flatten();
    if is_adjacent_to_ordered_prefix(&flat, pos) {
        return Err(EditError::InvalidPosition);
    }

    let number = preceding_ordered_number(&flat, pos).map(|d| d + 1).unwrap_or(1);
    if number > 9 {
        return Err(EditError::InvalidPosition);
    }

    let mut prefix = format!("{number}. ");
    if !(pos == 0 || flat[pos - 1] == b'\n') {
        prefix = format!("\n{prefix}");
    }
    doc.queue_insert(pos, prefix.into_bytes());

    let mut expect = number + 1;
    let mut cursor = next_line_start(&flat, pos);
    while let Some(ls) = cursor {
        if expect > 9 || ordered_prefix_digit(&flat, ls).is_none() {
            break;
        }
        doc.queue_delete(ls, 3);
        doc.queue_insert(ls, format!("{expect}. ").into_bytes());
        expect += 1;
        cursor = next_line_start(&flat, ls);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(doc: &Document) -> String {
        String::from_utf8(doc.flatten()).unwrap()
    }

    #[test]
    fn heading_adds_leading_newline_mid_line() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"hello");
        heading(&mut doc, 0, 2, 5).unwrap();
        doc.commit_version();
        assert_eq!(flat(&doc), "hello\n## ");
    }

    #[test]
    fn heading_at_start_of_line_has_no_extra_newline() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"line one\nline two");
        heading(&mut doc, 0, 1, 9).unwrap();
        doc.commit_version();
        assert_eq!(flat(&doc), "line one\n# line two");
    }

    #[test]
    fn heading_rejects_bad_level() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"x");
        assert_eq!(heading(&mut doc, 0, 4, 0).unwrap_err(), EditError::InvalidPosition);
    }

    #[test]
    fn bold_wraps_range_with_closing_marker_queued_first() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"hello world");
        bold(&mut doc, 0, 0, 5).unwrap();
        doc.commit_version();
        assert_eq!(flat(&doc), "**hello** world");
    }

    #[test]
    fn link_wraps_with_url() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"click here");
        link(&mut doc, 0, 6, 10, "https://example.com").unwrap();
        doc.commit_version();
        assert_eq!(flat(&doc), "click [here](https://example.com)");
    }

    #[test]
    fn outdated_version_is_rejected() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"x");
        assert_eq!(insert(&mut doc, 5, 0, b"y").unwrap_err(), EditError::OutdatedVersion);
    }

    #[test]
    fn out_of_range_position_is_rejected() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"x");
        assert_eq!(insert(&mut doc, 0, 99, b"y").unwrap_err(), EditError::InvalidPosition);
    }

    #[test]
    fn range_wholly_inside_pending_delete_is_rejected() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"hello world");
        delete(&mut doc, 0, 0, 5).unwrap(); // pending delete of "hello"
        assert_eq!(bold(&mut doc, 0, 1, 3).unwrap_err(), EditError::DeletedPosition);
    }

    #[test]
    fn single_position_snaps_to_start_of_pending_delete() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"hello world");
        delete(&mut doc, 0, 0, 5).unwrap(); // pending delete of "hello"
        newline(&mut doc, 0, 2).unwrap(); // falls inside [0,5) -> snaps to 0
        doc.commit_version();
        assert_eq!(flat(&doc), "\n world");
    }

    #[test]
    fn ordered_list_starts_at_one_with_no_preceding_item() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"notes");
        ordered_list(&mut doc, 0, 0).unwrap();
        doc.commit_version();
        assert_eq!(flat(&doc), "1. notes");
    }

    #[test]
    fn ordered_list_continues_and_renumbers_following_items() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"x\n1. a\n2. b\n");
        // Append a new item right after "1. a", before "2. b".
        let pos = "x\n1. a".len();
        ordered_list(&mut doc, 0, pos).unwrap();
        doc.commit_version();
        assert_eq!(flat(&doc), "x\n1. a\n2. \n3. b\n");
    }

    #[test]
    fn ordered_list_rejects_adjacency_to_existing_prefix() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"1. a");
        assert_eq!(ordered_list(&mut doc, 0, 0).unwrap_err(), EditError::InvalidPosition);
    }

    #[test]
    fn ordered_list_rejects_past_nine() {
        let mut doc = Document::new();
        let mut body = String::new();
        for n in 1..=9 {
            body.push_str(&format!("{n}. x\n"));
        }
        doc.apply_insert(0, body.as_bytes());
        assert_eq!(
            ordered_list(&mut doc, 0, body.len()).unwrap_err(),
            EditError::InvalidPosition
        );
    }

    #[test]
    fn horizontal_rule_gets_surrounding_newlines() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"above");
        horizontal_rule(&mut doc, 0, 5).unwrap();
        doc.commit_version();
        assert_eq!(flat(&doc), "above\n---\n");
    }

    #[test]
    fn horizontal_rule_at_end_of_doc_has_no_trailing_newline() {
        let mut doc = Document::new();
        doc.apply_insert(0, b"");
        horizontal_rule(&mut doc, 0, 0).unwrap();
        doc.commit_version();
        assert_eq!(flat(&doc), "---");
    }
}
