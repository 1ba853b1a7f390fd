//! The chunked document buffer.
//!
//! Grounded on the teacher's piece table (`editor/pt.rs`) for the general
//! shape of an append/splice buffer, but the spec calls for a doubly linked
//! list of fixed-capacity chunks rather than a piece table, so the storage
//! layer here is a fresh design. Per-chunk forward/backward links are kept
//! as index handles into an arena (`Vec<Chunk>`) instead of raw pointers or
//! `Rc<RefCell<_>>`, which keeps the borrow checker happy without an
//! ownership cycle — the "index-based prev/next handles" option called out
//! for languages that reject back-reference cycles.

/// Fixed capacity of a single chunk, in bytes.
pub const CHUNK_SIZE: usize = 256;

#[derive(Debug)]
struct Chunk {
    data: [u8; CHUNK_SIZE],
    len: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

impl Chunk {
    fn empty() -> Self {
        Chunk { data: [0; CHUNK_SIZE], len: 0, prev: None, next: None }
    }
}

/// An insert or delete waiting to be applied at the next commit.
///
/// `pos` is always expressed in the coordinate space of the document as of
/// the start of the current version; see [`Document::commit_version`].
#[derive(Debug, Clone)]
pub enum PendingEdit {
    Insert { pos: usize, text: Vec<u8> },
    Delete { pos: usize, len: usize },
}

/// The chunked byte buffer plus its pending edit queue and version counter.
///
/// Chunks live in an arena (`chunks`); `free` recycles slots vacated by a
/// delete so a long-lived document doesn't grow its arena unboundedly.
#[derive(Debug)]
pub struct Document {
    chunks: Vec<Chunk>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    length: usize,
    version: u64,
    pending: Vec<PendingEdit>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Document {
            chunks: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            length: 0,
            version: 0,
            pending: Vec::new(),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Overwrites the version counter directly — used by the client
    /// replica to adopt a server-declared version rather than reach it by
    /// counting local commits.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn pending(&self) -> &[PendingEdit] {
        &self.pending
    }

    /// Queues an insert. Callers (the markdown layer) are responsible for
    /// validating `pos` and the document version before calling this.
    pub fn queue_insert(&mut self, pos: usize, text: Vec<u8>) {
        self.pending.push(PendingEdit::Insert { pos, text });
    }

    /// Queues a delete. See [`Document::queue_insert`].
    pub fn queue_delete(&mut self, pos: usize, len: usize) {
        self.pending.push(PendingEdit::Delete { pos, len });
    }

    /// Concatenates every chunk into one owned buffer.
    pub fn flatten(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.length);
        let mut cur = self.head;
        while let Some(idx) = cur {
            let chunk = &self.chunks[idx];
            buf.extend_from_slice(&chunk.data[..chunk.len]);
            cur = chunk.next;
        }
        buf
    }

    /// Byte at `pos` immediately preceding it, if any, read from the live
    /// buffer. Used by primitives that need to inspect the character before
    /// an insertion point (e.g. "is this start-of-line?").
    pub fn byte_before(&self, pos: usize) -> Option<u8> {
        if pos == 0 {
            return None;
        }
        let flat = self.flatten();
        flat.get(pos - 1).copied()
    }

    /// Byte at `pos`, if any.
    pub fn byte_at(&self, pos: usize) -> Option<u8> {
        let flat = self.flatten();
        flat.get(pos).copied()
    }

    fn alloc_chunk(&mut self) -> usize {
        if let Some(idx) = self.free.pop() {
            self.chunks[idx] = Chunk::empty();
            idx
        } else {
            self.chunks.push(Chunk::empty());
            self.chunks.len() - 1
        }
    }

    fn link_tail(&mut self, idx: usize) {
        self.chunks[idx].prev = self.tail;
        self.chunks[idx].next = None;
        match self.tail {
            Some(t) => self.chunks[t].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    fn unlink_and_free(&mut self, idx: usize) {
        let prev = self.chunks[idx].prev;
        let next = self.chunks[idx].next;
        match prev {
            Some(p) => self.chunks[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.chunks[n].prev = prev,
            None => self.tail = prev,
        }
        self.free.push(idx);
    }

    /// Finds the chunk containing byte offset `pos`, plus the local offset
    /// within it. `pos == length` resolves to the tail chunk at its end
    /// (so an append can always find a target to fill before overflowing
    /// into a new chunk); an empty document returns `None` for any `pos`.
    fn find_chunk(&self, pos: usize) -> Option<(usize, usize)> {
        if self.length == 0 {
            return None;
        }
        if pos == self.length {
            let t = self.tail.expect("non-empty document has a tail");
            return Some((t, self.chunks[t].len));
        }
        let mut cur = self.head;
        let mut base = 0usize;
        while let Some(idx) = cur {
            let clen = self.chunks[idx].len;
            if base + clen <= pos {
                base += clen;
                cur = self.chunks[idx].next;
            } else {
                return Some((idx, pos - base));
            }
        }
        None
    }

    /// Splices `text` into the chunk list at `pos`, filling the target
    /// chunk up to [`CHUNK_SIZE`] before overflowing into newly allocated
    /// chunks. Data at and beyond the insertion point is shifted right in
    /// place before the copy.
    pub fn apply_insert(&mut self, pos: usize, text: &[u8]) {
        if text.is_empty() {
            return;
        }
        let (mut cur, mut offset) = match self.find_chunk(pos) {
            Some((idx, off)) => (Some(idx), off),
            None => (None, 0),
        };
        if cur.is_none() {
            let idx = self.alloc_chunk();
            self.link_tail(idx);
            cur = Some(idx);
            offset = 0;
        }
        let mut inserted = 0usize;
        while inserted < text.len() {
            let idx = match cur {
                Some(idx) => idx,
                None => {
                    let idx = self.alloc_chunk();
                    self.link_tail(idx);
                    offset = 0;
                    idx
                }
            };
            let chunk_len = self.chunks[idx].len;
            let space = CHUNK_SIZE - chunk_len;
            let to_copy = std::cmp::min(text.len() - inserted, space);

            if offset < chunk_len {
                self.chunks[idx].data.copy_within(offset..chunk_len, offset + to_copy);
            }
            self.chunks[idx].data[offset..offset + to_copy]
                .copy_from_slice(&text[inserted..inserted + to_copy]);
            self.chunks[idx].len += to_copy;
            self.length += to_copy;
            inserted += to_copy;

            if self.chunks[idx].len == CHUNK_SIZE {
                offset = 0;
                if self.chunks[idx].next.is_none() && inserted < text.len() {
                    let next = self.alloc_chunk();
                    self.chunks[next].prev = Some(idx);
                    self.chunks[idx].next = Some(next);
                    self.tail = Some(next);
                }
                cur = self.chunks[idx].next;
            } else {
                offset += to_copy;
                cur = Some(idx);
            }
        }
    }

    /// Removes `len` bytes starting at `pos`, spanning chunk boundaries as
    /// needed and freeing any chunk that becomes empty.
    pub fn apply_delete(&mut self, pos: usize, len: usize) {
        let mut remaining = len;
        if remaining == 0 {
            return;
        }
        let (mut cur, mut offset) = match self.find_chunk(pos) {
            Some(x) => x,
            None => return,
        };
        loop {
            if remaining == 0 {
                break;
            }
            let idx = cur;
            let chunk_len = self.chunks[idx].len;
            let can_delete = std::cmp::min(chunk_len - offset, remaining);

            self.chunks[idx]
                .data
                .copy_within(offset + can_delete..chunk_len, offset);
            self.chunks[idx].len -= can_delete;
            self.length -= can_delete;
            remaining -= can_delete;

            let next = self.chunks[idx].next;
            if self.chunks[idx].len == 0 {
                self.unlink_and_free(idx);
            }
            match next {
                Some(n) => {
                    cur = n;
                    offset = 0;
                }
                None => break,
            }
        }
    }

    /// Applies all pending edits and bumps the version by exactly one.
    ///
    /// Deletes are applied highest-position-first: within a single batch
    /// (e.g. the several same-length delete/insert pairs an ordered-list
    /// renumber queues) this guarantees that deleting one range never
    /// invalidates the still-pending original position of another, without
    /// needing a running offset the way inserts do. Inserts are
    /// stable-sorted by ascending position and applied with a running
    /// offset that accounts for the bytes already inserted at or before
    /// each position.
    pub fn commit_version(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        let mut deletes: Vec<(usize, usize)> = Vec::new();
        let mut inserts: Vec<(usize, Vec<u8>)> = Vec::new();
        for edit in pending {
            match edit {
                PendingEdit::Delete { pos, len } => deletes.push((pos, len)),
                PendingEdit::Insert { pos, text } => inserts.push((pos, text)),
            }
        }

        deletes.sort_by(|a, b| b.0.cmp(&a.0));
        for (pos, len) in deletes {
            self.apply_delete(pos, len);
        }

        inserts.sort_by(|a, b| a.0.cmp(&b.0));
        let mut offset = 0usize;
        for (pos, text) in inserts {
            self.apply_insert(pos + offset, &text);
            offset += text.len();
        }

        self.version += 1;
    }
}
