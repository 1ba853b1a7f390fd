//! Server-side state: the command queue, the broadcast tick, and the
//! per-session handshake/read loop.
//!
//! Grounded on `original_source/source/server.c`: `client_list`/`doc` under
//! `doc_lock`/`client_list_lock` become [`ServerState`]'s two
//! `parking_lot::Mutex`es (plus a third for the connection count, matching
//! `client_count_lock`); `client_handler` becomes [`handle_session`];
//! `broadcast_thread`'s per-tick algorithm becomes [`run_tick`].

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::command::Command;
use crate::document::Document;
use crate::error::{EditError, SessionError};
use crate::outcome::{render_block, CommandOutcome, VersionLog, VersionLogEntry};
use crate::roles::{Role, RoleOracle};

/// A command line plus the bookkeeping the broadcast tick needs to
/// authorize, order, and dispatch it.
pub struct QueuedCommand {
    pub username: String,
    pub role: Role,
    pub text: String,
    pub client_version: u64,
    pub arrival: (u64, u32),
}

fn now() -> (u64, u32) {
    let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    (d.as_secs(), d.subsec_nanos())
}

/// A registered client's outbound half plus the identity needed to log and
/// unregister it.
pub struct ClientSession<W> {
    id: u64,
    pub username: String,
    pub role: Role,
    writer: W,
}

/// Everything guarded by the document lock: the buffer itself, its command
/// queue, and the permanent version history.
pub struct DocumentState {
    pub document: Document,
    pub queue: Vec<QueuedCommand>,
    pub history: Vec<VersionLog>,
}

impl DocumentState {
    fn new() -> Self {
        DocumentState { document: Document::new(), queue: Vec::new(), history: Vec::new() }
    }
}

/// Shared server state. `W` is the transport's writer half; a server
/// instance runs one concrete transport at a time (see `crate::transport`).
pub struct ServerState<W> {
    pub doc: Mutex<DocumentState>,
    sessions: Mutex<Vec<ClientSession<W>>>,
    client_count: Mutex<usize>,
    next_id: AtomicU64,
}

impl<W: Write + Send + 'static> ServerState<W> {
    pub fn new() -> Self {
        ServerState {
            doc: Mutex::new(DocumentState::new()),
            sessions: Mutex::new(Vec::new()),
            client_count: Mutex::new(0),
            next_id: AtomicU64::new(0),
        }
    }

    /// Number of currently connected clients, for the debug REPL's `QUIT`
    /// gate.
    pub fn client_count(&self) -> usize {
        *self.client_count.lock()
    }

    pub fn flattened_document(&self) -> Vec<u8> {
        self.doc.lock().document.flatten()
    }

    /// Final commit plus the terminal `doc.md` snapshot, run once on
    /// `QUIT`. See `original_source/source/server.c`'s `QUIT` handler.
    pub fn shutdown_snapshot(&self, path: &Path) -> std::io::Result<()> {
        let mut state = self.doc.lock();
        state.document.commit_version();
        std::fs::write(path, state.document.flatten())
    }
}

impl<W: Write + Send + 'static> Default for ServerState<W> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one broadcast tick: drain the queue, authorize and dispatch each
/// command, commit immediately after each success, then fan the resulting
/// version block out to every registered session.
pub fn run_tick<W: Write + Send + 'static>(state: &ServerState<W>) {
    let mut doc_state = state.doc.lock();
    if !doc_state.queue.is_empty() {
        doc_state.queue.sort_by_key(|c| c.arrival);
    }
    let drained: Vec<QueuedCommand> = std::mem::take(&mut doc_state.queue);

    let mut tick_log = VersionLog::default();
    for cmd in drained {
        let outcome = if matches!(cmd.role, Role::Read) {
            CommandOutcome::Rejected(EditError::Unauthorised)
        } else {
            match Command::parse(&cmd.text) {
                None => {
                    debug!("unparseable command from {}: {:?}", cmd.username, cmd.text);
                    CommandOutcome::Rejected(EditError::InvalidPosition)
                }
                Some(parsed) => match parsed.dispatch(&mut doc_state.document, cmd.client_version) {
                    Ok(()) => {
                        doc_state.document.commit_version();
                        CommandOutcome::Success
                    }
                    Err(err) => CommandOutcome::Rejected(err),
                },
            }
        };
        debug!("{} {:?} -> {:?}", cmd.username, cmd.text, outcome);
        tick_log.entries.push(VersionLogEntry { username: cmd.username, command_text: cmd.text, outcome });
    }

    let broadcast_version = doc_state.document.version();
    tick_log.version = broadcast_version;
    let block = render_block(broadcast_version, &tick_log);

    {
        let mut sessions = state.sessions.lock();
        let mut failed = Vec::new();
        for (idx, session) in sessions.iter_mut().enumerate() {
            if session.writer.write_all(block.as_bytes()).is_err() {
                failed.push(idx);
            }
        }
        for idx in failed.into_iter().rev() {
            let dropped = sessions.remove(idx);
            warn!("dropping session {} after a failed broadcast write", dropped.username);
        }
    }

    if !tick_log.entries.is_empty() {
        info!("tick: drained {} commands, version now {broadcast_version}", tick_log.entries.len());
    }
    doc_state.history.push(tick_log);
}

/// Snapshots the current document and registers `writer` as a session in
/// one held doc lock (with the session list locked nested inside it, per
/// the one permitted lock nesting), then sends the handshake reply through
/// the now-registered session. Doing the snapshot, the registration, and
/// the reply under the same lock means a tick can never land in the gap
/// between "read the snapshot" and "this session can receive broadcasts" —
/// otherwise a tick firing in that gap would commit a version this session
/// never sees, and every later broadcast it replays would diverge from a
/// snapshot frozen one version behind.
fn register_and_send_handshake<W: Write + Send + 'static>(
    state: &ServerState<W>,
    id: u64,
    username: &str,
    role: Role,
    writer: W,
) -> Result<(), SessionError> {
    let doc_state = state.doc.lock();
    let version = doc_state.document.version();
    let content = doc_state.document.flatten();
    {
        let mut count = state.client_count.lock();
        *count += 1;
    }
    let mut sessions = state.sessions.lock();
    sessions.push(ClientSession { id, username: username.to_string(), role, writer });
    let session = sessions.last_mut().expect("just pushed");
    session.writer.write_all(format!("{}\n", role_token(role)).as_bytes())?;
    session.writer.write_all(format!("{version}\n").as_bytes())?;
    session.writer.write_all(format!("{}\n", content.len()).as_bytes())?;
    session.writer.write_all(&content)?;
    Ok(())
}

/// The per-session handshake and command read loop. Blocks until the
/// client disconnects or the stream errors.
pub fn handle_session<R, W>(
    state: &ServerState<W>,
    mut reader: R,
    mut writer: W,
    roles: &dyn RoleOracle,
) -> Result<(), SessionError>
where
    R: BufRead,
    W: Write + Send + 'static,
{
    let mut username = String::new();
    if reader.read_line(&mut username)? == 0 {
        return Err(SessionError::IncompleteHandshake);
    }
    let username = username.trim_end_matches(['\n', '\r']).to_string();

    let role = match roles.lookup(&username).map_err(|e| {
        warn!("role lookup failed for {username}: {e}");
        SessionError::IncompleteHandshake
    })? {
        Some(role) => role,
        None => {
            writer.write_all(b"Reject UNAUTHORISED\n")?;
            return Ok(());
        }
    };

    let id = state.next_id.fetch_add(1, Ordering::Relaxed);

    if let Err(err) = register_and_send_handshake(state, id, &username, role, writer) {
        state.sessions.lock().retain(|s| s.id != id);
        let mut count = state.client_count.lock();
        *count = count.saturating_sub(1);
        return Err(err);
    }
    info!("{username} connected as {}", role_token(role));

    let result = read_loop(state, &mut reader, &username, role);

    state.sessions.lock().retain(|s| s.id != id);
    {
        let mut count = state.client_count.lock();
        *count = count.saturating_sub(1);
    }
    info!("{username} disconnected");
    result
}

fn read_loop<R: BufRead, W: Write + Send + 'static>(
    state: &ServerState<W>,
    reader: &mut R,
    username: &str,
    role: Role,
) -> Result<(), SessionError> {
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(());
        }
        let line = line.trim_end_matches(['\n', '\r']);
        if line == "DISCONNECT" {
            return Ok(());
        }
        if line.is_empty() {
            continue;
        }
        let mut doc_state = state.doc.lock();
        let client_version = doc_state.document.version();
        doc_state.queue.push(QueuedCommand {
            username: username.to_string(),
            role,
            text: line.to_string(),
            client_version,
            arrival: now(),
        });
    }
}

fn role_token(role: Role) -> &'static str {
    match role {
        Role::Read => "read",
        Role::Write => "write",
    }
}
