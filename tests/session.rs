//! Black-box coverage of the handshake -> queue -> tick -> broadcast path,
//! driven entirely through `transport::in_memory_pair` rather than a real
//! socket.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use scrivener::error::RoleLookupError;
use scrivener::roles::{Role, RoleOracle};
use scrivener::server::{self, ServerState};
use scrivener::transport::{in_memory_pair, ChannelWriter};

struct MapOracle(Vec<(&'static str, Role)>);

impl RoleOracle for MapOracle {
    fn lookup(&self, username: &str) -> Result<Option<Role>, RoleLookupError> {
        Ok(self.0.iter().find(|(u, _)| *u == username).map(|(_, r)| *r))
    }
}

fn wait_for_queue(state: &ServerState<ChannelWriter>, expected: usize) {
    for _ in 0..200 {
        if state.doc.lock().queue.len() >= expected {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("command never reached the server queue");
}

#[test]
fn full_round_trip_from_handshake_to_broadcast() {
    let state = Arc::new(ServerState::new());
    let oracle = MapOracle(vec![("alice", Role::Write)]);

    let (mut client, server) = in_memory_pair();
    let session_state = Arc::clone(&state);
    let session = thread::spawn(move || {
        server::handle_session(&session_state, server.0, server.1, &oracle).unwrap();
    });

    client.1.write_all(b"alice\n").unwrap();

    let mut role_line = String::new();
    client.0.read_line(&mut role_line).unwrap();
    assert_eq!(role_line, "write\n");
    let mut version_line = String::new();
    client.0.read_line(&mut version_line).unwrap();
    assert_eq!(version_line, "0\n");
    let mut length_line = String::new();
    client.0.read_line(&mut length_line).unwrap();
    assert_eq!(length_line, "0\n");

    client.1.write_all(b"INSERT 0 hi\n").unwrap();
    wait_for_queue(&state, 1);
    server::run_tick(&state);

    let mut block = Vec::new();
    for _ in 0..3 {
        let mut line = String::new();
        client.0.read_line(&mut line).unwrap();
        block.push(line);
    }
    assert_eq!(block[0], "VERSION 1\n");
    assert_eq!(block[1], "EDIT alice INSERT 0 hi SUCCESS\n");
    assert_eq!(block[2], "END\n");
    assert_eq!(state.flattened_document(), b"hi");

    client.1.write_all(b"DISCONNECT\n").unwrap();
    session.join().unwrap();
    assert_eq!(state.client_count(), 0);
}

#[test]
fn read_role_command_is_rejected_unauthorised_end_to_end() {
    let state = Arc::new(ServerState::new());
    let oracle = MapOracle(vec![("bob", Role::Read)]);

    let (mut client, server) = in_memory_pair();
    let session_state = Arc::clone(&state);
    let session = thread::spawn(move || {
        server::handle_session(&session_state, server.0, server.1, &oracle).unwrap();
    });

    client.1.write_all(b"bob\n").unwrap();
    for _ in 0..3 {
        let mut line = String::new();
        client.0.read_line(&mut line).unwrap();
    }

    client.1.write_all(b"INSERT 0 nope\n").unwrap();
    wait_for_queue(&state, 1);
    server::run_tick(&state);

    let mut block = Vec::new();
    for _ in 0..3 {
        let mut line = String::new();
        client.0.read_line(&mut line).unwrap();
        block.push(line);
    }
    assert_eq!(block[0], "VERSION 0\n");
    assert_eq!(block[1], "EDIT bob INSERT 0 nope Reject UNAUTHORISED\n");
    assert!(state.flattened_document().is_empty());

    client.1.write_all(b"DISCONNECT\n").unwrap();
    session.join().unwrap();
}

#[test]
fn unknown_user_is_rejected_without_registering_a_session() {
    let state: Arc<ServerState<ChannelWriter>> = Arc::new(ServerState::new());
    let oracle = MapOracle(vec![]);

    let (mut client, server) = in_memory_pair();
    server::handle_session(&state, server.0, server.1, &oracle).unwrap();

    let mut line = String::new();
    client.0.read_line(&mut line).unwrap();
    assert_eq!(line, "Reject UNAUTHORISED\n");
    assert_eq!(state.client_count(), 0);
}
