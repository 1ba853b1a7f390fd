//! The client binary: performs the handshake, keeps a background thread
//! draining broadcast blocks into a local replica, and runs an interactive
//! stdin REPL.
//!
//! Grounded on `original_source/source/client.c`'s cooperative single
//! process loop. The original polls its named pipe and stdin in the same
//! thread with `select`; here a background thread owns the inbound stream
//! and forwards whole broadcast blocks over a channel, which is the more
//! idiomatic Rust shape for "drain whatever arrived, non-blockingly" and
//! matches the `thread::spawn` + `mpsc` pattern the pack's session tooling
//! uses for the same kind of background-reader problem.

use std::io::{self, BufRead, Read, Write};
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use scrivener::client::Replica;
use scrivener::config::ClientArgs;
use scrivener::roles::Role;
use scrivener::transport::TcpTransport;

fn main() -> Result<()> {
    env_logger::init();
    let args = ClientArgs::parse();

    let stream = TcpStream::connect(&args.server)
        .with_context(|| format!("connecting to {}", args.server))?;
    let (mut reader, mut writer) = TcpTransport::split(stream)?;

    writer.write_all(format!("{}\n", args.username).as_bytes())?;

    let mut role_line = String::new();
    if reader.read_line(&mut role_line)? == 0 {
        bail!("connection closed during handshake");
    }
    let role_line = role_line.trim_end_matches(['\n', '\r']);
    if role_line.starts_with("Reject") {
        bail!("server rejected {}: unknown user", args.username);
    }
    let role = match role_line {
        "read" => Role::Read,
        "write" => Role::Write,
        other => bail!("unexpected role line from server: {other:?}"),
    };

    let mut version_line = String::new();
    reader.read_line(&mut version_line)?;
    let version: u64 = version_line.trim().parse().context("parsing handshake version line")?;

    let mut length_line = String::new();
    reader.read_line(&mut length_line)?;
    let length: usize = length_line.trim().parse().context("parsing handshake length line")?;

    let mut content = vec![0u8; length];
    reader.read_exact(&mut content)?;

    let mut replica = Replica::new(role, version, &content);
    info!("connected as {} ({:?})", args.username, role);

    let blocks = spawn_broadcast_reader(reader);
    run_repl(&mut writer, &mut replica, &blocks)
}

/// Reads whole `VERSION ... END` blocks off the inbound stream and forwards
/// each one to the main thread. Returns when the stream hits EOF.
fn spawn_broadcast_reader<R: BufRead + Send + 'static>(mut reader: R) -> Receiver<Vec<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || loop {
        let mut block = Vec::new();
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => return,
                Ok(_) => {}
                Err(_) => return,
            }
            let line = line.trim_end_matches(['\n', '\r']).to_string();
            let is_end = line == "END";
            block.push(line);
            if is_end {
                break;
            }
        }
        if tx.send(block).is_err() {
            return;
        }
    });
    rx
}

fn drain_blocks(blocks: &Receiver<Vec<String>>, replica: &mut Replica) {
    while let Ok(block) = blocks.try_recv() {
        replica.apply_block(&block);
    }
}

fn run_repl<W: Write>(writer: &mut W, replica: &mut Replica, blocks: &Receiver<Vec<String>>) -> Result<()> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading a command from stdin")?;
        if line.len() > 255 || !line.bytes().all(|b| (32..=126).contains(&b)) {
            println!("command rejected: must be printable ASCII and at most 255 bytes");
            continue;
        }
        match line.as_str() {
            "DOC?" => {
                drain_blocks(blocks, replica);
                io::stdout().write_all(&replica.flatten())?;
                println!();
            }
            "LOG?" => {
                drain_blocks(blocks, replica);
                for entry in replica.log_lines() {
                    println!("{entry}");
                }
            }
            "PERM?" => {
                println!("{}", match replica.role() {
                    Role::Read => "read",
                    Role::Write => "write",
                });
            }
            "DISCONNECT" => {
                writer.write_all(b"DISCONNECT\n")?;
                break;
            }
            "" => {}
            _ => {
                writer.write_all(format!("{line}\n").as_bytes())?;
                drain_blocks(blocks, replica);
            }
        }
    }
    Ok(())
}
