//! The server binary: accepts sessions over TCP, runs the broadcast tick on
//! a timer, and exposes a tiny stdin REPL for operator commands.
//!
//! Grounded on `original_source/source/server.c`'s `main`: spawn the
//! acceptor, spawn `broadcast_thread`, then run the parent's own command
//! loop (`DOC?`/`LOG?`/`QUIT`) until told to shut down.

use std::io::{self, BufRead, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use scrivener::config::ServerArgs;
use scrivener::outcome::render_block;
use scrivener::roles::FileRoleOracle;
use scrivener::server::{self, ServerState};
use scrivener::transport::TcpTransport;

fn main() -> Result<()> {
    env_logger::init();
    let args = ServerArgs::parse();

    let listener = TcpListener::bind(&args.bind)
        .with_context(|| format!("binding to {}", args.bind))?;
    info!("listening on {}", args.bind);

    let state: Arc<ServerState<TcpStream>> = Arc::new(ServerState::new());
    let roles = Arc::new(FileRoleOracle::new(&args.roles_path));

    {
        let state = Arc::clone(&state);
        let interval = Duration::from_millis(args.interval_ms.max(1));
        thread::spawn(move || loop {
            thread::sleep(interval);
            server::run_tick(&state);
        });
    }

    {
        let state = Arc::clone(&state);
        let roles = Arc::clone(&roles);
        thread::spawn(move || accept_loop(listener, state, roles));
    }

    run_debug_repl(&state)
}

fn accept_loop(listener: TcpListener, state: Arc<ServerState<TcpStream>>, roles: Arc<FileRoleOracle>) {
    for incoming in listener.incoming() {
        let conn = match incoming {
            Ok(conn) => conn,
            Err(err) => {
                warn!("accept failed: {err}");
                continue;
            }
        };
        let state = Arc::clone(&state);
        let roles = Arc::clone(&roles);
        thread::spawn(move || {
            let (reader, writer) = match TcpTransport::split(conn) {
                Ok(halves) => halves,
                Err(err) => {
                    warn!("failed to split incoming connection: {err}");
                    return;
                }
            };
            if let Err(err) = server::handle_session(&state, reader, writer, roles.as_ref()) {
                warn!("session ended with an error: {err}");
            }
        });
    }
}

fn run_debug_repl(state: &ServerState<TcpStream>) -> Result<()> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading a debug command from stdin")?;
        match line.trim() {
            "DOC?" => {
                let mut stdout = io::stdout();
                stdout.write_all(&state.flattened_document())?;
                stdout.write_all(b"\n")?;
            }
            "LOG?" => {
                let doc_state = state.doc.lock();
                for tick in &doc_state.history {
                    print!("{}", render_block(tick.version, tick));
                }
            }
            "QUIT" => {
                if state.client_count() > 0 {
                    println!("refusing to quit: {} client(s) still connected", state.client_count());
                    continue;
                }
                state.shutdown_snapshot(Path::new("doc.md"))?;
                info!("shut down, final document written to doc.md");
                return Ok(());
            }
            "" => {}
            other => println!("unknown debug command: {other}"),
        }
    }
    Ok(())
}
