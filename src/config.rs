//! Command-line argument definitions for the two binaries.
//!
//! Grounded on the teacher's `clap` usage (`ohomburg-avian/src/bin/client.rs`,
//! `src/main.rs`), modernized to the derive API (`clap = { version = "4.5",
//! features = ["derive"] }`, matching the pack's `Alb-O-xeno` workspace).

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "scrivener-server", about = "Collaborative markdown editor server")]
pub struct ServerArgs {
    /// Broadcast tick interval, in milliseconds.
    pub interval_ms: u64,

    /// Address to bind the session acceptor to.
    #[arg(long, default_value = "127.0.0.1:7878")]
    pub bind: String,

    /// Path to the `<username> <role>` role file.
    #[arg(long, default_value = "roles.txt")]
    pub roles_path: PathBuf,
}

#[derive(Debug, Parser)]
#[command(name = "scrivener-client", about = "Collaborative markdown editor client")]
pub struct ClientArgs {
    /// Server address, as `host:port`.
    pub server: String,

    /// Username to authenticate as.
    pub username: String,
}
