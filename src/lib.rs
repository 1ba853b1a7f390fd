//! Collaborative markdown editor: document engine, wire protocol, and the
//! server/client runtimes built on top of them.
//!
//! This crate never initializes a logger itself — only the binaries do —
//! so it can be embedded without imposing a global filter.

pub mod client;
pub mod command;
pub mod config;
pub mod document;
pub mod error;
pub mod markdown;
pub mod outcome;
pub mod roles;
pub mod server;
pub mod transport;
