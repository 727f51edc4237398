//! wabook library — exposes internal modules for the binary and integration tests.

pub mod book;
pub mod chats;
pub mod client;
pub mod config;
pub mod errors;
pub mod phone;
pub mod repl;
