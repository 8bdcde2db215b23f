//! TCP listener and per-connection lifecycle

mod connection;
mod listener;

pub use connection::{client_writer_task, read_message, write_message};
pub use listener::{ServerContext, ServerListener};
