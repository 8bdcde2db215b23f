//! easel - a real-time collaborative whiteboard coordination server
//!
//! Many connections view and mutate a shared set of positioned, typed
//! elements on a named board, see each other's cursors and selections in
//! real time, and observe consistent element state across reconnects.
//!
//! # Architecture
//!
//! A connection issues an operation; the server validates session
//! membership and access, a [`coordinator`] applies the mutation against
//! the persistence collaborator behind [`store`], and [`broadcast`] fans
//! the accepted result out to every subscriber of the board. Conflicts are
//! resolved last-write-wins per element; presence and broadcast state are
//! ephemeral and in-memory.

pub mod access;
pub mod board;
pub mod broadcast;
pub mod config;
pub mod coordinator;
pub mod protocol;
pub mod server;
pub mod session;
pub mod store;
