//! Spaced-repetition memory engine for Chinese vocabulary review.
//!
//! Fragments captured while chatting, reading or browsing culture cards are
//! memorized as [`MemoryItem`](memory::MemoryItem)s and brought back for review
//! on a fixed retention ladder:
//!
//! | Stage | Next review after |
//! |-------|-------------------|
//! | 0 | 1 day |
//! | 1 | 2 days |
//! | 2 | 4 days |
//! | 3 | 7 days |
//! | 4 | 15 days (plateau) |
//!
//! A remembered item climbs one stage; a forgotten one drops back to stage 0.
//!
//! # Architecture
//!
//! - **Scheduler**: in-memory collection for the active owner, optimistic
//!   captures and reviews, due-item queries
//! - **Sync queue**: one FIFO worker applying durable writes in order
//! - **Storage**: SQLite on the device, or a PostgREST-style remote database
//!   for signed-in accounts; a one-shot migration moves device items to the cloud
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema and migrations
//! - [`error`]: Scheduler and store error types
//! - [`memory`]: Scheduler, interval table, sync queue, migration, backup and stats
//! - [`store`]: Storage contract and its SQLite and REST implementations

pub mod config;
pub mod db;
pub mod error;
pub mod memory;
pub mod store;
