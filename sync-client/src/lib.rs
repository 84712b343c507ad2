//! # sync-client
//!
//! Client library for the roomsync long-poll sync engine.
//!
//! This is the main library that applications use to follow a chat
//! account's rooms.
//!
//! ## Features
//!
//! - **Long-poll loop**: fetch, reduce, persist the cursor, repeat
//! - **Replay suppression**: backlog of freshly joined rooms is dropped
//! - **Pluggable failure policy**: fixed delay by default, backoff available
//! - **Transport Abstraction**: Pluggable transport layer (HTTP, mock)
//! - **I/O-free State Machine**: poll decisions live in sync-core
//!
//! ## Example
//!
//! ```ignore
//! use roomsync_client::{DefaultSyncer, FileStore, SyncClient, SyncConfig};
//!
//! let config = SyncConfig::from_file(Path::new("roomsync.toml"))?;
//! let store = Arc::new(FileStore::open("sync.json"));
//! let mut syncer = DefaultSyncer::from_config(&config, store.clone(), store);
//! syncer.on_event_type("m.room.message", |event| {
//!     println!("{}", event.body().unwrap_or_default());
//!     Ok(())
//! });
//!
//! let mut client = SyncClient::new(config, transport, syncer);
//! client.sync().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod store;
pub mod syncer;
pub mod transport;

pub use client::{ClientError, StopHandle, SyncClient};
pub use config::{ConfigError, SyncConfig};
pub use store::{CursorStore, FileStore, FilterStore, MemoryCursorStore, MemoryFilterStore};
pub use syncer::{DefaultSyncer, Syncer};
pub use transport::{MockTransport, Transport, TransportError};
