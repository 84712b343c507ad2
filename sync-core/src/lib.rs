//! # sync-core
//!
//! I/O-free logic for roomsync (instant tests).
//!
//! This crate implements the sync-response reducer, the room state table,
//! the listener registry and the poll loop state machine without any
//! network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! Nothing in this crate touches the network, the disk or a clock. The
//! only outward effects are `tracing` events and listener callbacks:
//! - The poll loop ([`PollState`]) is a plain transition function from
//!   state and event to new state and actions
//! - The reducer mutates its room table and calls listener callbacks
//!   inline, in wire order, on the caller's thread
//! - Failure policies keep their own attempt counters
//!
//! Tests drive everything synchronously, without async or a runtime.
//!
//! The actual I/O (long-poll fetches, cursor persistence) is performed by
//! `sync-client`, which interprets the actions produced by these state
//! machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod driver;
pub mod listeners;
pub mod policy;
pub mod reducer;
pub mod rooms;

pub use driver::{PollAction, PollEvent, PollState, StopReason};
pub use listeners::{EventListener, ListenerError, ListenerRegistry};
pub use policy::{ExponentialBackoff, FailurePolicy, FixedDelay, Retry, DEFAULT_RETRY_DELAY};
pub use reducer::{ReduceError, ReduceFault, ResponseReducer};
pub use rooms::{Room, RoomTable, StateError, DEFAULT_MEMBERSHIP};
