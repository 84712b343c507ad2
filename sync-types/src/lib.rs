//! # sync-types
//!
//! Wire format types for the roomsync long-poll sync engine.
//!
//! This crate provides the foundational types used across all roomsync crates:
//! - [`UserId`], [`RoomId`], [`FilterId`], [`Cursor`] - Identity and ordering types
//! - [`Event`], [`Content`] - Room events with a free-form JSON payload
//! - [`SyncRequest`], [`SyncResponse`] - The long-poll exchange
//! - [`SyncError`], [`ContentError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod event;
mod ids;
mod messages;

pub use error::{ContentError, SyncError};
pub use event::{Content, Event, MEMBER_EVENT};
pub use ids::{Cursor, FilterId, RoomId, UserId};
pub use messages::{
    EventList, FilterDefinition, FilterResponse, InvitedRoom, JoinedRoom, LeftRoom, Rooms,
    SyncRequest, SyncResponse, Timeline, DEFAULT_TIMEOUT_MS,
};
