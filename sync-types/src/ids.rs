//! Identity and ordering types for roomsync.
//!
//! All identifiers are opaque strings handed out by the homeserver. The
//! newtypes exist so a room ID can never be passed where a user ID is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// The account being synchronised, e.g. `@bot:example.org`.
    ///
    /// Keys the cursor and filter stores.
    UserId
);

string_id!(
    /// A room identifier, e.g. `!abc:example.org`.
    RoomId
);

string_id!(
    /// A server-side filter identifier returned by filter creation.
    FilterId
);

/// An opaque resumption token ("next batch").
///
/// The empty token is reserved: it means no sync has completed yet, and a
/// response fetched with it is a full snapshot rather than a delta.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Create a Cursor from a server-issued token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The "no prior sync" sentinel.
    pub fn initial() -> Self {
        Self(String::new())
    }

    /// Whether this is the "no prior sync" sentinel.
    pub fn is_initial(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_initial() {
            f.write_str("Cursor(<initial>)")
        } else {
            write!(f, "Cursor({})", self.0)
        }
    }
}

impl From<&str> for Cursor {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
