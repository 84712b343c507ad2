//! Poll loop state machine for roomsync.
//!
//! This module provides a pure, side-effect-free state machine for the
//! long-poll loop. It takes events as input and produces a new state plus a
//! list of actions to execute.
//!
//! ```text
//! Idle → Fetching → Reducing → Persisting → Fetching ...
//!           ↓  ↑
//!         Backoff
//! ```
//!
//! The actual I/O (fetching, persisting, sleeping) is performed by
//! sync-client, not by this module.

use roomsync_types::Cursor;
use std::time::Duration;

use crate::policy::Retry;

/// Poll loop state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Not started.
    Idle,
    /// Long-poll fetch in flight.
    Fetching {
        /// Cursor the fetch was issued with.
        since: Cursor,
        /// Consecutive failed fetches before this one.
        attempt: u32,
    },
    /// Applying a fetched response.
    Reducing {
        /// Cursor the response was fetched with.
        since: Cursor,
        /// Token the response handed back.
        next_batch: Cursor,
    },
    /// Saving the new resumption token.
    Persisting {
        /// Token being saved.
        next_batch: Cursor,
    },
    /// Waiting before retrying a failed fetch.
    Backoff {
        /// Cursor to retry with.
        since: Cursor,
        /// Consecutive failed fetches.
        attempt: u32,
    },
    /// Terminal.
    Stopped {
        /// Why the loop ended.
        reason: StopReason,
    },
}

impl PollState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: PollEvent) -> (Self, Vec<PollAction>) {
        match (self, event) {
            // Stop wins from any live state
            (Self::Stopped { reason }, _) => (Self::Stopped { reason }, vec![]),
            (_, PollEvent::StopRequested) => stop(StopReason::Requested),

            (Self::Idle, PollEvent::Start { since }) => fetch(since),

            // From Fetching
            (Self::Fetching { since, .. }, PollEvent::FetchSucceeded { next_batch }) => {
                if next_batch.is_initial() {
                    return stop(StopReason::InvalidCursor);
                }
                (
                    Self::Reducing {
                        since: since.clone(),
                        next_batch,
                    },
                    vec![PollAction::Reduce { since }],
                )
            }
            (Self::Fetching { since, attempt }, PollEvent::FetchFailed { decision }) => {
                backoff(since, attempt.saturating_add(1), decision)
            }

            // From Reducing
            (Self::Reducing { next_batch, .. }, PollEvent::Reduced) => (
                Self::Persisting {
                    next_batch: next_batch.clone(),
                },
                vec![PollAction::PersistCursor { cursor: next_batch }],
            ),
            (Self::Reducing { .. }, PollEvent::ReduceFailed { error }) => {
                stop(StopReason::ReduceFailed(error))
            }

            // From Persisting
            (Self::Persisting { next_batch }, PollEvent::Persisted) => fetch(next_batch),

            // From Backoff
            (Self::Backoff { since, attempt }, PollEvent::BackoffElapsed) => (
                Self::Fetching {
                    since: since.clone(),
                    attempt,
                },
                vec![PollAction::Fetch { since, attempt }],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Whether the loop has ended.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }

    /// The cursor the loop would resume from, if it is live.
    pub fn cursor(&self) -> Option<&Cursor> {
        match self {
            Self::Fetching { since, .. } | Self::Backoff { since, .. } => Some(since),
            Self::Reducing { since, .. } => Some(since),
            Self::Persisting { next_batch } => Some(next_batch),
            Self::Idle | Self::Stopped { .. } => None,
        }
    }
}

impl Default for PollState {
    fn default() -> Self {
        Self::new()
    }
}

fn fetch(since: Cursor) -> (PollState, Vec<PollAction>) {
    (
        PollState::Fetching {
            since: since.clone(),
            attempt: 0,
        },
        vec![PollAction::Fetch { since, attempt: 0 }],
    )
}

fn backoff(since: Cursor, attempt: u32, decision: Retry) -> (PollState, Vec<PollAction>) {
    match decision {
        Retry::After(delay) => (
            PollState::Backoff { since, attempt },
            vec![PollAction::Wait { delay }],
        ),
        Retry::Stop { reason } => stop(StopReason::GaveUp(reason)),
    }
}

fn stop(reason: StopReason) -> (PollState, Vec<PollAction>) {
    (
        PollState::Stopped {
            reason: reason.clone(),
        },
        vec![PollAction::Stop { reason }],
    )
}

/// Inputs to the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// Begin syncing from the loaded cursor.
    Start {
        /// Cursor loaded from the store.
        since: Cursor,
    },
    /// The fetch returned a response.
    FetchSucceeded {
        /// The response's next-batch token.
        next_batch: Cursor,
    },
    /// The fetch failed; the failure policy has decided.
    FetchFailed {
        /// Retry or stop.
        decision: Retry,
    },
    /// The response was reduced.
    Reduced,
    /// The reducer returned a fault.
    ReduceFailed {
        /// Error description.
        error: String,
    },
    /// The new cursor has been handed to the store.
    Persisted,
    /// The backoff delay has elapsed.
    BackoffElapsed,
    /// The owner asked the loop to stop.
    StopRequested,
}

/// Actions to be executed by the sync-client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollAction {
    /// Issue a long-poll fetch.
    Fetch {
        /// Cursor to fetch with.
        since: Cursor,
        /// Consecutive failures before this fetch.
        attempt: u32,
    },
    /// Reduce the fetched response.
    Reduce {
        /// Cursor the response was fetched with.
        since: Cursor,
    },
    /// Save the resumption token.
    PersistCursor {
        /// Token to save.
        cursor: Cursor,
    },
    /// Sleep before retrying.
    Wait {
        /// How long to sleep.
        delay: Duration,
    },
    /// End the loop.
    Stop {
        /// Why.
        reason: StopReason,
    },
}

/// Why the poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Stopped by its owner.
    Requested,
    /// The failure policy gave up.
    GaveUp(String),
    /// The reducer faulted.
    ReduceFailed(String),
    /// The server returned an empty next-batch token.
    InvalidCursor,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(token: &str) -> Cursor {
        Cursor::new(token)
    }

    fn fetching(since: &str) -> PollState {
        PollState::Fetching {
            since: c(since),
            attempt: 0,
        }
    }

    #[test]
    fn starts_idle() {
        let state = PollState::new();
        assert!(matches!(state, PollState::Idle));
        assert!(state.cursor().is_none());
    }

    // ===========================================
    // Success Loop Tests
    // ===========================================

    #[test]
    fn start_fetches_with_loaded_cursor() {
        let (state, actions) = PollState::new().on_event(PollEvent::Start { since: c("s1") });

        assert_eq!(state, fetching("s1"));
        assert_eq!(
            actions,
            vec![PollAction::Fetch {
                since: c("s1"),
                attempt: 0
            }]
        );
    }

    #[test]
    fn first_sync_uses_initial_cursor() {
        let (state, _) = PollState::new().on_event(PollEvent::Start {
            since: Cursor::initial(),
        });
        assert_eq!(state.cursor(), Some(&Cursor::initial()));
    }

    #[test]
    fn full_success_cycle() {
        let (state, actions) = fetching("s1").on_event(PollEvent::FetchSucceeded {
            next_batch: c("s2"),
        });
        assert_eq!(actions, vec![PollAction::Reduce { since: c("s1") }]);

        let (state, actions) = state.on_event(PollEvent::Reduced);
        assert_eq!(actions, vec![PollAction::PersistCursor { cursor: c("s2") }]);

        let (state, actions) = state.on_event(PollEvent::Persisted);
        assert_eq!(state, fetching("s2"));
        assert_eq!(
            actions,
            vec![PollAction::Fetch {
                since: c("s2"),
                attempt: 0
            }]
        );
    }

    #[test]
    fn empty_next_batch_stops_loop() {
        let (state, actions) = fetching("s1").on_event(PollEvent::FetchSucceeded {
            next_batch: Cursor::initial(),
        });

        assert!(state.is_stopped());
        assert_eq!(
            actions,
            vec![PollAction::Stop {
                reason: StopReason::InvalidCursor
            }]
        );
    }

    // ===========================================
    // Failure Loop Tests
    // ===========================================

    #[test]
    fn fetch_failure_backs_off_then_retries_same_cursor() {
        let delay = Duration::from_secs(10);
        let (state, actions) = fetching("s1").on_event(PollEvent::FetchFailed {
            decision: Retry::After(delay),
        });
        assert_eq!(
            state,
            PollState::Backoff {
                since: c("s1"),
                attempt: 1
            }
        );
        assert_eq!(actions, vec![PollAction::Wait { delay }]);

        let (state, actions) = state.on_event(PollEvent::BackoffElapsed);
        assert_eq!(
            state,
            PollState::Fetching {
                since: c("s1"),
                attempt: 1
            }
        );
        assert_eq!(
            actions,
            vec![PollAction::Fetch {
                since: c("s1"),
                attempt: 1
            }]
        );
    }

    #[test]
    fn repeated_failures_count_attempts() {
        let mut state = fetching("s1");
        for expected in 1..=3 {
            let (next, _) = state.on_event(PollEvent::FetchFailed {
                decision: Retry::After(Duration::from_secs(1)),
            });
            assert_eq!(
                next,
                PollState::Backoff {
                    since: c("s1"),
                    attempt: expected
                }
            );
            let (next, _) = next.on_event(PollEvent::BackoffElapsed);
            state = next;
        }
    }

    #[test]
    fn success_after_failures_resets_attempts() {
        let failing = PollState::Fetching {
            since: c("s1"),
            attempt: 2,
        };
        let (state, _) = failing.on_event(PollEvent::FetchSucceeded {
            next_batch: c("s2"),
        });
        let (state, _) = state.on_event(PollEvent::Reduced);
        let (state, actions) = state.on_event(PollEvent::Persisted);

        assert_eq!(state, fetching("s2"));
        assert_eq!(
            actions,
            vec![PollAction::Fetch {
                since: c("s2"),
                attempt: 0
            }]
        );
    }

    #[test]
    fn policy_stop_is_terminal() {
        let (state, actions) = fetching("s1").on_event(PollEvent::FetchFailed {
            decision: Retry::Stop {
                reason: "too many".into(),
            },
        });

        assert!(state.is_stopped());
        assert_eq!(
            actions,
            vec![PollAction::Stop {
                reason: StopReason::GaveUp("too many".into())
            }]
        );
    }

    #[test]
    fn reduce_failure_is_terminal_and_skips_persist() {
        let reducing = PollState::Reducing {
            since: c("s1"),
            next_batch: c("s2"),
        };
        let (state, actions) = reducing.on_event(PollEvent::ReduceFailed {
            error: "listener panicked".into(),
        });

        assert!(state.is_stopped());
        assert!(!actions
            .iter()
            .any(|a| matches!(a, PollAction::PersistCursor { .. })));
    }

    // ===========================================
    // Stop Tests
    // ===========================================

    #[test]
    fn stop_request_from_any_live_state() {
        let states = vec![
            PollState::Idle,
            fetching("s1"),
            PollState::Backoff {
                since: c("s1"),
                attempt: 3,
            },
            PollState::Persisting { next_batch: c("s2") },
        ];
        for state in states {
            let (state, actions) = state.on_event(PollEvent::StopRequested);
            assert_eq!(
                state,
                PollState::Stopped {
                    reason: StopReason::Requested
                }
            );
            assert_eq!(
                actions,
                vec![PollAction::Stop {
                    reason: StopReason::Requested
                }]
            );
        }
    }

    #[test]
    fn stopped_ignores_everything() {
        let stopped = PollState::Stopped {
            reason: StopReason::Requested,
        };
        let (state, actions) = stopped.on_event(PollEvent::Start { since: c("s1") });
        assert!(state.is_stopped());
        assert!(actions.is_empty());
    }

    #[test]
    fn invalid_transition_is_ignored() {
        let (state, actions) = PollState::Idle.on_event(PollEvent::Reduced);
        assert_eq!(state, PollState::Idle);
        assert!(actions.is_empty());
    }
}
