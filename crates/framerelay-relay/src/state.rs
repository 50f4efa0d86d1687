//! Component lifecycles.
//!
//! Each component walks an explicit state machine. Every allowed step is
//! listed in its `can_transition_to`; anything else is rejected by
//! [`advance`] rather than silently taken.

use std::fmt::Debug;

use tracing::debug;

use crate::error::{RelayError, Result};

/// A state machine whose legal transitions are enumerable.
pub trait Lifecycle: Copy + Debug + PartialEq {
    /// Component name used in diagnostics.
    const COMPONENT: &'static str;

    /// Whether `self -> next` is an allowed step.
    fn can_transition_to(self, next: Self) -> bool;
}

/// Move `current` to `next` if the lifecycle allows it.
pub fn advance<S: Lifecycle>(current: &mut S, next: S) -> Result<()> {
    if !current.can_transition_to(next) {
        return Err(RelayError::InvalidTransition {
            from: format!("{}::{:?}", S::COMPONENT, current),
            to: format!("{}::{:?}", S::COMPONENT, next),
        });
    }
    debug!(component = S::COMPONENT, from = ?current, to = ?next, "state transition");
    *current = next;
    Ok(())
}

/// Relay client lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connecting,
    Relaying,
    Closed,
}

impl Lifecycle for ClientState {
    const COMPONENT: &'static str = "client";

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (ClientState::Connecting, ClientState::Relaying)
                | (ClientState::Connecting, ClientState::Closed)
                | (ClientState::Relaying, ClientState::Closed)
        )
    }
}

/// Bridge lifecycle.
///
/// `Listening -> AwaitingPeer -> Launching -> Relaying -> Draining -> Closed`,
/// with early exits to `Closed` when accept or launch fails, and a direct
/// `Launching -> Draining` when shutdown is requested before relaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Listening,
    AwaitingPeer,
    Launching,
    Relaying,
    Draining,
    Closed,
}

impl Lifecycle for BridgeState {
    const COMPONENT: &'static str = "bridge";

    fn can_transition_to(self, next: Self) -> bool {
        use BridgeState::*;
        matches!(
            (self, next),
            (Listening, AwaitingPeer)
                | (AwaitingPeer, Launching)
                | (AwaitingPeer, Closed)
                | (Launching, Relaying)
                | (Launching, Closed)
                | (Launching, Draining)
                | (Relaying, Draining)
                | (Draining, Closed)
        )
    }
}
