// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Channel state machine with typed state transitions.
//!
//! Implements the channel lifecycle: Unopened → NegotiatingRole → Bound → Closed.
//! Invalid transitions result in StateTransitionError.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::StateTransitionError;
use crate::types::ChannelName;

/// Channel lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    /// Created but the region has not been mapped.
    Unopened,

    /// Region mapped, role flags being inspected and claimed.
    NegotiatingRole,

    /// Role claimed and rings bound; messages can flow.
    Bound,

    /// Role released (or never obtained). Terminal.
    Closed,
}

impl ChannelState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unopened => "Unopened",
            Self::NegotiatingRole => "NegotiatingRole",
            Self::Bound => "Bound",
            Self::Closed => "Closed",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: ChannelState) -> bool {
        matches!(
            (self, target),
            (Self::Unopened, Self::NegotiatingRole) |
            (Self::Unopened, Self::Closed) |
            // Negotiation either binds or fails for good
            (Self::NegotiatingRole, Self::Bound) |
            (Self::NegotiatingRole, Self::Closed) |
            (Self::Bound, Self::Closed)
        )
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State machine for a channel's lifecycle.
#[derive(Debug)]
pub struct ChannelStateMachine {
    channel: ChannelName,
    current_state: ChannelState,
    last_transition: Instant,
}

impl ChannelStateMachine {
    /// Create a new state machine for a channel.
    pub fn new(channel: ChannelName) -> Self {
        Self {
            channel,
            current_state: ChannelState::Unopened,
            last_transition: Instant::now(),
        }
    }

    /// Get the current state.
    pub fn state(&self) -> ChannelState {
        self.current_state
    }

    /// Get time since last transition.
    pub fn time_in_current_state(&self) -> std::time::Duration {
        self.last_transition.elapsed()
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: ChannelState) -> Result<(), StateTransitionError> {
        if !self.current_state.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                channel: self.channel.to_string(),
                from: self.current_state.name(),
                to: target.name(),
            });
        }

        tracing::debug!(
            channel = %self.channel,
            from = self.current_state.name(),
            to = target.name(),
            "Channel state transition"
        );

        self.current_state = target;
        self.last_transition = Instant::now();

        Ok(())
    }

    /// Whether messages can be sent and received.
    pub fn is_bound(&self) -> bool {
        self.current_state == ChannelState::Bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> ChannelStateMachine {
        ChannelStateMachine::new(ChannelName::new("state-test").unwrap())
    }

    #[test]
    fn test_valid_lifecycle() {
        let mut sm = machine();
        assert_eq!(sm.state(), ChannelState::Unopened);
        sm.transition_to(ChannelState::NegotiatingRole).unwrap();
        sm.transition_to(ChannelState::Bound).unwrap();
        assert!(sm.is_bound());
        sm.transition_to(ChannelState::Closed).unwrap();
        assert!(!sm.is_bound());
    }

    #[test]
    fn test_cannot_skip_negotiation() {
        let mut sm = machine();
        assert!(sm.transition_to(ChannelState::Bound).is_err());
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut sm = machine();
        sm.transition_to(ChannelState::Closed).unwrap();
        for target in [
            ChannelState::Unopened,
            ChannelState::NegotiatingRole,
            ChannelState::Bound,
            ChannelState::Closed,
        ] {
            assert!(sm.transition_to(target).is_err());
        }
    }
}
