//! Per-session authentication flow state.
//!
//! The state lives in the session under [`STATE_ATTRIBUTE`]. An absent
//! attribute is the same as `EMPTY`; the gate writes `EMPTY` explicitly the
//! first time it touches a session.
//!
//! ```text
//! EMPTY ──ProviderRequestSent──▶ AWAITING_PROVIDER ──CallbackProcessed──▶ FINISHED
//!   ▲                                   │
//!   └─────────CallbackRejected──────────┘
//! ```
//!
//! `FINISHED` is terminal for the session's lifetime.

use std::fmt;

/// Session attribute holding the flow state.
pub const STATE_ATTRIBUTE: &str = "STATE";

/// Where a session is in the authentication flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowState {
    /// No authentication attempt is in progress.
    Empty,
    /// The browser was redirected to the provider; a callback is expected.
    AwaitingProvider,
    /// The identity is established.
    Finished,
}

/// Something that happened to a session's flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowEvent {
    /// The gate saw the session for the first time without an identity.
    NoIdentityYet,
    /// The browser was sent to the provider.
    ProviderRequestSent,
    /// The provider callback produced an identity.
    CallbackProcessed,
    /// The provider callback failed verification.
    CallbackRejected,
}

impl FlowState {
    /// Returns the stored form of this state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::AwaitingProvider => "AWAITING_PROVIDER",
            Self::Finished => "FINISHED",
        }
    }

    /// Returns the state after `event`, or `None` if the event is not
    /// allowed from this state.
    ///
    /// A second `CallbackProcessed` on a finished session is allowed and
    /// changes nothing, so concurrent callbacks cannot move a session out
    /// of `Finished`.
    #[must_use]
    pub const fn next(self, event: FlowEvent) -> Option<Self> {
        match (self, event) {
            (Self::Empty, FlowEvent::NoIdentityYet) => Some(Self::Empty),
            (Self::Empty, FlowEvent::ProviderRequestSent) => Some(Self::AwaitingProvider),
            (Self::AwaitingProvider, FlowEvent::CallbackProcessed) => Some(Self::Finished),
            (Self::AwaitingProvider, FlowEvent::CallbackRejected) => Some(Self::Empty),
            (Self::Finished, FlowEvent::CallbackProcessed) => Some(Self::Finished),
            _ => None,
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A flow state as read back from the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredState {
    /// One of the known states.
    Known(FlowState),
    /// Something else wrote the attribute.
    Unrecognized(String),
}

impl StoredState {
    /// Interprets a raw session attribute value.
    #[must_use]
    pub fn from_attribute(value: Option<&str>) -> Self {
        match value {
            None | Some("") | Some("EMPTY") => Self::Known(FlowState::Empty),
            Some("AWAITING_PROVIDER") => Self::Known(FlowState::AwaitingProvider),
            Some("FINISHED") => Self::Known(FlowState::Finished),
            Some(other) => Self::Unrecognized(other.to_string()),
        }
    }

    /// Returns the known state, if any.
    #[must_use]
    pub fn known(&self) -> Option<FlowState> {
        match self {
            Self::Known(state) => Some(*state),
            Self::Unrecognized(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_moves_to_awaiting_on_request_sent() {
        assert_eq!(
            FlowState::Empty.next(FlowEvent::ProviderRequestSent),
            Some(FlowState::AwaitingProvider)
        );
        assert_eq!(
            FlowState::Empty.next(FlowEvent::NoIdentityYet),
            Some(FlowState::Empty)
        );
    }

    #[test]
    fn awaiting_moves_to_finished_or_back_to_empty() {
        assert_eq!(
            FlowState::AwaitingProvider.next(FlowEvent::CallbackProcessed),
            Some(FlowState::Finished)
        );
        assert_eq!(
            FlowState::AwaitingProvider.next(FlowEvent::CallbackRejected),
            Some(FlowState::Empty)
        );
        assert_eq!(
            FlowState::AwaitingProvider.next(FlowEvent::ProviderRequestSent),
            None
        );
    }

    #[test]
    fn finished_is_terminal() {
        assert_eq!(
            FlowState::Finished.next(FlowEvent::CallbackProcessed),
            Some(FlowState::Finished)
        );
        assert_eq!(FlowState::Finished.next(FlowEvent::CallbackRejected), None);
        assert_eq!(FlowState::Finished.next(FlowEvent::ProviderRequestSent), None);
        assert_eq!(FlowState::Finished.next(FlowEvent::NoIdentityYet), None);
    }

    #[test]
    fn empty_cannot_skip_to_finished() {
        assert_eq!(FlowState::Empty.next(FlowEvent::CallbackProcessed), None);
    }

    #[test]
    fn stored_state_parses_attribute_values() {
        assert_eq!(
            StoredState::from_attribute(None),
            StoredState::Known(FlowState::Empty)
        );
        assert_eq!(
            StoredState::from_attribute(Some("")),
            StoredState::Known(FlowState::Empty)
        );
        for state in [
            FlowState::Empty,
            FlowState::AwaitingProvider,
            FlowState::Finished,
        ] {
            assert_eq!(
                StoredState::from_attribute(Some(state.as_str())),
                StoredState::Known(state)
            );
        }
        assert_eq!(
            StoredState::from_attribute(Some("AUTH")),
            StoredState::Unrecognized("AUTH".to_string())
        );
        assert_eq!(StoredState::from_attribute(Some("AUTH")).known(), None);
    }

    mod proptest_flow {
        use super::*;
        use proptest::prelude::*;

        fn event_strategy() -> impl Strategy<Value = FlowEvent> {
            prop_oneof![
                Just(FlowEvent::NoIdentityYet),
                Just(FlowEvent::ProviderRequestSent),
                Just(FlowEvent::CallbackProcessed),
                Just(FlowEvent::CallbackRejected),
            ]
        }

        proptest! {
            /// Finished is only entered from AwaitingProvider and never left
            #[test]
            fn finished_is_reached_only_through_a_callback(
                events in prop::collection::vec(event_strategy(), 0..64)
            ) {
                let mut state = FlowState::Empty;
                for event in events {
                    let Some(next) = state.next(event) else {
                        continue;
                    };
                    if next == FlowState::Finished {
                        prop_assert!(
                            matches!(state, FlowState::AwaitingProvider | FlowState::Finished)
                        );
                    }
                    if state == FlowState::Finished {
                        prop_assert_eq!(next, FlowState::Finished);
                    }
                    state = next;
                }
            }
        }
    }
}
