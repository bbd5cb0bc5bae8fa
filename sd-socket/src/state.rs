//! Connection lifecycle of a room session.

/// Lifecycle state of one room session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never connected.
    Idle,
    /// A transport open attempt is in flight.
    Connecting,
    /// Connected; keep-alive probes are running.
    Open,
    /// A caller-requested close is in progress.
    Closing,
    /// Closed at the caller's request. No retry.
    ClosedClean,
    /// Closed unexpectedly; a retry is scheduled.
    ClosedRetrying,
    /// Closed unexpectedly and the retry budget is spent.
    ClosedExhausted,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Idle, ClosedClean)
                | (Connecting, Open)
                | (Connecting, ClosedRetrying)
                | (Connecting, ClosedExhausted)
                | (Connecting, Closing)
                | (Open, Closing)
                | (Open, ClosedRetrying)
                | (Open, ClosedExhausted)
                | (Closing, ClosedClean)
                | (ClosedRetrying, Connecting)
                | (ClosedRetrying, ClosedClean)
                | (ClosedExhausted, Connecting)
                | (ClosedExhausted, ClosedClean)
                | (ClosedClean, Connecting)
        )
    }

    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }

    /// No automatic activity will happen from this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionState::ClosedClean | ConnectionState::ClosedExhausted
        )
    }

    /// Whether a keep-alive timer must be running in this state.
    pub fn wants_keepalive(self) -> bool {
        self == ConnectionState::Open
    }

    /// Whether a retry timer must be pending in this state.
    pub fn wants_retry_timer(self) -> bool {
        self == ConnectionState::ClosedRetrying
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::ClosedClean => "closed_clean",
            Self::ClosedRetrying => "closed_retrying",
            Self::ClosedExhausted => "closed_exhausted",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    const ALL: [ConnectionState; 7] = [
        Idle,
        Connecting,
        Open,
        Closing,
        ClosedClean,
        ClosedRetrying,
        ClosedExhausted,
    ];

    #[test]
    fn test_happy_path_is_legal() {
        assert!(Idle.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Open));
        assert!(Open.can_transition_to(ClosedRetrying));
        assert!(ClosedRetrying.can_transition_to(Connecting));
        assert!(Open.can_transition_to(Closing));
        assert!(Closing.can_transition_to(ClosedClean));
    }

    #[test]
    fn test_illegal_moves_are_rejected() {
        assert!(!Idle.can_transition_to(Open));
        assert!(!ClosedClean.can_transition_to(ClosedRetrying));
        assert!(!ClosedRetrying.can_transition_to(Open));
        assert!(!Closing.can_transition_to(Open));
        assert!(!ClosedExhausted.can_transition_to(ClosedRetrying));
    }

    #[test]
    fn test_no_self_transitions() {
        for state in ALL {
            assert!(!state.can_transition_to(state), "{state} -> {state}");
        }
    }

    #[test]
    fn test_every_state_can_reach_closed_clean() {
        // Directly, or through Closing.
        for state in ALL {
            let reachable = state == ClosedClean
                || state.can_transition_to(ClosedClean)
                || (state.can_transition_to(Closing) && Closing.can_transition_to(ClosedClean));
            assert!(reachable, "{state} cannot be disconnected");
        }
    }

    #[test]
    fn test_timer_requirements_are_exclusive() {
        for state in ALL {
            assert!(!(state.wants_keepalive() && state.wants_retry_timer()));
        }
        assert!(Open.wants_keepalive());
        assert!(ClosedRetrying.wants_retry_timer());
    }

    #[test]
    fn test_display() {
        assert_eq!(Open.to_string(), "open");
        assert_eq!(ClosedExhausted.to_string(), "closed_exhausted");
        assert!(ClosedClean.is_terminal());
        assert!(!ClosedRetrying.is_terminal());
    }
}
