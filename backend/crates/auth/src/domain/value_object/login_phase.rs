//! OAuth login state machine
//!
//! `Start -> AuthorizationRequested -> CallbackReceived -> TokenExchanged ->
//! UserInfoFetched -> SessionEstablished`, with `Failed` reachable from any
//! non-terminal phase.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPhase {
    Start,
    AuthorizationRequested,
    CallbackReceived,
    TokenExchanged,
    UserInfoFetched,
    SessionEstablished,
    Failed,
}

impl LoginPhase {
    pub const fn code(&self) -> &'static str {
        use LoginPhase::*;
        match self {
            Start => "start",
            AuthorizationRequested => "authorization_requested",
            CallbackReceived => "callback_received",
            TokenExchanged => "token_exchanged",
            UserInfoFetched => "user_info_fetched",
            SessionEstablished => "session_established",
            Failed => "failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, LoginPhase::SessionEstablished | LoginPhase::Failed)
    }

    /// The callback arrives in a fresh request, so `CallbackReceived` may
    /// also start a tracked flow.
    pub fn can_advance_to(&self, next: LoginPhase) -> bool {
        use LoginPhase::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Failed)
                | (Start, AuthorizationRequested)
                | (Start, CallbackReceived)
                | (AuthorizationRequested, CallbackReceived)
                | (CallbackReceived, TokenExchanged)
                | (TokenExchanged, UserInfoFetched)
                | (UserInfoFetched, SessionEstablished)
        )
    }
}

impl fmt::Display for LoginPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LoginPhase::*;

    #[test]
    fn test_happy_path() {
        let path = [
            Start,
            AuthorizationRequested,
            CallbackReceived,
            TokenExchanged,
            UserInfoFetched,
            SessionEstablished,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_no_skipping_and_terminal_states() {
        assert!(!CallbackReceived.can_advance_to(UserInfoFetched));
        assert!(!Start.can_advance_to(SessionEstablished));
        assert!(TokenExchanged.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Start));
        assert!(!SessionEstablished.can_advance_to(Failed));
    }
}
