use tracing::{debug, warn};

use crate::models::UserProfile;

/// The client's belief about the current authentication state.
///
/// `Unknown` exists only between process start and the first restore attempt;
/// once the machine leaves it, it never returns for the life of the process.
/// Authentication is a property of the variant, never a separately stored
/// flag, so it cannot drift out of sync with the token and user.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unknown,
    Authenticated { user: UserProfile, token: String },
    Unauthenticated,
}

/// The closed set of session transitions. All are pure; I/O lives in the
/// coordinator.
#[derive(Debug, Clone)]
pub enum Transition {
    SetLoading(bool),
    LoginSuccess { user: UserProfile, token: String },
    /// Same effect as `LoginSuccess`; the distinct name records that the
    /// credential came from the store rather than a fresh login.
    RestoreSession { user: UserProfile, token: String },
    Logout,
    UpdateUser(UserProfile),
}

/// Reducer-style session holder.
///
/// A new session starts loading in `Unknown` and resolves to exactly one of
/// `Authenticated`/`Unauthenticated` when the first restore completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    state: SessionState,
    loading: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unknown,
            loading: true,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { token, .. } => Some(token),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match &self.state {
            SessionState::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }

    /// Apply a transition. No transition produces `Unknown`, so the machine
    /// cannot re-enter it after the first resolution.
    pub fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::SetLoading(loading) => {
                self.loading = loading;
            }
            Transition::LoginSuccess { user, token } => {
                debug!(transition = "login_success", user_id = user.id, "Session transition");
                self.state = SessionState::Authenticated { user, token };
                self.loading = false;
            }
            Transition::RestoreSession { user, token } => {
                debug!(transition = "restore_session", user_id = user.id, "Session transition");
                self.state = SessionState::Authenticated { user, token };
                self.loading = false;
            }
            Transition::Logout => {
                debug!(transition = "logout", "Session transition");
                self.state = SessionState::Unauthenticated;
                self.loading = false;
            }
            Transition::UpdateUser(user) => {
                if let SessionState::Authenticated { user: current, .. } = &mut self.state {
                    *current = user;
                } else {
                    warn!(user_id = user.id, "Ignoring user update outside an authenticated session");
                }
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: i64) -> UserProfile {
        UserProfile {
            id,
            username: format!("user{}", id),
            name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            avatar_url: None,
            points: None,
            created_at: None,
        }
    }

    #[test]
    fn new_session_is_unknown_and_loading() {
        let session = Session::new();
        assert_eq!(*session.state(), SessionState::Unknown);
        assert!(session.is_loading());
        assert!(!session.is_authenticated());
        assert_eq!(session.token(), None);
        assert_eq!(session.user(), None);
    }

    #[test]
    fn set_loading_toggles_only_loading() {
        let mut session = Session::new();
        session.apply(Transition::SetLoading(false));
        assert!(!session.is_loading());
        assert_eq!(*session.state(), SessionState::Unknown);
    }

    #[test]
    fn login_success_authenticates_and_stops_loading() {
        let mut session = Session::new();
        session.apply(Transition::LoginSuccess {
            user: profile(1),
            token: "abc".to_string(),
        });
        assert!(session.is_authenticated());
        assert!(!session.is_loading());
        assert_eq!(session.token(), Some("abc"));
        assert_eq!(session.user().map(|u| u.id), Some(1));
    }

    #[test]
    fn restore_session_has_same_effect_as_login_success() {
        let mut restored = Session::new();
        restored.apply(Transition::RestoreSession {
            user: profile(1),
            token: "abc".to_string(),
        });

        let mut logged_in = Session::new();
        logged_in.apply(Transition::LoginSuccess {
            user: profile(1),
            token: "abc".to_string(),
        });

        assert_eq!(restored, logged_in);
    }

    #[test]
    fn logout_clears_user_and_token() {
        let mut session = Session::new();
        session.apply(Transition::LoginSuccess {
            user: profile(1),
            token: "abc".to_string(),
        });
        session.apply(Transition::Logout);
        assert_eq!(*session.state(), SessionState::Unauthenticated);
        assert!(!session.is_authenticated());
        assert!(!session.is_loading());
        assert_eq!(session.token(), None);
    }

    #[test]
    fn logout_from_unknown_resolves_to_unauthenticated() {
        let mut session = Session::new();
        session.apply(Transition::Logout);
        assert_eq!(*session.state(), SessionState::Unauthenticated);
        assert!(!session.is_loading());
    }

    #[test]
    fn update_user_replaces_user_without_touching_token() {
        let mut session = Session::new();
        session.apply(Transition::LoginSuccess {
            user: profile(1),
            token: "abc".to_string(),
        });

        let mut renamed = profile(1);
        renamed.name = "Renamed".to_string();
        session.apply(Transition::UpdateUser(renamed));

        assert!(session.is_authenticated());
        assert_eq!(session.token(), Some("abc"));
        assert_eq!(session.user().map(|u| u.name.as_str()), Some("Renamed"));
    }

    #[test]
    fn update_user_is_ignored_when_unauthenticated() {
        let mut session = Session::new();
        session.apply(Transition::Logout);
        session.apply(Transition::UpdateUser(profile(1)));
        assert_eq!(*session.state(), SessionState::Unauthenticated);
        assert_eq!(session.user(), None);
    }
}
