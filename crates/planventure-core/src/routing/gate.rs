//! Route gate for protected views.
//!
//! The gate follows the session manager's change feed and maps every
//! snapshot to one of three states:
//!
//! | Session                     | State             | Decision            |
//! |-----------------------------|-------------------|---------------------|
//! | `initializing`              | `Unknown`         | render nothing      |
//! | no access token             | `Unauthenticated` | redirect to login   |
//! | access token present        | `Authenticated`   | render the content  |
//!
//! While the state is unknown the gate neither renders nor redirects, so a
//! reload with a valid stored session never flashes the login page. The
//! originally requested route is not remembered across the redirect.

use tokio::sync::watch;
use tracing::debug;

use super::navigator::{Navigator, LOGIN_ROUTE};
use crate::auth::{Session, SessionManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Unknown,
    Authenticated,
    Unauthenticated,
}

impl GateState {
    pub fn of(session: &Session) -> Self {
        if session.initializing {
            GateState::Unknown
        } else if session.is_authenticated() {
            GateState::Authenticated
        } else {
            GateState::Unauthenticated
        }
    }
}

/// What a protected view should do for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Session not known yet: show nothing (or a neutral placeholder)
    Pending,
    Render,
    Redirect(&'static str),
}

impl From<GateState> for GateDecision {
    fn from(state: GateState) -> Self {
        match state {
            GateState::Unknown => GateDecision::Pending,
            GateState::Authenticated => GateDecision::Render,
            GateState::Unauthenticated => GateDecision::Redirect(LOGIN_ROUTE),
        }
    }
}

/// Outcome of rendering through the gate.
#[derive(Debug, PartialEq, Eq)]
pub enum Gated<T> {
    Pending,
    Rendered(T),
    Redirected(&'static str),
}

impl<T> Gated<T> {
    pub fn into_rendered(self) -> Option<T> {
        match self {
            Gated::Rendered(content) => Some(content),
            _ => None,
        }
    }
}

/// Guard for protected content. Holds nothing but its session subscription.
pub struct RouteGate {
    session: watch::Receiver<Session>,
}

impl RouteGate {
    pub fn new(manager: &SessionManager) -> Self {
        Self {
            session: manager.subscribe(),
        }
    }

    pub fn state(&self) -> GateState {
        GateState::of(&self.session.borrow())
    }

    pub fn decision(&self) -> GateDecision {
        self.state().into()
    }

    /// Render `content` if the session is authenticated.
    ///
    /// Unauthenticated sessions are sent to the login route through
    /// `navigator`; an unknown session produces nothing and navigates
    /// nowhere. `content` runs only when rendering.
    pub fn render<T, F>(&self, navigator: &dyn Navigator, content: F) -> Gated<T>
    where
        F: FnOnce(&Session) -> T,
    {
        // Clone out of the watch guard so `content` cannot hold the lock.
        let session = self.session.borrow().clone();
        match GateDecision::from(GateState::of(&session)) {
            GateDecision::Pending => Gated::Pending,
            GateDecision::Render => Gated::Rendered(content(&session)),
            GateDecision::Redirect(route) => {
                debug!(route, "Protected view requested without a session");
                navigator.navigate(route);
                Gated::Redirected(route)
            }
        }
    }

    /// Wait for the next session change and return the resulting decision.
    /// Returns `None` once the session manager has been dropped.
    pub async fn changed(&mut self) -> Option<GateDecision> {
        self.session.changed().await.ok()?;
        Some(GateState::of(&self.session.borrow_and_update()).into())
    }

    /// Wait until the session has left the initializing state.
    pub async fn settled(&mut self) -> Option<GateDecision> {
        let session = self.session.wait_for(|s| !s.initializing).await.ok()?;
        Some(GateState::of(&session).into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::MemoryStore;
    use crate::models::AuthPayload;
    use crate::routing::History;

    fn login(manager: &SessionManager, token: &str) {
        manager
            .login(&AuthPayload {
                access_token: Some(token.to_string()),
                ..Default::default()
            })
            .unwrap();
    }

    #[test]
    fn test_unknown_renders_nothing_and_does_not_redirect() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        let gate = RouteGate::new(&manager);
        let history = History::new("/trips");

        assert_eq!(gate.state(), GateState::Unknown);
        assert_eq!(gate.decision(), GateDecision::Pending);

        let mut rendered = false;
        let outcome = gate.render(&history, |_| rendered = true);
        assert_eq!(outcome, Gated::Pending);
        assert!(!rendered);
        assert_eq!(history.current(), "/trips");
    }

    #[test]
    fn test_unauthenticated_redirects_to_login() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        manager.initialize();
        let gate = RouteGate::new(&manager);
        let history = History::new("/trips");

        assert_eq!(gate.decision(), GateDecision::Redirect(LOGIN_ROUTE));
        let outcome = gate.render(&history, |_| "trips page");
        assert_eq!(outcome, Gated::Redirected(LOGIN_ROUTE));
        assert_eq!(history.current(), LOGIN_ROUTE);
    }

    #[test]
    fn test_authenticated_renders_content() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        manager.initialize();
        login(&manager, "abc");
        let gate = RouteGate::new(&manager);
        let history = History::new("/trips");

        let outcome = gate.render(&history, |session| session.token().map(str::to_owned));
        assert_eq!(outcome.into_rendered(), Some(Some("abc".to_string())));
        assert_eq!(history.current(), "/trips");
    }

    #[test]
    fn test_gate_follows_session_without_own_state() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        let gate = RouteGate::new(&manager);

        assert_eq!(gate.state(), GateState::Unknown);
        manager.initialize();
        assert_eq!(gate.state(), GateState::Unauthenticated);
        login(&manager, "abc");
        assert_eq!(gate.state(), GateState::Authenticated);
        manager.logout();
        assert_eq!(gate.state(), GateState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_changed_reports_transitions() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        let mut gate = RouteGate::new(&manager);

        manager.initialize();
        assert_eq!(gate.changed().await, Some(GateDecision::Redirect(LOGIN_ROUTE)));

        login(&manager, "abc");
        assert_eq!(gate.changed().await, Some(GateDecision::Render));

        drop(manager);
        assert_eq!(gate.changed().await, None);
    }

    #[tokio::test]
    async fn test_settled_waits_for_initialization() {
        let store = Arc::new(MemoryStore::new());
        login(&SessionManager::new(store.clone()), "stored");

        let manager = Arc::new(SessionManager::new(store));
        let mut gate = RouteGate::new(&manager);

        let init = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager.initialize();
            })
        };

        assert_eq!(gate.settled().await, Some(GateDecision::Render));
        init.await.unwrap();
    }
}
