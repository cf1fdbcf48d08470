use tokio::sync::watch;
use tracing::debug;

/// Route of the login page, where every forced redirect lands
pub const LOGIN_ROUTE: &str = "/login";

/// Moves the active view to another route.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// In-process navigation history: holds the current location and
/// publishes every change.
pub struct History {
    location: watch::Sender<String>,
}

impl History {
    pub fn new(initial: &str) -> Self {
        let (location, _) = watch::channel(initial.to_string());
        Self { location }
    }

    pub fn current(&self) -> String {
        self.location.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.location.subscribe()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for History {
    fn navigate(&self, route: &str) {
        let changed = self.location.send_if_modified(|current| {
            if current == route {
                false
            } else {
                *current = route.to_string();
                true
            }
        });
        if changed {
            debug!(route, "Navigated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_tracks_location() {
        let history = History::default();
        assert_eq!(history.current(), "/");

        let mut rx = history.subscribe();
        history.navigate("/trips");
        assert_eq!(history.current(), "/trips");
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), "/trips");

        history.navigate("/trips");
        assert!(!rx.has_changed().unwrap());
    }
}
