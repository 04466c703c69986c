use crate::database::KeyValueStorage;
use crate::error::AppError;
use std::sync::Arc;
use tokio::sync::watch;

/// Storage key of the persisted bearer token
pub const AUTH_STORAGE_KEY: &str = "propflow-auth";

/// Authentication session: the current bearer token, observable through a
/// watch channel so the live channel and API client follow login/logout.
pub struct Session {
    storage: Arc<dyn KeyValueStorage>,
    token: watch::Sender<Option<String>>,
}

impl Session {
    /// Restores the session from storage; an unreadable entry means logged out
    pub fn restore(storage: Arc<dyn KeyValueStorage>) -> Self {
        let token = match storage.get(AUTH_STORAGE_KEY) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                log::warn!("Could not read stored session: {}", e);
                None
            }
        };
        if token.is_some() {
            log::info!("Restored authenticated session");
        }
        let (tx, _rx) = watch::channel(token);
        Self { storage, token: tx }
    }

    pub fn login(&self, token: impl Into<String>) -> Result<(), AppError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(AppError::Validation("Token must not be empty".to_string()));
        }
        self.storage.set(AUTH_STORAGE_KEY, &token)?;
        self.token.send_replace(Some(token));
        log::info!("Logged in");
        Ok(())
    }

    /// Clears the token in memory even if the stored copy cannot be removed
    pub fn logout(&self) -> Result<(), AppError> {
        self.token.send_replace(None);
        log::info!("Logged out");
        self.storage.remove(AUTH_STORAGE_KEY)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.token.subscribe()
    }

    /// Token getter for [`property_api::HttpPropertyApi::new`]
    pub fn token_provider(&self) -> impl Fn() -> Option<String> + Send + Sync + 'static {
        let rx = self.token.subscribe();
        move || rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteStorage;

    fn storage() -> Arc<dyn KeyValueStorage> {
        Arc::new(SqliteStorage::open_in_memory().unwrap())
    }

    #[test]
    fn test_login_persists_and_restores() {
        let storage = storage();
        let session = Session::restore(storage.clone());
        assert!(!session.is_authenticated());

        session.login("tok-1").unwrap();
        let restored = Session::restore(storage);
        assert!(restored.is_authenticated());
        assert_eq!(restored.subscribe().borrow().as_deref(), Some("tok-1"));
        assert_eq!(restored.token_provider()().as_deref(), Some("tok-1"));
    }

    #[test]
    fn test_logout_notifies_subscribers() {
        let session = Session::restore(storage());
        session.login("tok-1").unwrap();
        let mut rx = session.subscribe();
        let provider = session.token_provider();
        assert_eq!(provider().as_deref(), Some("tok-1"));

        session.logout().unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), None);
        assert_eq!(provider(), None);
    }

    #[test]
    fn test_empty_token_rejected() {
        let session = Session::restore(storage());
        assert!(matches!(session.login("  "), Err(AppError::Validation(_))));
        assert!(!session.is_authenticated());
    }
}
