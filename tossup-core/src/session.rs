use crate::api::ApiClient;
use crate::error::{Result, TossupError};
use crate::storage::{SessionStore, Storage};
use crate::types::User;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

pub const DATABASE_FILE: &str = "tossup.db";

/// Token plus the user it was issued for.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub token: String,
    pub user: User,
}

/// The logged-in state for this client.
///
/// Hydrated from local storage on open, written back on login and cleared
/// on logout or when the server rejects the token.
pub struct Session {
    storage: Arc<Storage>,
    current: RwLock<Option<Identity>>,
}

impl Session {
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let storage = Arc::new(Storage::new(&data_dir.join(DATABASE_FILE)).await?);
        Self::hydrate(storage).await
    }

    pub async fn hydrate(storage: Arc<Storage>) -> Result<Self> {
        let current = {
            let store = SessionStore::new(&storage);
            match (store.load_token().await?, store.load_user().await?) {
                (Some(token), Some(user)) => {
                    tracing::debug!("Restored session for user {}", user.id);
                    Some(Identity { token, user })
                }
                _ => None,
            }
        };

        Ok(Self {
            storage,
            current: RwLock::new(current),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn user(&self) -> Option<User> {
        self.current.read().as_ref().map(|id| id.user.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.current.read().as_ref().map(|id| id.token.clone())
    }

    /// The current identity, or `Unauthenticated` when logged out.
    pub fn require(&self) -> Result<Identity> {
        self.current
            .read()
            .clone()
            .ok_or(TossupError::Unauthenticated)
    }

    pub async fn establish(&self, token: String, user: User) -> Result<()> {
        SessionStore::new(&self.storage).save(&token, &user).await?;
        *self.current.write() = Some(Identity { token, user });
        Ok(())
    }

    pub async fn login(&self, api: &ApiClient, phone: &str, password: &str) -> Result<User> {
        let (token, user) = api.login(phone, password).await?;
        self.establish(token, user.clone()).await?;

        tracing::info!("Logged in as {}", user.phone);
        Ok(user)
    }

    /// Re-read the user from `/auth/me`; a rejected token ends the session.
    pub async fn refresh_user(&self, api: &ApiClient) -> Result<User> {
        let identity = self.require()?;

        match api.me(&identity.token).await {
            Ok(user) => {
                SessionStore::new(&self.storage).save_user(&user).await?;
                self.replace_user(&identity.token, user.clone());
                Ok(user)
            }
            Err(e) => {
                if matches!(e, TossupError::Unauthorized(_)) {
                    if let Err(clear) = self.invalidate().await {
                        tracing::error!("Failed to clear rejected session: {}", clear);
                    }
                }
                Err(e)
            }
        }
    }

    pub async fn set_points(&self, points: i64) -> Result<()> {
        let Some(mut identity) = self.current.read().clone() else {
            return Ok(());
        };
        if identity.user.points == points {
            return Ok(());
        }

        identity.user.points = points;
        SessionStore::new(&self.storage)
            .save_user(&identity.user)
            .await?;
        self.replace_user(&identity.token, identity.user);
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        SessionStore::new(&self.storage).clear().await?;
        *self.current.write() = None;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Drop a session the server no longer accepts.
    pub async fn invalidate(&self) -> Result<()> {
        tracing::warn!("Session token rejected, clearing stored login");
        SessionStore::new(&self.storage).clear().await?;
        *self.current.write() = None;
        Ok(())
    }

    // Only swap if nobody logged in as someone else in the meantime.
    fn replace_user(&self, token: &str, user: User) {
        let mut current = self.current.write();
        if let Some(identity) = current.as_mut() {
            if identity.token == token {
                identity.user = user;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::testing::serve;
    use tempfile::tempdir;

    fn user(points: i64) -> User {
        User {
            id: "u-7".to_string(),
            phone: "9000000007".to_string(),
            points,
            name: Some("Center 7".to_string()),
        }
    }

    #[tokio::test]
    async fn test_session_survives_reopen() {
        let temp_dir = tempdir().unwrap();

        let session = Session::open(temp_dir.path()).await.unwrap();
        assert!(!session.is_authenticated());
        assert!(matches!(session.require(), Err(TossupError::Unauthenticated)));

        session.establish("tok-1".to_string(), user(500)).await.unwrap();
        assert!(session.is_authenticated());
        drop(session);

        let reopened = Session::open(temp_dir.path()).await.unwrap();
        let identity = reopened.require().unwrap();
        assert_eq!(identity.token, "tok-1");
        assert_eq!(identity.user, user(500));
    }

    #[tokio::test]
    async fn test_logout_clears_storage() {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let session = Session::hydrate(storage.clone()).await.unwrap();
        session.establish("tok-2".to_string(), user(10)).await.unwrap();

        session.logout().await.unwrap();
        assert!(session.user().is_none());

        let rehydrated = Session::hydrate(storage).await.unwrap();
        assert!(!rehydrated.is_authenticated());
    }

    #[tokio::test]
    async fn test_set_points_persists() {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let session = Session::hydrate(storage.clone()).await.unwrap();

        // no-op while logged out
        session.set_points(99).await.unwrap();
        assert!(session.user().is_none());

        session.establish("tok-3".to_string(), user(10)).await.unwrap();
        session.set_points(250).await.unwrap();
        assert_eq!(session.user().unwrap().points, 250);

        let rehydrated = Session::hydrate(storage).await.unwrap();
        assert_eq!(rehydrated.user().unwrap().points, 250);
    }

    #[tokio::test]
    async fn test_refresh_user_updates_stored_user() {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let session = Session::hydrate(storage.clone()).await.unwrap();
        session.establish("tok-4".to_string(), user(10)).await.unwrap();

        let body = r#"{"success":true,"data":{"_id":"u-7","phone":"9000000007","points":640}}"#;
        let api = ApiClient::new(&ClientConfig::new(serve(200, body).await)).unwrap();

        let refreshed = session.refresh_user(&api).await.unwrap();
        assert_eq!(refreshed.points, 640);
        assert_eq!(refreshed.name, None);

        let rehydrated = Session::hydrate(storage).await.unwrap();
        assert_eq!(rehydrated.user().unwrap().points, 640);
    }

    #[tokio::test]
    async fn test_refresh_user_rejected_token_logs_out() {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let session = Session::hydrate(storage.clone()).await.unwrap();
        session.establish("tok-5".to_string(), user(10)).await.unwrap();

        let api = ApiClient::new(&ClientConfig::new(serve(401, r#"{"message":"jwt expired"}"#).await))
            .unwrap();

        assert!(matches!(
            session.refresh_user(&api).await,
            Err(TossupError::Unauthorized(_))
        ));
        assert!(!session.is_authenticated());

        let rehydrated = Session::hydrate(storage).await.unwrap();
        assert!(!rehydrated.is_authenticated());
    }
}
