use crate::api::{ApiClient, EntrySubmission};
use crate::error::{Result, TossupError};
use crate::session::Session;
use crate::types::Game;
use async_trait::async_trait;
use std::sync::Arc;

/// The remote calls the game lifecycle depends on.
#[async_trait]
pub trait GameBackend: Send + Sync {
    async fn list_games(&self) -> Result<Vec<Game>>;

    async fn get_game(&self, game_id: &str) -> Result<Game>;

    /// Must not be retried by the caller once it has returned `Ok`.
    async fn submit_entries(&self, game_id: &str, entries: &[EntrySubmission]) -> Result<()>;

    async fn points(&self, center_id: &str) -> Result<i64>;

    async fn user_games(&self, user_id: &str) -> Result<Vec<Game>>;
}

/// `GameBackend` over HTTP, authenticating with the injected session.
pub struct HttpBackend {
    api: ApiClient,
    session: Arc<Session>,
}

impl HttpBackend {
    pub fn new(api: ApiClient, session: Arc<Session>) -> Self {
        Self { api, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// A rejected token ends the session; the caller still sees the rejection.
    async fn guard<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(TossupError::Unauthorized(_)) = &result {
            if let Err(e) = self.session.invalidate().await {
                tracing::error!("Failed to clear rejected session: {}", e);
            }
        }
        result
    }
}

#[async_trait]
impl GameBackend for HttpBackend {
    async fn list_games(&self) -> Result<Vec<Game>> {
        let token = self.session.token();
        let result = self.api.list_games(token.as_deref()).await;
        self.guard(result).await
    }

    async fn get_game(&self, game_id: &str) -> Result<Game> {
        self.api.get_game(game_id).await
    }

    async fn submit_entries(&self, game_id: &str, entries: &[EntrySubmission]) -> Result<()> {
        let identity = self.session.require()?;
        let result = self.api.add_entries(&identity.token, game_id, entries).await;
        self.guard(result).await
    }

    async fn points(&self, center_id: &str) -> Result<i64> {
        let points = self.api.points(center_id).await?;

        let is_own = self
            .session
            .user()
            .map_or(false, |user| user.id == center_id);
        if is_own {
            self.session.set_points(points).await?;
        }

        Ok(points)
    }

    async fn user_games(&self, user_id: &str) -> Result<Vec<Game>> {
        let identity = self.session.require()?;
        let result = self.api.user_games(&identity.token, user_id).await;
        self.guard(result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::storage::Storage;
    use crate::testing::serve;
    use crate::types::{CoinSide, User};

    async fn logged_in(status: u16, body: &str) -> (HttpBackend, Arc<Storage>) {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let session = Arc::new(Session::hydrate(storage.clone()).await.unwrap());
        let user = User {
            id: "u1".to_string(),
            phone: "9000000001".to_string(),
            points: 1000,
            name: None,
        };
        session.establish("tok-u1".to_string(), user).await.unwrap();

        let api = ApiClient::new(&ClientConfig::new(serve(status, body).await)).unwrap();
        (HttpBackend::new(api, session), storage)
    }

    async fn assert_logged_out(backend: &HttpBackend, storage: Arc<Storage>) {
        assert!(!backend.session().is_authenticated());
        let rehydrated = Session::hydrate(storage).await.unwrap();
        assert!(!rehydrated.is_authenticated());
    }

    #[tokio::test]
    async fn test_rejected_submission_ends_session() {
        let (backend, storage) = logged_in(401, r#"{"message":"invalid token"}"#).await;
        let entries = vec![EntrySubmission::new("#1001", "u1", CoinSide::Tails, 50)];

        assert!(matches!(
            backend.submit_entries("g1", &entries).await,
            Err(TossupError::Unauthorized(_))
        ));
        assert_logged_out(&backend, storage).await;

        // later calls fail locally
        assert!(matches!(
            backend.submit_entries("g1", &entries).await,
            Err(TossupError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_rejected_history_ends_session() {
        let (backend, storage) = logged_in(401, "").await;

        assert!(matches!(
            backend.user_games("u1").await,
            Err(TossupError::Unauthorized(_))
        ));
        assert_logged_out(&backend, storage).await;
    }

    #[tokio::test]
    async fn test_server_errors_keep_session() {
        let (backend, storage) = logged_in(503, "down for maintenance").await;

        assert!(matches!(
            backend.user_games("u1").await,
            Err(TossupError::Http { status: 503, .. })
        ));
        assert!(backend.session().is_authenticated());
        let rehydrated = Session::hydrate(storage).await.unwrap();
        assert_eq!(rehydrated.token().as_deref(), Some("tok-u1"));
    }

    #[tokio::test]
    async fn test_own_points_are_persisted() {
        let (backend, storage) = logged_in(200, r#"{"success":true,"data":{"points":1250}}"#).await;

        assert_eq!(backend.points("u1").await.unwrap(), 1250);
        assert_eq!(backend.session().user().unwrap().points, 1250);
        let rehydrated = Session::hydrate(storage).await.unwrap();
        assert_eq!(rehydrated.user().unwrap().points, 1250);
    }
}
