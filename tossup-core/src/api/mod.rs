pub mod wire;

pub use wire::EntrySubmission;

use crate::config::ClientConfig;
use crate::error::{Result, TossupError};
use crate::types::{Game, User};
use reqwest::{header, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use wire::{AddEntriesRequest, Envelope, GameDto, GameList, LoginRequest, LoginResponse};

/// Thin typed wrapper over the backend's REST endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let base = Url::parse(&config.api_base_url)
            .map_err(|e| TossupError::config(format!("Invalid API base URL: {}", e)))?;

        let mut builder = reqwest::Client::builder().timeout(config.request_timeout);
        // A backend on this machine is reached directly, not through HTTP_PROXY.
        if is_loopback(&base) {
            builder = builder.no_proxy();
        }
        let http = builder
            .build()
            .map_err(|e| TossupError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TossupError::config("API base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send and map transport failures and error statuses onto `TossupError`.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    trimmed.chars().take(200).collect()
                }
            });

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(TossupError::Unauthorized(message))
            }
            _ => Err(TossupError::Http {
                status: status.as_u16(),
                message,
            }),
        }
    }

    fn authed(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    pub async fn list_games(&self, token: Option<&str>) -> Result<Vec<Game>> {
        let url = self.endpoint(&["api", "get-all-games"])?;
        let response = self.send(Self::authed(self.http.get(url), token)).await?;
        let list: GameList = response.json().await?;
        list.into_games()
    }

    /// Games the given user has staked in.
    pub async fn user_games(&self, token: &str, user_id: &str) -> Result<Vec<Game>> {
        let url = self.endpoint(&["api", "get-all-games", user_id])?;
        let response = self.send(Self::authed(self.http.get(url), Some(token))).await?;
        let list: GameList = response.json().await?;
        list.into_games()
    }

    pub async fn get_game(&self, game_id: &str) -> Result<Game> {
        let url = self.endpoint(&["api", "get-game", game_id])?;
        let response = match self.send(self.http.get(url)).await {
            Err(TossupError::Http { status: 404, .. }) => {
                return Err(TossupError::GameNotFound {
                    id: game_id.to_string(),
                })
            }
            other => other?,
        };

        let envelope: Envelope<GameDto> = response.json().await?;
        Game::try_from(envelope.into_data("Fetching game")?)
    }

    pub async fn add_entries(
        &self,
        token: &str,
        game_id: &str,
        entries: &[EntrySubmission],
    ) -> Result<()> {
        let url = self.endpoint(&["api", "add-entries"])?;
        let body = AddEntriesRequest { game_id, entries };
        let response = self
            .send(Self::authed(self.http.post(url).json(&body), Some(token)))
            .await?;

        let envelope: Envelope<Value> = response.json().await?;
        if !envelope.success {
            return Err(TossupError::rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "Submitting entries failed".to_string()),
            ));
        }

        tracing::debug!("Submitted {} entries to game {}", entries.len(), game_id);
        Ok(())
    }

    pub async fn points(&self, center_id: &str) -> Result<i64> {
        let url = self.endpoint(&["api", "get-points", center_id])?;
        let response = self.send(self.http.get(url)).await?;
        let envelope: Envelope<Value> = response.json().await?;
        let value = envelope.into_data("Fetching points")?;

        wire::points_from_value(&value)
            .ok_or_else(|| TossupError::invalid_response(format!("points value {}", value)))
    }

    pub async fn login(&self, phone: &str, password: &str) -> Result<(String, User)> {
        let url = self.endpoint(&["api", "auth", "login"])?;
        let body = LoginRequest { phone, password };

        // Bad credentials come back as 4xx with a JSON message.
        let response = match self.send(self.http.post(url).json(&body)).await {
            Err(TossupError::Unauthorized(message)) => return Err(TossupError::rejected(message)),
            Err(TossupError::Http { status, message }) if (400..500).contains(&status) => {
                return Err(TossupError::rejected(message))
            }
            other => other?,
        };

        let login: LoginResponse = response.json().await?;
        if !login.success {
            return Err(TossupError::rejected(
                login.message.unwrap_or_else(|| "Login failed".to_string()),
            ));
        }

        match (login.token, login.user) {
            (Some(token), Some(user)) if !token.is_empty() => Ok((token, user)),
            _ => Err(TossupError::invalid_response(
                "login succeeded without token or user",
            )),
        }
    }

    pub async fn me(&self, token: &str) -> Result<User> {
        let url = self.endpoint(&["api", "auth", "me"])?;
        let response = self.send(Self::authed(self.http.get(url), Some(token))).await?;
        let envelope: Envelope<User> = response.json().await?;
        envelope.into_data("Refreshing user")
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .map_or(false, |ip| ip.is_loopback()),
        None => false,
    }
}
