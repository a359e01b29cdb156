//! High-level GestMantIA client

use std::sync::Arc;

use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::auth::{InMemoryTokenStore, TokenPair, TokenStore};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
    ResetPasswordRequest, SuccessResponse, UserResponse,
};
use crate::roles::RolesApi;
use crate::users::UsersApi;

/// GestMantIA API client
///
/// Attaches the stored access token to every request. When the API answers
/// 401 the client renews the token pair once with the stored refresh token
/// and replays the request.
#[derive(Clone)]
pub struct Client {
    config: Arc<Config>,
    http_client: reqwest::Client,
    tokens: Arc<dyn TokenStore>,
    refresh_lock: Arc<Mutex<()>>,
}

impl Client {
    /// Create a client that keeps its tokens in memory
    pub fn new(config: Config) -> Result<Self> {
        Self::with_token_store(config, Arc::new(InMemoryTokenStore::new()))
    }

    pub fn with_token_store(config: Config, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
            tokens,
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn users(&self) -> UsersApi<'_> {
        UsersApi::new(self)
    }

    pub fn roles(&self) -> RolesApi<'_> {
        RolesApi::new(self)
    }

    // ---- auth ----

    /// Sign in and store the returned token pair.
    pub async fn login(&self, user_name_or_email: &str, password: &str) -> Result<AuthResponse> {
        let body = LoginRequest {
            user_name_or_email: user_name_or_email.to_string(),
            password: password.to_string(),
        };
        let session: AuthResponse = self.anonymous(&["api", "auth", "login"], &body).await?;
        self.tokens.set(session.token_pair()).await;
        Ok(session)
    }

    /// Create an account and store the returned token pair.
    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse> {
        let session: AuthResponse = self.anonymous(&["api", "auth", "register"], req).await?;
        self.tokens.set(session.token_pair()).await;
        Ok(session)
    }

    /// Rotate the stored token pair.
    pub async fn refresh(&self) -> Result<AuthResponse> {
        let current = self.tokens.get().await.ok_or(Error::NotSignedIn)?;
        let session = self.exchange(&current.refresh_token).await?;
        self.tokens.set(session.token_pair()).await;
        Ok(session)
    }

    /// Revoke the stored refresh token and forget the session.
    ///
    /// The local session is cleared even when the server rejects the
    /// revocation.
    pub async fn logout(&self) -> Result<()> {
        let Some(current) = self.tokens.get().await else {
            return Ok(());
        };
        self.tokens.clear().await;

        let body = RefreshTokenRequest { refresh_token: &current.refresh_token };
        let response = self
            .dispatch(Method::POST, self.endpoint(&["api", "auth", "revoke"])?, &[], Some(&body), None)
            .await?;
        expect_empty(response).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<SuccessResponse> {
        self.anonymous(&["api", "auth", "forgot-password"], &ForgotPasswordRequest { email })
            .await
    }

    pub async fn reset_password(&self, req: &ResetPasswordRequest) -> Result<SuccessResponse> {
        self.anonymous(&["api", "auth", "reset-password"], req).await
    }

    /// Profile of the signed-in user
    pub async fn me(&self) -> Result<UserResponse> {
        self.get(&["api", "account", "me"], &[]).await
    }

    // ---- plumbing ----

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send::<()>(Method::GET, segments, query, None).await?;
        expect_json(response).await
    }

    pub(crate) async fn post<B: Serialize, T: DeserializeOwned>(&self, segments: &[&str], body: &B) -> Result<T> {
        let response = self.send(Method::POST, segments, &[], Some(body)).await?;
        expect_json(response).await
    }

    pub(crate) async fn put<B: Serialize, T: DeserializeOwned>(&self, segments: &[&str], body: &B) -> Result<T> {
        let response = self.send(Method::PUT, segments, &[], Some(body)).await?;
        expect_json(response).await
    }

    pub(crate) async fn delete(&self, segments: &[&str]) -> Result<()> {
        let response = self.send::<()>(Method::DELETE, segments, &[], None).await?;
        expect_empty(response).await
    }

    /// Send an authenticated request, refreshing once on 401.
    async fn send<B: Serialize>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        let url = self.endpoint(segments)?;
        let used = self.tokens.get().await;
        let bearer = used.as_ref().map(|t| t.access_token.as_str());

        let response = self.dispatch(method.clone(), url.clone(), query, body, bearer).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(used) = used else {
            return Ok(response);
        };
        match self.renew(&used).await? {
            Some(fresh) => {
                debug!(%url, "Replaying request with renewed token");
                self.dispatch(method, url, query, body, Some(&fresh.access_token)).await
            }
            None => Ok(response),
        }
    }

    /// Renew the pair whose access token was just rejected.
    ///
    /// Concurrent callers wait on one refresh; a caller that finds the pair
    /// already replaced reuses the new one.
    async fn renew(&self, rejected: &TokenPair) -> Result<Option<TokenPair>> {
        let _guard = self.refresh_lock.lock().await;

        let Some(current) = self.tokens.get().await else {
            return Ok(None);
        };
        if current.access_token != rejected.access_token {
            return Ok(Some(current));
        }

        match self.exchange(&current.refresh_token).await {
            Ok(session) => {
                let fresh = session.token_pair();
                self.tokens.set(fresh.clone()).await;
                Ok(Some(fresh))
            }
            Err(e @ (Error::Http(_) | Error::Server(_))) => Err(e),
            Err(e) => {
                warn!(error = %e, "Refresh rejected, clearing session");
                self.tokens.clear().await;
                Ok(None)
            }
        }
    }

    async fn exchange(&self, refresh_token: &str) -> Result<AuthResponse> {
        self.anonymous(&["api", "auth", "refresh"], &RefreshTokenRequest { refresh_token })
            .await
    }

    async fn anonymous<B: Serialize, T: DeserializeOwned>(&self, segments: &[&str], body: &B) -> Result<T> {
        let response = self
            .dispatch(Method::POST, self.endpoint(segments)?, &[], Some(body), None)
            .await?;
        expect_json(response).await
    }

    async fn dispatch<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response> {
        let mut request = self.http_client.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| Error::Other(format!("Invalid base URL {}: {}", self.config.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Other(format!("Base URL cannot carry a path: {}", self.config.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("base_url", &self.config.base_url).finish()
    }
}

async fn expect_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        let bytes = response.bytes().await?;
        return Ok(serde_json::from_slice(&bytes)?);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::from_response(status, &body))
}

async fn expect_empty(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::from_response(status, &body))
}
