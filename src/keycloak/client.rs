//! Keycloak admin API client implementation.
//!
//! This module provides the HTTP transport used by every relation adapter:
//! token acquisition, request execution with bounded retries, and the
//! classification of HTTP failures into [`RemoteError`] variants.

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{ConfigError, KcSyncError, RemoteError, Result};

use super::types::{
    ClientRepresentation, ClientScopeRepresentation, RoleRepresentation, TokenResponse,
    UserRepresentation,
};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds, multiplied by the attempt number.
const RETRY_DELAY_MS: u64 = 1000;

/// Longest server-requested pause honored between attempts.
const MAX_SERVER_DELAY: Duration = Duration::from_secs(30);

/// A token is refreshed when it has less than this left to live.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(10);

/// How the client authenticates against the token endpoint.
#[derive(Clone)]
pub enum Credentials {
    /// `client_credentials` grant with a confidential client.
    ClientCredentials {
        /// Client id.
        client_id: String,
        /// Client secret.
        client_secret: String,
    },
    /// `password` grant on behalf of an admin user.
    Password {
        /// Client id.
        client_id: String,
        /// Client secret, for confidential clients.
        client_secret: Option<String>,
        /// Admin username.
        username: String,
        /// Admin password.
        password: String,
    },
}

/// Connection settings for [`KeycloakClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Server root URL.
    pub url: String,
    /// Path prefix under the root, e.g. `/auth`.
    pub base_path: String,
    /// Realm the admin credentials belong to.
    pub auth_realm: String,
    /// Credentials.
    pub credentials: Credentials,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Keycloak admin API client.
#[derive(Debug)]
pub struct KeycloakClient {
    /// HTTP client.
    http: Client,
    /// Server root including the base path.
    base_url: Url,
    /// Realm used for token requests.
    auth_realm: String,
    /// Credentials.
    credentials: Credentials,
    /// Cached bearer token.
    token: Mutex<Option<AccessToken>>,
    /// Base delay between retries.
    retry_delay: Duration,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl KeycloakClient {
    /// Creates a new Keycloak admin client.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// created.
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| RemoteError::network(format!("Failed to create HTTP client: {e}")))?;

        let mut base_url = Url::parse(&settings.url).map_err(|e| {
            ConfigError::validation(format!("Invalid Keycloak URL '{}': {e}", settings.url), "keycloak.url")
        })?;
        {
            let mut segments = base_url.path_segments_mut().map_err(|()| {
                ConfigError::validation(
                    format!("Keycloak URL '{}' cannot be a base", settings.url),
                    "keycloak.url",
                )
            })?;
            segments
                .pop_if_empty()
                .extend(settings.base_path.split('/').filter(|s| !s.is_empty()));
        }

        Ok(Self {
            http,
            base_url,
            auth_realm: settings.auth_realm,
            credentials: settings.credentials,
            token: Mutex::new(None),
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    /// Sets the base delay between retries.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Returns the admin URL for a path inside a realm.
    fn admin_url(&self, realm: &str, path: &[&str]) -> Result<Url> {
        self.url_with(&["admin", "realms", realm], path)
    }

    fn url_with(&self, prefix: &[&str], path: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| KcSyncError::internal(format!("URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(prefix)
            .extend(path);
        Ok(url)
    }

    /// Returns a valid bearer token, requesting a new one if needed.
    async fn bearer_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at.saturating_duration_since(Instant::now()) > TOKEN_REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
            debug!("Access token expires soon, refreshing");
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Performs the token grant.
    async fn request_token(&self) -> Result<AccessToken> {
        let url = self.url_with(
            &["realms", self.auth_realm.as_str()],
            &["protocol", "openid-connect", "token"],
        )?;
        let form = self.credentials.grant_form();
        trace!("Requesting access token from {url}");

        let response = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| RemoteError::network(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KcSyncError::Remote(RemoteError::AuthenticationFailed {
                message: format!("token request returned {status}: {body}"),
            }));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::invalid_response(format!("Failed to parse token response: {e}")))?;

        debug!("Obtained access token valid for {}s", token.expires_in);
        Ok(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    /// Executes a request, retrying network failures and rate limiting.
    ///
    /// The pause before attempt `n` is `retry_delay * n`, or the server's
    /// `Retry-After` when that is longer (capped at [`MAX_SERVER_DELAY`]).
    async fn execute(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Response> {
        let mut last_error = None;
        let mut pause = Duration::ZERO;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES} in {pause:?}");
                tokio::time::sleep(pause).await;
            }

            match self.execute_once(method.clone(), url.clone(), body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() => {
                    warn!("{method} {} failed: {e}", url.path());
                    let hinted = e
                        .retry_delay_secs()
                        .map_or(Duration::ZERO, Duration::from_secs)
                        .min(MAX_SERVER_DELAY);
                    pause = (self.retry_delay * (attempt + 1)).max(hinted);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            KcSyncError::Remote(RemoteError::network("Max retries exceeded"))
        }))
    }

    /// Executes a single request.
    async fn execute_once(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Response> {
        let token = self.bearer_token().await?;
        trace!("{method} {url}");

        let mut request = self.http.request(method, url.clone()).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
        }

        Err(KcSyncError::Remote(classify(status, url.path(), response).await))
    }

    /// GETs a realm resource.
    ///
    /// # Errors
    ///
    /// Returns a classified [`RemoteError`] on failure.
    pub async fn get<T: DeserializeOwned>(&self, realm: &str, path: &[&str]) -> Result<T> {
        self.get_with_query(realm, path, &[]).await
    }

    /// GETs a realm resource with query parameters.
    ///
    /// # Errors
    ///
    /// Returns a classified [`RemoteError`] on failure.
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        realm: &str,
        path: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T> {
        let mut url = self.admin_url(realm, path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let response = self.execute(Method::GET, url, None).await?;
        response
            .json()
            .await
            .map_err(|e| KcSyncError::Remote(RemoteError::invalid_response(format!("Failed to parse response: {e}"))))
    }

    /// POSTs a JSON body, discarding the response.
    ///
    /// # Errors
    ///
    /// Returns a classified [`RemoteError`] on failure.
    pub async fn post(&self, realm: &str, path: &[&str], body: &Value) -> Result<()> {
        let url = self.admin_url(realm, path)?;
        self.execute(Method::POST, url, Some(body)).await?;
        Ok(())
    }

    /// POSTs a JSON body and parses the created representation.
    ///
    /// # Errors
    ///
    /// Returns a classified [`RemoteError`] on failure.
    pub async fn post_json<T: DeserializeOwned>(&self, realm: &str, path: &[&str], body: &Value) -> Result<T> {
        let url = self.admin_url(realm, path)?;
        let response = self.execute(Method::POST, url, Some(body)).await?;
        response
            .json()
            .await
            .map_err(|e| KcSyncError::Remote(RemoteError::invalid_response(format!("Failed to parse response: {e}"))))
    }

    /// PUTs an optional JSON body.
    ///
    /// # Errors
    ///
    /// Returns a classified [`RemoteError`] on failure.
    pub async fn put(&self, realm: &str, path: &[&str], body: Option<&Value>) -> Result<()> {
        let url = self.admin_url(realm, path)?;
        self.execute(Method::PUT, url, body).await?;
        Ok(())
    }

    /// DELETEs a resource, with an optional JSON body.
    ///
    /// # Errors
    ///
    /// Returns a classified [`RemoteError`] on failure.
    pub async fn delete(&self, realm: &str, path: &[&str], body: Option<&Value>) -> Result<()> {
        let url = self.admin_url(realm, path)?;
        self.execute(Method::DELETE, url, body).await?;
        Ok(())
    }

    /// Looks up a user by exact username.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn find_user_by_username(&self, realm: &str, username: &str) -> Result<Option<UserRepresentation>> {
        let users: Vec<UserRepresentation> = self
            .get_with_query(realm, &["users"], &[("username", username), ("exact", "true")])
            .await?;
        Ok(users.into_iter().find(|u| u.username == username))
    }

    /// Looks up a realm role by name.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] if no such role exists.
    pub async fn realm_role(&self, realm: &str, name: &str) -> Result<RoleRepresentation> {
        self.get(realm, &["roles", name]).await
    }

    /// Looks up a client scope by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn find_client_scope(&self, realm: &str, name: &str) -> Result<Option<ClientScopeRepresentation>> {
        let scopes: Vec<ClientScopeRepresentation> = self.get(realm, &["client-scopes"]).await?;
        Ok(scopes.into_iter().find(|s| s.name == name))
    }

    /// Looks up a client by its public client id.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] if no such client exists.
    pub async fn client_by_client_id(&self, realm: &str, client_id: &str) -> Result<ClientRepresentation> {
        let clients: Vec<ClientRepresentation> = self
            .get_with_query(realm, &["clients"], &[("clientId", client_id)])
            .await?;
        clients
            .into_iter()
            .find(|c| c.client_id == client_id)
            .ok_or_else(|| {
                KcSyncError::Remote(RemoteError::NotFound {
                    resource: format!("client '{client_id}' in realm '{realm}'"),
                })
            })
    }
}

impl Credentials {
    /// Returns the form parameters of the token grant.
    fn grant_form(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::ClientCredentials {
                client_id,
                client_secret,
            } => vec![
                ("grant_type", String::from("client_credentials")),
                ("client_id", client_id.clone()),
                ("client_secret", client_secret.clone()),
            ],
            Self::Password {
                client_id,
                client_secret,
                username,
                password,
            } => {
                let mut form = vec![
                    ("grant_type", String::from("password")),
                    ("client_id", client_id.clone()),
                    ("username", username.clone()),
                    ("password", password.clone()),
                ];
                if let Some(secret) = client_secret {
                    form.push(("client_secret", secret.clone()));
                }
                form
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Self::Password {
                client_id, username, ..
            } => f
                .debug_struct("Password")
                .field("client_id", client_id)
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Maps a failed response to a [`RemoteError`].
async fn classify(status: StatusCode, resource: &str, response: Response) -> RemoteError {
    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound {
            resource: resource.to_string(),
        },
        StatusCode::CONFLICT => RemoteError::Conflict {
            resource: resource.to_string(),
            message: response.text().await.unwrap_or_default(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::AuthenticationFailed {
            message: format!("{status} for {resource}"),
        },
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            RemoteError::RateLimited {
                retry_after_secs: retry_after,
            }
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            RemoteError::api_error(status.as_u16(), body)
        }
    }
}
