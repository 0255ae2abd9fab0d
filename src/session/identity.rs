//! Identity service client.
//!
//! [`IdentityProvider`] is the seam between the auth flow and whatever
//! authenticates users. [`RestIdentityProvider`] talks to an
//! identity-toolkit style REST API and keeps the signed-in session in the
//! local database so it survives restarts. ID tokens are short-lived: when
//! the service reports one as expired, the stored refresh token is exchanged
//! for a new one and the call is repeated once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use super::AuthError;
use crate::storage::{Database, StoredSession};
use crate::util::{join_path, read_limited_bytes};

/// Profile of the signed-in user, as shown by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub is_anonymous: bool,
}

impl UserSnapshot {
    /// Name to greet the user with.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("Guest")
    }
}

/// An authenticated account and its credentials.
#[derive(Debug)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_anonymous: bool,
    pub id_token: SecretString,
    pub refresh_token: Option<SecretString>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The user of the current session, if any.
    async fn current_user(&self) -> Result<Option<AuthUser>, AuthError>;

    async fn sign_in_with_email(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthUser, AuthError>;

    async fn sign_in_anonymously(&self) -> Result<AuthUser, AuthError>;

    /// Creates an account. The new account is signed in.
    async fn sign_up(&self, email: &str, password: &SecretString) -> Result<AuthUser, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Reads the profile of `user`, first setting its display name when
    /// `display_name` is given and the profile has none.
    async fn fetch_profile(
        &self,
        user: &AuthUser,
        display_name: Option<&str>,
    ) -> Result<UserSnapshot, AuthError>;
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    /// Milliseconds since the epoch, as a string
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn error_code(message: &str) -> &str {
    message.split(" : ").next().unwrap_or(message).trim()
}

/// Maps a rejection from the service to an error. Codes that mean the
/// stored tokens are dead become [`AuthError::SessionExpired`].
fn rejection(message: &str) -> AuthError {
    match error_code(message) {
        "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => {
            AuthError::SessionExpired
        }
        _ => AuthError::Rejected(describe_error_code(message)),
    }
}

/// Human-readable text for the service's error codes. Codes may carry a
/// suffix (`WEAK_PASSWORD : Password should be ...`).
fn describe_error_code(message: &str) -> String {
    let text = match error_code(message) {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "The email address or password is incorrect."
        }
        "USER_DISABLED" => "This account has been disabled.",
        "EMAIL_EXISTS" => "The email address is already in use by another account.",
        "WEAK_PASSWORD" => "The password must be 6 characters long or more.",
        "INVALID_EMAIL" => "The email address is badly formatted.",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts. Try again later.",
        "ADMIN_ONLY_OPERATION" | "OPERATION_NOT_ALLOWED" => {
            "This sign-in method is not enabled."
        }
        _ => return message.to_string(),
    };
    text.to_string()
}

// ============================================================================
// REST Provider
// ============================================================================

/// Upper bound on an identity response body unless configured otherwise.
const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;

pub struct RestIdentityProvider {
    client: reqwest::Client,
    /// Root of the `accounts:*` endpoints.
    base: Url,
    /// Root of the refresh-token exchange (`/token`).
    token_base: Url,
    api_key: SecretString,
    db: Database,
    max_bytes: usize,
}

impl RestIdentityProvider {
    pub fn new(
        client: reqwest::Client,
        base: Url,
        token_base: Url,
        api_key: SecretString,
        db: Database,
    ) -> Self {
        Self {
            client,
            base,
            token_base,
            api_key,
            db,
            max_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    pub fn with_max_response_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn keyed_url(&self, base: &Url, path: &str) -> Result<Url, AuthError> {
        let mut url = join_path(base, path)?;
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose_secret());
        Ok(url)
    }

    async fn send<R>(&self, request: reqwest::RequestBuilder) -> Result<R, AuthError>
    where
        R: serde::de::DeserializeOwned,
    {
        let response = request.send().await?;
        let status = response.status();
        let bytes = read_limited_bytes(response, self.max_bytes).await?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<ErrorEnvelope>(&bytes) {
                Ok(envelope) => rejection(&envelope.error.message),
                Err(_) => AuthError::HttpStatus(status.as_u16()),
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post<B, R>(&self, method: &str, body: &B) -> Result<R, AuthError>
    where
        B: Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let url = self.keyed_url(&self.base, &format!("accounts:{}", method))?;
        self.send(self.client.post(url.as_str()).json(body)).await
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &SecretString,
    ) -> Result<TokenResponse, AuthError> {
        let url = self.keyed_url(&self.token_base, "token")?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token.expose_secret())
            .finish();
        let request = self
            .client
            .post(url.as_str())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body);
        self.send(request).await
    }

    /// Renews the ID token of `user` and stores it.
    ///
    /// A session the service refuses to renew is cleared. Network failures
    /// leave it in place so a later attempt can still succeed.
    async fn refresh_session(&self, user: &AuthUser) -> Result<SecretString, AuthError> {
        let Some(refresh_token) = user.refresh_token.as_ref() else {
            tracing::info!(uid = %user.uid, "Expired session has no refresh token");
            self.forget().await?;
            return Err(AuthError::SessionExpired);
        };

        match self.exchange_refresh_token(refresh_token).await {
            Ok(tokens) => {
                let renewed = AuthUser {
                    uid: user.uid.clone(),
                    email: user.email.clone(),
                    display_name: user.display_name.clone(),
                    is_anonymous: user.is_anonymous,
                    id_token: SecretString::from(tokens.id_token),
                    refresh_token: Some(SecretString::from(
                        tokens
                            .refresh_token
                            .unwrap_or_else(|| refresh_token.expose_secret().to_string()),
                    )),
                };
                self.remember(&renewed).await?;
                tracing::info!(uid = %user.uid, "Refreshed session token");
                Ok(renewed.id_token)
            }
            Err(e @ (AuthError::Network(_) | AuthError::Body(_))) => Err(e),
            Err(e) => {
                tracing::warn!(
                    uid = %user.uid,
                    error = %e,
                    "Token refresh refused, clearing session"
                );
                self.forget().await?;
                Err(AuthError::SessionExpired)
            }
        }
    }

    async fn forget(&self) -> Result<bool, AuthError> {
        self.db
            .clear_session()
            .await
            .map_err(|e| AuthError::Storage(format!("{e:#}")))
    }

    async fn update_display_name(
        &self,
        id_token: &SecretString,
        name: &str,
    ) -> Result<(), AuthError> {
        let request = UpdateProfileRequest {
            id_token: id_token.expose_secret(),
            display_name: name,
            return_secure_token: false,
        };
        let _: serde_json::Value = self.post("update", &request).await?;
        Ok(())
    }

    async fn lookup(&self, id_token: &SecretString) -> Result<LookupResponse, AuthError> {
        let request = LookupRequest {
            id_token: id_token.expose_secret(),
        };
        self.post("lookup", &request).await
    }

    async fn credentials(
        &self,
        method: &str,
        email: Option<&str>,
        password: Option<&SecretString>,
    ) -> Result<AuthUser, AuthError> {
        let request = CredentialsRequest {
            email,
            password: password.map(|p| p.expose_secret()),
            return_secure_token: true,
        };
        let response: CredentialsResponse = self.post(method, &request).await?;
        let user = AuthUser {
            uid: response.local_id,
            email: response.email.filter(|e| !e.is_empty()),
            display_name: response.display_name.filter(|n| !n.is_empty()),
            is_anonymous: email.is_none(),
            id_token: SecretString::from(response.id_token),
            refresh_token: response.refresh_token.map(SecretString::from),
        };
        self.remember(&user).await?;
        tracing::info!(uid = %user.uid, anonymous = user.is_anonymous, "Signed in");
        Ok(user)
    }

    async fn remember(&self, user: &AuthUser) -> Result<(), AuthError> {
        let session = StoredSession {
            user_id: user.uid.clone(),
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            is_anonymous: user.is_anonymous,
            id_token: user.id_token.expose_secret().to_string(),
            refresh_token: user
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            created_at: Utc::now().timestamp(),
        };
        self.db
            .save_session(&session)
            .await
            .map_err(|e| AuthError::Storage(format!("{e:#}")))
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn current_user(&self) -> Result<Option<AuthUser>, AuthError> {
        let stored = self
            .db
            .load_session()
            .await
            .map_err(|e| AuthError::Storage(format!("{e:#}")))?;

        Ok(stored.map(|s| AuthUser {
            uid: s.user_id,
            email: s.email,
            display_name: s.display_name,
            is_anonymous: s.is_anonymous,
            id_token: SecretString::from(s.id_token),
            refresh_token: s.refresh_token.map(SecretString::from),
        }))
    }

    async fn sign_in_with_email(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthUser, AuthError> {
        self.credentials("signInWithPassword", Some(email), Some(password))
            .await
    }

    async fn sign_in_anonymously(&self) -> Result<AuthUser, AuthError> {
        self.credentials("signUp", None, None).await
    }

    async fn sign_up(&self, email: &str, password: &SecretString) -> Result<AuthUser, AuthError> {
        self.credentials("signUp", Some(email), Some(password)).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let had_session = self.forget().await?;
        tracing::info!(had_session = had_session, "Signed out");
        Ok(())
    }

    async fn fetch_profile(
        &self,
        user: &AuthUser,
        display_name: Option<&str>,
    ) -> Result<UserSnapshot, AuthError> {
        let mut renewed: Option<SecretString> = None;

        if let Some(name) = display_name.filter(|_| user.display_name.is_none()) {
            match self.update_display_name(&user.id_token, name).await {
                Err(AuthError::SessionExpired) => {
                    let token = self.refresh_session(user).await?;
                    self.update_display_name(&token, name).await?;
                    renewed = Some(token);
                }
                other => other?,
            }
            tracing::debug!(uid = %user.uid, "Set display name");
        }

        let token = renewed.as_ref().unwrap_or(&user.id_token);
        let lookup = match self.lookup(token).await {
            Err(AuthError::SessionExpired) if renewed.is_none() => {
                let token = self.refresh_session(user).await?;
                self.lookup(&token).await?
            }
            other => other?,
        };
        let account = lookup
            .users
            .into_iter()
            .find(|a| a.local_id == user.uid)
            .ok_or(AuthError::NotSignedIn)?;

        let snapshot = UserSnapshot {
            id: account.local_id,
            display_name: account.display_name.filter(|n| !n.is_empty()),
            email: account.email.filter(|e| !e.is_empty()),
            photo_url: account.photo_url,
            created_at: account
                .created_at
                .and_then(|ms| ms.parse::<i64>().ok())
                .and_then(DateTime::from_timestamp_millis),
            is_anonymous: user.is_anonymous,
        };

        if snapshot.display_name != user.display_name {
            if let Ok(Some(mut stored)) = self.db.load_session().await {
                stored.display_name = snapshot.display_name.clone();
                if let Err(e) = self.db.save_session(&stored).await {
                    tracing::warn!(error = %e, "Failed to update stored display name");
                }
            }
        }

        Ok(snapshot)
    }
}
