//! The session client: single source of truth for "is the caller
//! currently authenticated", and for making that fact durable across
//! access-credential expiry.
//!
//! The access credential lives only in memory, stamped with a computed
//! expiry; the refresh credential is persisted through the injected
//! [`TokenStorage`] backend. Expiry is detected lazily at
//! [`SessionClient::auth_header`] / [`SessionClient::with_auth`] call
//! time; no timers run.

use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, AuthResult};
use crate::wire::{self, TokenGrant};
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use session_storage::{StorageKeys, TokenStorage};
use std::future::Future;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// How the user identifies themselves at login.
#[derive(Debug, Clone)]
pub enum LoginIdentifier {
    Email(String),
    Phone(String),
}

/// Signup payload. Field-level validation is the server's job; the
/// client only forwards.
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
    pub role: UserRole,
}

/// User role on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Trainee,
    Trainer,
}

/// User profile as returned by the profile endpoint. Not cached here;
/// callers decide caching policy.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default)]
    pub roles: Option<Vec<UserRole>>,
}

/// Lazily derived session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No access credential, no persisted refresh credential.
    Unauthenticated,
    /// Valid access credential in memory.
    Authenticated,
    /// Access credential expired or absent, refresh credential present.
    Stale,
}

/// Handle for a registered auth-expired listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

struct AccessCredential {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Client for the identity server.
///
/// One instance per running app. The auth-expired listener registry is
/// owned by the instance, so independent sessions (e.g. in tests) never
/// observe each other's events.
pub struct SessionClient {
    storage: Box<dyn TokenStorage>,
    base_url: String,
    http_client: Client,
    clock: Box<dyn Clock>,
    access: Mutex<Option<AccessCredential>>,
    listeners: Mutex<ListenerRegistry>,
}

impl SessionClient {
    /// Create a new session client against the given identity server.
    pub fn new(storage: Box<dyn TokenStorage>, base_url: impl Into<String>) -> Self {
        Self::with_clock(storage, base_url, Box::new(SystemClock))
    }

    /// Create a session client with an injected clock.
    pub fn with_clock(
        storage: Box<dyn TokenStorage>,
        base_url: impl Into<String>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: Client::new(),
            clock,
            access: Mutex::new(None),
            listeners: Mutex::new(ListenerRegistry::default()),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/{}", self.base_url, path)
    }

    // ==========================================
    // Auth-expired listeners
    // ==========================================

    /// Register a listener invoked whenever the session becomes
    /// unrecoverable (failed refresh). Not invoked on explicit logout.
    ///
    /// Listeners run with the registry locked: do not subscribe or
    /// unsubscribe from inside the callback.
    pub fn on_auth_expired<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut registry = self.listeners.lock().unwrap();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.entries.push((id, Box::new(listener)));
        id
    }

    /// Remove a previously registered listener. Unknown ids are ignored.
    pub fn remove_auth_expired(&self, id: ListenerId) {
        let mut registry = self.listeners.lock().unwrap();
        registry.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    fn emit_auth_expired(&self) {
        let registry = self.listeners.lock().unwrap();
        for (id, listener) in &registry.entries {
            // A panicking listener must not starve the others or the
            // cleanup that triggered the event
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener()));
            if outcome.is_err() {
                warn!(listener = id.0, "auth-expired listener panicked");
            }
        }
    }

    // ==========================================
    // Credential state
    // ==========================================

    /// Current authorization header, or an empty map if no valid access
    /// credential is held. Pure and synchronous; never triggers I/O.
    pub fn auth_header(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let access = self.access.lock().unwrap();
        if let Some(credential) = access.as_ref() {
            // Expired means strictly past the expiry instant
            if self.clock.now() <= credential.expires_at {
                if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", credential.token)) {
                    headers.insert(AUTHORIZATION, value);
                }
            }
        }
        headers
    }

    /// Lazily derived session state. Reads storage, never the network.
    pub fn status(&self) -> AuthResult<SessionStatus> {
        {
            let access = self.access.lock().unwrap();
            if let Some(credential) = access.as_ref() {
                if self.clock.now() <= credential.expires_at {
                    return Ok(SessionStatus::Authenticated);
                }
            }
        }
        match self.stored_refresh_token()? {
            Some(_) => Ok(SessionStatus::Stale),
            None => Ok(SessionStatus::Unauthenticated),
        }
    }

    fn stored_refresh_token(&self) -> AuthResult<Option<String>> {
        let raw = self.storage.get(StorageKeys::REFRESH_TOKEN)?;
        Ok(wire::sanitize_refresh_token(raw))
    }

    /// Apply a freshly issued token pair. The rotated refresh
    /// credential must be persisted before the grant counts as applied.
    fn store_grant(&self, grant: TokenGrant) -> AuthResult<()> {
        self.storage
            .set(StorageKeys::REFRESH_TOKEN, &grant.refresh_token)?;
        let expires_at = self.clock.now() + Duration::seconds(grant.expires_in_sec);
        let mut access = self.access.lock().unwrap();
        *access = Some(AccessCredential {
            token: grant.access_token,
            expires_at,
        });
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        self.access.lock().unwrap().take();
        self.storage.remove(StorageKeys::REFRESH_TOKEN)?;
        Ok(())
    }

    // ==========================================
    // Operations
    // ==========================================

    /// Log in with an email or phone identifier and a password.
    pub async fn login(&self, identifier: LoginIdentifier, password: &str) -> AuthResult<()> {
        let body = match &identifier {
            LoginIdentifier::Email(email) => json!({"email": email, "password": password}),
            LoginIdentifier::Phone(phone) => json!({"phone": phone, "password": password}),
        };

        debug!("attempting login");
        let response = self
            .http_client
            .post(self.endpoint("login"))
            .json(&body)
            .send()
            .await?;

        let payload = Self::read_payload(response).await?;
        let grant = wire::parse_token_grant(payload)?;
        info!(access = %wire::mask_token(&grant.access_token), "login successful");
        self.store_grant(grant)
    }

    /// Create an account. The 2xx body is ignored; callers follow up
    /// with [`SessionClient::login`].
    pub async fn signup(&self, request: &SignupRequest) -> AuthResult<()> {
        debug!(role = ?request.role, "attempting signup");
        let response = self
            .http_client
            .post(self.endpoint("signup"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "signup rejected");
            return Err(wire::classify_error(status.as_u16(), &body));
        }
        Ok(())
    }

    /// Exchange the persisted refresh credential for a new token pair.
    ///
    /// Any failure clears all session state and emits the auth-expired
    /// event before propagating; refresh is never left half-applied.
    /// With no persisted refresh credential this fails without issuing
    /// a network call.
    pub async fn refresh(&self) -> AuthResult<()> {
        let refresh_token = match self.stored_refresh_token()? {
            Some(token) => token,
            None => {
                debug!("refresh requested without a stored refresh token");
                let _ = self.clear_session();
                self.emit_auth_expired();
                return Err(AuthError::NoRefreshToken);
            }
        };

        match self.request_refresh(&refresh_token).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "refresh failed, clearing session");
                let _ = self.clear_session();
                self.emit_auth_expired();
                Err(e)
            }
        }
    }

    async fn request_refresh(&self, refresh_token: &str) -> AuthResult<()> {
        let response = self
            .http_client
            .post(self.endpoint("refresh"))
            .json(&json!({"refreshToken": refresh_token}))
            .send()
            .await?;

        let payload = Self::read_payload(response).await?;
        let grant = wire::parse_token_grant(payload)?;
        info!(access = %wire::mask_token(&grant.access_token), "credential pair rotated");
        self.store_grant(grant)
    }

    /// Fetch the authenticated user's profile.
    pub async fn me(&self) -> AuthResult<UserProfile> {
        self.with_auth(|headers| async move {
            let response = self
                .http_client
                .get(self.endpoint("me"))
                .headers(headers)
                .send()
                .await?;
            let payload = Self::read_payload(response).await?;
            serde_json::from_value(payload).map_err(|_| AuthError::InvalidResponse)
        })
        .await
    }

    /// Log out. The server-side call is best-effort; local state is
    /// cleared no matter what the server or the network did, and no
    /// auth-expired event fires.
    pub async fn logout(&self) -> AuthResult<()> {
        let result = self
            .http_client
            .post(self.endpoint("logout"))
            .headers(self.auth_header())
            .send()
            .await;

        match result {
            Ok(response) if !response.status().is_success() => {
                debug!(status = %response.status(), "server-side logout rejected, ignoring");
            }
            Err(e) => {
                debug!(error = %e, "server-side logout unreachable, ignoring");
            }
            Ok(_) => {}
        }

        self.clear_session()?;
        info!("logged out");
        Ok(())
    }

    /// Run an authenticated call, transparently recovering from one
    /// credential-expiry rejection.
    ///
    /// The callback receives the current authorization header (possibly
    /// empty if the access credential already lapsed locally). On a 401
    /// failure the client performs exactly one [`SessionClient::refresh`]
    /// and retries the callback exactly once; a failing refresh
    /// propagates the refresh error, with state already cleared and the
    /// auth-expired event already emitted. Everything else propagates
    /// unchanged, so a call fails at most twice in total.
    pub async fn with_auth<T, F, Fut>(&self, mut call: F) -> AuthResult<T>
    where
        F: FnMut(HeaderMap) -> Fut,
        Fut: Future<Output = AuthResult<T>>,
    {
        match call(self.auth_header()).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_refreshable() => {
                debug!(status = e.status(), "authenticated call rejected, refreshing");
                self.refresh().await?;
                call(self.auth_header()).await
            }
            Err(e) => Err(e),
        }
    }

    /// Check the status, unwrap the optional success envelope.
    async fn read_payload(response: reqwest::Response) -> AuthResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "request rejected");
            return Err(wire::classify_error(status.as_u16(), &body));
        }
        let value: Value = response
            .json()
            .await
            .map_err(|_| AuthError::InvalidResponse)?;
        Ok(wire::unwrap_envelope(value))
    }
}
