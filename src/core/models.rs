use super::types::*;

pub const DEFAULT_ACCESS_TOKEN_LIFETIME: u64 = 3600;
pub const DEFAULT_REFRESH_TOKEN_LIFETIME: u64 = 86400;

/// A registered API Client. Read-only to the OAuth core except for
/// `last_used`, which is touched as a side effect of authenticated and
/// token-issuing requests.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct Client {
    pub client_id: ClientId,
    /// Argon2 encoded hash. Only ever compared, never read back.
    pub secret: HashedClientSecret,
    pub grants: Vec<GrantType>,
    #[serde(default)]
    pub redirect_uri: RedirectUri,
    pub scope: Scope,
    /// Access token lifetime override in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_lifetime: Option<u64>,
    /// Refresh token lifetime override in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_lifetime: Option<u64>,
    /// Advances whenever an administrator changes the client's scopes;
    /// forces re-consent for users who authorized before that point.
    #[serde(default)]
    pub scopes_last_updated: UnixTime,
    #[serde(default)]
    pub last_used: UnixTime,
}

impl Client {
    pub fn access_lifetime(&self) -> u64 {
        self.access_token_lifetime
            .unwrap_or(DEFAULT_ACCESS_TOKEN_LIFETIME)
    }

    /// Resolved refresh lifetime. Never shorter than the access lifetime,
    /// so a pair's refresh token always outlives its access token.
    pub fn refresh_lifetime(&self) -> u64 {
        self.refresh_token_lifetime
            .unwrap_or(DEFAULT_REFRESH_TOKEN_LIFETIME)
            .max(self.access_lifetime())
    }

    pub fn allows_grant(&self, grant: GrantType) -> bool {
        self.grants.contains(&grant)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenData {
    pub token: AccessToken,
    pub expires_at: UnixTime,
    pub issued_at: UnixTime,
    pub scope: Scope,
    pub client_id: ClientId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenData {
    pub token: RefreshToken,
    pub expires_at: UnixTime,
    pub issued_at: UnixTime,
    pub scope: Scope,
    pub client_id: ClientId,
    pub user_id: UserId,
}

/// An access/refresh pair. The two are only ever created together in a
/// single grant operation.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: AccessTokenData,
    pub refresh: RefreshTokenData,
}

/// A single-use grant proof produced by the authorize flow.
#[derive(Debug, Clone)]
pub struct AuthCodeData {
    pub code: AuthCode,
    pub expires_at: UnixTime,
    pub redirect_uri: RedirectUri,
    pub scope: Scope,
    pub client_id: ClientId,
    pub user_id: UserId,
    /// Whether this authorization is a first-time consent or a re-consent
    /// after the client's scopes changed. Carried through to the token
    /// exchange so the caller can record the authorization.
    pub is_new_auth: bool,
}

impl Expire for AuthCodeData {
    const EXPIRES_IN_SECS: u64 = 10 * 60;
}

/// A user's recorded authorization of a client application.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct AuthorizedApp {
    pub client_id: ClientId,
    pub authorized_at: UnixTime,
}
