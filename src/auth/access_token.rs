use crate::core::types::{
    AccessToken, AuthCode, ClientId, RedirectUri, RefreshToken, Scope, UserId,
};

#[derive(Debug, serde::Serialize)]
pub enum TokenType {
    Bearer,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "grant_type")]
pub enum TokenRequest {
    #[serde(rename = "authorization_code")]
    AuthorizationCode(AuthorizationCodeTokenRequest),
    #[serde(rename = "refresh_token")]
    RefreshToken(RefreshTokenRequest),
}

#[derive(Debug, serde::Deserialize)]
pub struct AuthorizationCodeTokenRequest {
    pub code: AuthCode,
    pub redirect_uri: RedirectUri,
}

#[derive(Debug, serde::Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: RefreshToken,
}

#[derive(Debug, serde::Serialize)]
pub struct AccessTokenResponse {
    pub access_token: AccessToken,
    pub token_type: TokenType,
    /// Seconds until the access token expires.
    pub expires_in: u64,
    pub refresh_token: RefreshToken,
    /// Seconds until the refresh token expires. Derived at response time
    /// from the stored expiry, never persisted.
    pub refresh_expires_in: u64,
    pub scope: Scope,
}

/// Outcome of a successful token exchange. `is_new_auth` travels as an
/// explicit field so the caller can record the user→client authorization
/// when a first-time or re-consent grant completes.
#[derive(Debug)]
pub struct TokenExchange {
    pub response: AccessTokenResponse,
    pub is_new_auth: bool,
    pub user_id: UserId,
    pub client_id: ClientId,
}
