use crate::core::models::{
    AccessTokenData, AuthCodeData, AuthorizedApp, Client, RefreshTokenData, TokenPair,
};
use crate::core::types::{
    AccessToken, AuthCode, ClientId, ClientSecret, RedirectUri, RefreshToken, Scope, SessionToken,
    UserId,
};

pub mod access_token;
pub mod authorization;
pub mod consent;
pub mod error;
pub mod scope;

pub use access_token::*;
pub use authorization::*;
pub use error::{Error, ErrorResponse};

use async_trait::async_trait;

/// Credentials a client presents on the token endpoint, from HTTP Basic or
/// the request body.
#[derive(Debug, serde::Deserialize)]
pub struct ClientCredentials {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
}

/// Identity attached to a request after a successful `authenticate`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: UserId,
    pub client_id: ClientId,
    pub scope: Scope,
}

/// A response that redirects the user agent to `uri` with `params`
/// appended to the query string.
#[derive(Debug, Clone)]
pub struct Redirect<T> {
    pub uri: RedirectUri,
    pub params: T,
}

impl<T> Redirect<T> {
    pub fn new(uri: RedirectUri, params: T) -> Self {
        Redirect { uri, params }
    }
}

/// Registered-client lookup and secret verification.
#[async_trait]
pub trait ClientRegistry {
    /// Resolves a client by id. When a secret is supplied it is verified
    /// against the stored hash; a mismatch is indistinguishable from an
    /// unknown client.
    async fn get_client(
        &self,
        client_id: &ClientId,
        client_secret: Option<&ClientSecret>,
    ) -> Result<Option<Client>, Error>;

    /// Updates the client's `last_used` timestamp. Best-effort; callers
    /// fire this without awaiting the response path.
    async fn touch_last_used(&self, client_id: &ClientId) -> Result<(), Error>;
}

/// Persistence for grant artifacts, keyed by opaque token/code strings.
#[async_trait]
pub trait TokenStore {
    /// Persists both halves of a pair as a unit. If either half cannot be
    /// persisted, neither may become visible.
    async fn save_token_pair(&self, pair: TokenPair) -> Result<TokenPair, Error>;
    async fn get_access_token(&self, token: &AccessToken) -> Result<Option<AccessTokenData>, Error>;
    async fn get_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<Option<RefreshTokenData>, Error>;
    async fn save_authorization_code(&self, data: AuthCodeData) -> Result<AuthCodeData, Error>;
    async fn get_authorization_code(&self, code: &AuthCode)
        -> Result<Option<AuthCodeData>, Error>;
    /// True iff exactly one record was deleted. Atomic with respect to
    /// concurrent revocations of the same token.
    async fn revoke_refresh_token(&self, token: &RefreshToken) -> Result<bool, Error>;
    /// True iff exactly one record was deleted.
    async fn revoke_authorization_code(&self, code: &AuthCode) -> Result<bool, Error>;
    /// Drops expired codes and token pairs.
    async fn clean_up(&self) -> Result<(), Error>;
}

/// The resource owner acting on an authorize request, as established by the
/// surrounding session layer.
#[derive(Debug, Clone)]
pub struct ResourceOwner {
    pub user_id: UserId,
    pub authorized_apps: Vec<AuthorizedApp>,
}

/// Strategy the authorize flow consults for user identity and approval.
/// Passed explicitly into `authorize` rather than captured from ambient
/// request state.
#[async_trait]
pub trait ConsentResolver {
    async fn resource_owner(&self, session: &SessionToken) -> Result<ResourceOwner, Error>;

    /// Whether the grant should proceed. When `is_new_auth` is true the
    /// implementation is expected to have presented a consent step to the
    /// user before this returns `true`.
    async fn approve(
        &self,
        owner: &ResourceOwner,
        client: &Client,
        is_new_auth: bool,
    ) -> Result<bool, Error>;

    /// Records a user→client authorization at the current time. Invoked by
    /// the token endpoint when an exchange reports `is_new_auth`.
    async fn record_authorization(
        &self,
        user_id: &UserId,
        client_id: &ClientId,
    ) -> Result<(), Error>;
}
