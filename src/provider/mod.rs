//! The authorization server core. Each flow method is request-scoped and a
//! pure function of its inputs and the injected collaborators; the only
//! shared state lives behind the store traits.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{event, Level};

use crate::auth::{
    consent, scope, AccessTokenResponse, AuthContext, AuthorizationCodeTokenRequest,
    AuthorizationRequest, AuthorizationResponse, ClientCredentials, ClientRegistry,
    ConsentResolver, Error, Redirect, RefreshTokenRequest, TokenExchange, TokenRequest,
    TokenStore, TokenType,
};
use crate::core::models::{AccessTokenData, AuthCodeData, Client, RefreshTokenData, TokenPair};
use crate::core::types::{
    AccessToken, AuthCode, BearerToken, ClientId, Expire, GrantType, RefreshToken, Scope,
    SessionToken, UnixTime, UserId,
};
use crate::util::random::FromRandom;

/// Upper bound on any single store round-trip. A store that hangs is a
/// server-side fault, not a client error.
const STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct AuthorizationServer<R, S> {
    registry: Arc<R>,
    store: Arc<S>,
}

impl<R, S> AuthorizationServer<R, S>
where
    R: ClientRegistry + Send + Sync + 'static,
    S: TokenStore + Send + Sync + 'static,
{
    pub fn new(registry: Arc<R>, store: Arc<S>) -> Self {
        Self { registry, store }
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        tokio::time::timeout(STORE_TIMEOUT, fut)
            .await
            .map_err(|_| Error::invalid_argument("store call timed out"))?
    }

    /// Fire-and-forget `last_used` update. Never blocks the response path;
    /// failures land in the log, not in the client-visible outcome.
    fn touch_last_used(&self, client_id: ClientId) {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            if let Err(e) = registry.touch_last_used(&client_id).await {
                event!(
                    Level::WARN,
                    client_id = %client_id.0,
                    error = %e,
                    "failed to touch client last_used"
                );
            }
        });
    }

    /// Guards a resource endpoint. `route` is the endpoint's path template
    /// (parameterized segments written with a leading `:`).
    #[tracing::instrument(skip(self, token))]
    pub async fn authenticate(
        &self,
        token: &BearerToken,
        route: &str,
        method: &str,
    ) -> Result<AuthContext, Error> {
        let data = self
            .bounded(self.store.get_access_token(&AccessToken(token.0.clone())))
            .await?
            .ok_or(Error::InvalidToken)?;

        if data.expires_at.is_past() {
            return Err(Error::InvalidToken);
        }

        let required = scope::endpoint_to_scope(route, method);
        if !scope::scope_satisfied(&data.scope, &required) {
            event!(
                Level::DEBUG,
                required = %required,
                granted = %data.scope.as_joined(),
                "scope check failed"
            );
            return Err(Error::InsufficientScope);
        }

        self.touch_last_used(data.client_id.clone());

        Ok(AuthContext {
            user_id: data.user_id,
            client_id: data.client_id,
            scope: data.scope,
        })
    }

    /// Entry point of the authorization_code flow. The code is bound to the
    /// client's server-recorded scope; the request's `scope` parameter has
    /// no effect on what is granted.
    #[tracing::instrument(skip(self, session, resolver))]
    pub async fn authorize<C>(
        &self,
        session: &SessionToken,
        req: AuthorizationRequest,
        resolver: &C,
    ) -> Result<Redirect<AuthorizationResponse>, Error>
    where
        C: ConsentResolver + Sync + ?Sized,
    {
        let client = self
            .bounded(self.registry.get_client(&req.client_id, None))
            .await?
            .ok_or(Error::InvalidClient)?;

        if !client.allows_grant(GrantType::AuthorizationCode) {
            return Err(Error::UnauthorizedClient);
        }

        if let Some(uri) = &req.redirect_uri {
            if uri != &client.redirect_uri {
                return Err(Error::InvalidRequest);
            }
        }

        let owner = resolver.resource_owner(session).await?;
        let prior = consent::find_authorization(&owner.authorized_apps, &client.client_id);
        let is_new_auth = consent::is_new_auth(prior, client.scopes_last_updated);

        if !resolver.approve(&owner, &client, is_new_auth).await? {
            return Err(Error::AccessDenied);
        }

        let code = AuthCode::from_random();
        let data = AuthCodeData {
            code: code.clone(),
            expires_at: AuthCodeData::expiry(),
            redirect_uri: client.redirect_uri.clone(),
            scope: client.scope.clone(),
            client_id: client.client_id.clone(),
            user_id: owner.user_id,
            is_new_auth,
        };
        self.bounded(self.store.save_authorization_code(data)).await?;

        event!(
            Level::DEBUG,
            client_id = %client.client_id.0,
            is_new_auth,
            "issued authorization code"
        );
        self.touch_last_used(client.client_id);

        Ok(Redirect::new(
            client.redirect_uri,
            AuthorizationResponse::new(code, req.state),
        ))
    }

    /// Exchanges a grant for a fresh token pair.
    #[tracing::instrument(skip(self, credentials, req))]
    pub async fn token(
        &self,
        credentials: ClientCredentials,
        req: TokenRequest,
    ) -> Result<TokenExchange, Error> {
        let client = self
            .bounded(
                self.registry
                    .get_client(&credentials.client_id, Some(&credentials.client_secret)),
            )
            .await?
            .ok_or(Error::InvalidClient)?;

        let exchange = match req {
            TokenRequest::AuthorizationCode(req) => {
                self.exchange_authorization_code(&client, req).await?
            }
            TokenRequest::RefreshToken(req) => self.exchange_refresh_token(&client, req).await?,
        };

        self.touch_last_used(client.client_id);
        Ok(exchange)
    }

    async fn exchange_authorization_code(
        &self,
        client: &Client,
        req: AuthorizationCodeTokenRequest,
    ) -> Result<TokenExchange, Error> {
        if !client.allows_grant(GrantType::AuthorizationCode) {
            return Err(Error::UnauthorizedClient);
        }

        let data = self
            .bounded(self.store.get_authorization_code(&req.code))
            .await?
            .ok_or(Error::InvalidGrant)?;

        // Single use: revoke before validating further. Under concurrent
        // redemption exactly one caller sees the deletion succeed.
        if !self
            .bounded(self.store.revoke_authorization_code(&req.code))
            .await?
        {
            return Err(Error::InvalidGrant);
        }

        if data.client_id != client.client_id
            || data.expires_at.is_past()
            || data.redirect_uri != req.redirect_uri
        {
            return Err(Error::InvalidGrant);
        }

        let pair = self.issue_pair(client, data.user_id.clone(), data.scope).await?;

        Ok(self.exchange_result(client, pair, data.is_new_auth))
    }

    async fn exchange_refresh_token(
        &self,
        client: &Client,
        req: RefreshTokenRequest,
    ) -> Result<TokenExchange, Error> {
        if !client.allows_grant(GrantType::RefreshToken) {
            return Err(Error::UnauthorizedClient);
        }

        let data = self
            .bounded(self.store.get_refresh_token(&req.refresh_token))
            .await?
            .ok_or(Error::InvalidGrant)?;

        // Rotation: the old refresh token dies with the exchange, and the
        // delete doubles as the winner-picks-one guard under concurrency.
        if !self
            .bounded(self.store.revoke_refresh_token(&req.refresh_token))
            .await?
        {
            return Err(Error::InvalidGrant);
        }

        if data.client_id != client.client_id || data.expires_at.is_past() {
            return Err(Error::InvalidGrant);
        }

        let pair = self.issue_pair(client, data.user_id.clone(), data.scope).await?;

        Ok(self.exchange_result(client, pair, false))
    }

    async fn issue_pair(
        &self,
        client: &Client,
        user_id: UserId,
        scope: Scope,
    ) -> Result<TokenPair, Error> {
        let now = UnixTime::now();
        let pair = TokenPair {
            access: AccessTokenData {
                token: AccessToken::from_random(),
                expires_at: now.plus_secs(client.access_lifetime()),
                issued_at: now,
                scope: scope.clone(),
                client_id: client.client_id.clone(),
                user_id: user_id.clone(),
            },
            refresh: RefreshTokenData {
                token: RefreshToken::from_random(),
                expires_at: now.plus_secs(client.refresh_lifetime()),
                issued_at: now,
                scope,
                client_id: client.client_id.clone(),
                user_id,
            },
        };
        self.bounded(self.store.save_token_pair(pair)).await
    }

    fn exchange_result(&self, client: &Client, pair: TokenPair, is_new_auth: bool) -> TokenExchange {
        let response = AccessTokenResponse {
            access_token: pair.access.token,
            token_type: TokenType::Bearer,
            // The pair was minted in this request; the configured lifetime
            // is the remaining lifetime.
            expires_in: client.access_lifetime(),
            refresh_token: pair.refresh.token,
            refresh_expires_in: pair.refresh.expires_at.secs_from_now(),
            scope: pair.access.scope,
        };
        TokenExchange {
            response,
            is_new_auth,
            user_id: pair.refresh.user_id,
            client_id: client.client_id.clone(),
        }
    }

    /// Periodically drops expired grant artifacts from the store.
    pub async fn start_clean_up_worker(&self) -> Result<(), Error> {
        let mut interval = tokio::time::interval(Duration::from_secs(15));

        loop {
            interval.tick().await;
            self.store.clean_up().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ConsentResolver, ResourceOwner};
    use crate::core::models::Client;
    use crate::core::types::{ClientId, ClientSecret, RedirectUri, SessionToken};
    use crate::store::MemoryStore;
    use crate::util::hash::HashingService;

    const CLIENT_SCOPE: &str = "read:user:basicinfo write:projects:recent";

    struct Fixture {
        store: Arc<MemoryStore>,
        provider: AuthorizationServer<MemoryStore, MemoryStore>,
    }

    async fn fixture(client: Client) -> Fixture {
        let hasher = HashingService::with_secret_key("test-hash-key".to_string());
        let store = Arc::new(MemoryStore::new(hasher));
        store.add_client(client).await;
        store
            .add_session(SessionToken("sess-1".to_string()), UserId("u1".to_string()))
            .await;
        let provider = AuthorizationServer::new(Arc::clone(&store), Arc::clone(&store));
        Fixture { store, provider }
    }

    fn test_client(id: &str) -> Client {
        let hasher = HashingService::with_secret_key("test-hash-key".to_string());
        Client {
            client_id: ClientId(id.to_string()),
            secret: hasher.hash(&ClientSecret("s3cret".to_string())).unwrap(),
            grants: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            redirect_uri: RedirectUri("https://app.example/cb".to_string()),
            scope: Scope::from_delimited_parts(CLIENT_SCOPE),
            access_token_lifetime: None,
            refresh_token_lifetime: None,
            scopes_last_updated: UnixTime::epoch(),
            last_used: UnixTime::epoch(),
        }
    }

    fn credentials(id: &str) -> ClientCredentials {
        ClientCredentials {
            client_id: ClientId(id.to_string()),
            client_secret: ClientSecret("s3cret".to_string()),
        }
    }

    fn authorize_request(id: &str) -> AuthorizationRequest {
        AuthorizationRequest {
            client_id: ClientId(id.to_string()),
            redirect_uri: None,
            scope: None,
            response_type: None,
            state: Some("xyz".to_string()),
        }
    }

    async fn obtain_code(fx: &Fixture, id: &str) -> AuthCode {
        let redirect = fx
            .provider
            .authorize(
                &SessionToken("sess-1".to_string()),
                authorize_request(id),
                fx.store.as_ref(),
            )
            .await
            .unwrap();
        redirect.params.code
    }

    async fn exchange_code(fx: &Fixture, id: &str, code: AuthCode) -> Result<TokenExchange, Error> {
        fx.provider
            .token(
                credentials(id),
                TokenRequest::AuthorizationCode(AuthorizationCodeTokenRequest {
                    code,
                    redirect_uri: RedirectUri("https://app.example/cb".to_string()),
                }),
            )
            .await
    }

    #[tokio::test]
    async fn code_exchange_uses_defaults_and_registered_scope() {
        let fx = fixture(test_client("abc123")).await;
        let code = obtain_code(&fx, "abc123").await;
        let exchange = exchange_code(&fx, "abc123", code).await.unwrap();

        assert_eq!(exchange.response.expires_in, 3600);
        // Derived at response time, so allow a second-boundary crossing.
        assert!((86399..=86400).contains(&exchange.response.refresh_expires_in));
        assert_eq!(
            exchange.response.scope,
            Scope::from_delimited_parts(CLIENT_SCOPE)
        );
        assert!(exchange.is_new_auth);
        assert_eq!(exchange.user_id, UserId("u1".to_string()));
    }

    #[tokio::test]
    async fn requested_scope_cannot_escalate() {
        let fx = fixture(test_client("abc123")).await;
        let mut req = authorize_request("abc123");
        req.scope = Some(Scope::from_delimited_parts("write:admin:everything"));
        let redirect = fx
            .provider
            .authorize(&SessionToken("sess-1".to_string()), req, fx.store.as_ref())
            .await
            .unwrap();
        let exchange = exchange_code(&fx, "abc123", redirect.params.code)
            .await
            .unwrap();
        assert_eq!(
            exchange.response.scope,
            Scope::from_delimited_parts(CLIENT_SCOPE)
        );
    }

    #[tokio::test]
    async fn code_is_single_use() {
        let fx = fixture(test_client("abc123")).await;
        let code = obtain_code(&fx, "abc123").await;

        exchange_code(&fx, "abc123", code.clone()).await.unwrap();
        let second = exchange_code(&fx, "abc123", code).await;
        assert_eq!(second.unwrap_err(), Error::InvalidGrant);
    }

    #[tokio::test]
    async fn concurrent_redemption_has_exactly_one_winner() {
        let fx = fixture(test_client("abc123")).await;
        let code = obtain_code(&fx, "abc123").await;

        let (a, b) = tokio::join!(
            exchange_code(&fx, "abc123", code.clone()),
            exchange_code(&fx, "abc123", code)
        );

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        let loser = if a.is_err() { a } else { b };
        assert_eq!(loser.unwrap_err(), Error::InvalidGrant);
    }

    #[tokio::test]
    async fn redirect_uri_must_match_code() {
        let fx = fixture(test_client("abc123")).await;
        let code = obtain_code(&fx, "abc123").await;

        let result = fx
            .provider
            .token(
                credentials("abc123"),
                TokenRequest::AuthorizationCode(AuthorizationCodeTokenRequest {
                    code,
                    redirect_uri: RedirectUri("https://evil.example/cb".to_string()),
                }),
            )
            .await;
        assert_eq!(result.unwrap_err(), Error::InvalidGrant);

        // No tokens were issued for the failed exchange.
        let refresh = fx
            .provider
            .token(
                credentials("abc123"),
                TokenRequest::RefreshToken(RefreshTokenRequest {
                    refresh_token: RefreshToken("anything".to_string()),
                }),
            )
            .await;
        assert_eq!(refresh.unwrap_err(), Error::InvalidGrant);
    }

    #[tokio::test]
    async fn wrong_secret_is_invalid_client() {
        let fx = fixture(test_client("abc123")).await;
        let code = obtain_code(&fx, "abc123").await;

        let mut creds = credentials("abc123");
        creds.client_secret = ClientSecret("wrong".to_string());
        let result = fx
            .provider
            .token(
                creds,
                TokenRequest::AuthorizationCode(AuthorizationCodeTokenRequest {
                    code,
                    redirect_uri: RedirectUri("https://app.example/cb".to_string()),
                }),
            )
            .await;
        assert_eq!(result.unwrap_err(), Error::InvalidClient);
    }

    #[tokio::test]
    async fn refresh_rotates_and_revokes() {
        let fx = fixture(test_client("abc123")).await;
        let code = obtain_code(&fx, "abc123").await;
        let first = exchange_code(&fx, "abc123", code).await.unwrap();

        let old_refresh = first.response.refresh_token.clone();
        let second = fx
            .provider
            .token(
                credentials("abc123"),
                TokenRequest::RefreshToken(RefreshTokenRequest {
                    refresh_token: old_refresh.clone(),
                }),
            )
            .await
            .unwrap();

        assert_eq!(second.response.expires_in, 3600);
        assert_eq!(second.response.scope, first.response.scope);
        assert!(!second.is_new_auth);

        // The rotated-out token cannot be used again.
        let replay = fx
            .provider
            .token(
                credentials("abc123"),
                TokenRequest::RefreshToken(RefreshTokenRequest {
                    refresh_token: old_refresh,
                }),
            )
            .await;
        assert_eq!(replay.unwrap_err(), Error::InvalidGrant);
    }

    #[tokio::test]
    async fn client_lifetime_overrides_apply() {
        let mut client = test_client("abc123");
        client.access_token_lifetime = Some(120);
        client.refresh_token_lifetime = Some(600);
        let fx = fixture(client).await;

        let code = obtain_code(&fx, "abc123").await;
        let exchange = exchange_code(&fx, "abc123", code).await.unwrap();
        assert_eq!(exchange.response.expires_in, 120);
        assert!((599..=600).contains(&exchange.response.refresh_expires_in));
    }

    #[tokio::test]
    async fn refresh_never_outlived_by_access() {
        let mut client = test_client("abc123");
        client.access_token_lifetime = Some(7200);
        client.refresh_token_lifetime = Some(60);
        let fx = fixture(client).await;

        let code = obtain_code(&fx, "abc123").await;
        let exchange = exchange_code(&fx, "abc123", code).await.unwrap();
        assert!((7199..=7200).contains(&exchange.response.refresh_expires_in));
    }

    #[tokio::test]
    async fn authenticate_resolves_user_and_checks_scope() {
        let fx = fixture(test_client("abc123")).await;
        let code = obtain_code(&fx, "abc123").await;
        let exchange = exchange_code(&fx, "abc123", code).await.unwrap();

        let bearer = BearerToken(exchange.response.access_token.0.clone());
        let ctx = fx
            .provider
            .authenticate(&bearer, "/user/basicinfo", "GET")
            .await
            .unwrap();
        assert_eq!(ctx.user_id, UserId("u1".to_string()));

        let denied = fx
            .provider
            .authenticate(&bearer, "/projects/:projectID/files/:fileID", "GET")
            .await;
        assert_eq!(denied.unwrap_err(), Error::InsufficientScope);
    }

    #[tokio::test]
    async fn expired_access_token_is_invalid_token() {
        let fx = fixture(test_client("abc123")).await;
        let now = UnixTime::now();
        let pair = TokenPair {
            access: AccessTokenData {
                token: AccessToken("expired".to_string()),
                expires_at: UnixTime(now.0 - 10),
                issued_at: UnixTime(now.0 - 3600),
                scope: Scope::from_delimited_parts(CLIENT_SCOPE),
                client_id: ClientId("abc123".to_string()),
                user_id: UserId("u1".to_string()),
            },
            refresh: RefreshTokenData {
                token: RefreshToken("rt".to_string()),
                expires_at: now.plus_secs(60),
                issued_at: UnixTime(now.0 - 3600),
                scope: Scope::from_delimited_parts(CLIENT_SCOPE),
                client_id: ClientId("abc123".to_string()),
                user_id: UserId("u1".to_string()),
            },
        };
        fx.store.save_token_pair(pair).await.unwrap();

        let result = fx
            .provider
            .authenticate(&BearerToken("expired".to_string()), "/user/basicinfo", "GET")
            .await;
        assert_eq!(result.unwrap_err(), Error::InvalidToken);
    }

    #[tokio::test]
    async fn missing_token_is_invalid_token() {
        let fx = fixture(test_client("abc123")).await;
        let result = fx
            .provider
            .authenticate(&BearerToken("nope".to_string()), "/user/basicinfo", "GET")
            .await;
        assert_eq!(result.unwrap_err(), Error::InvalidToken);
    }

    #[tokio::test]
    async fn scope_change_forces_reconsent() {
        let fx = fixture(test_client("abc123")).await;

        // First grant records the authorization.
        let code = obtain_code(&fx, "abc123").await;
        let exchange = exchange_code(&fx, "abc123", code).await.unwrap();
        assert!(exchange.is_new_auth);
        fx.store
            .record_authorization(&exchange.user_id, &exchange.client_id)
            .await
            .unwrap();

        // Same scopes: the next grant is not a new authorization.
        let code = obtain_code(&fx, "abc123").await;
        let exchange = exchange_code(&fx, "abc123", code).await.unwrap();
        assert!(!exchange.is_new_auth);

        // An administrator updates the client's scopes afterwards.
        let mut updated = test_client("abc123");
        updated.scopes_last_updated = UnixTime::now().plus_secs(60);
        fx.store.add_client(updated).await;

        let code = obtain_code(&fx, "abc123").await;
        let exchange = exchange_code(&fx, "abc123", code).await.unwrap();
        assert!(exchange.is_new_auth);
    }

    #[tokio::test]
    async fn denied_consent_issues_no_code() {
        struct Deny;

        #[async_trait::async_trait]
        impl ConsentResolver for Deny {
            async fn resource_owner(
                &self,
                _session: &SessionToken,
            ) -> Result<ResourceOwner, Error> {
                Ok(ResourceOwner {
                    user_id: UserId("u1".to_string()),
                    authorized_apps: Vec::new(),
                })
            }

            async fn approve(
                &self,
                _owner: &ResourceOwner,
                _client: &Client,
                _is_new_auth: bool,
            ) -> Result<bool, Error> {
                Ok(false)
            }

            async fn record_authorization(
                &self,
                _user_id: &UserId,
                _client_id: &ClientId,
            ) -> Result<(), Error> {
                Ok(())
            }
        }

        let fx = fixture(test_client("abc123")).await;
        let result = fx
            .provider
            .authorize(
                &SessionToken("sess-1".to_string()),
                authorize_request("abc123"),
                &Deny,
            )
            .await;
        assert_eq!(result.unwrap_err(), Error::AccessDenied);
    }

    #[tokio::test]
    async fn mismatched_redirect_uri_on_authorize_is_invalid_request() {
        let fx = fixture(test_client("abc123")).await;
        let mut req = authorize_request("abc123");
        req.redirect_uri = Some(RedirectUri("https://evil.example/cb".to_string()));
        let result = fx
            .provider
            .authorize(&SessionToken("sess-1".to_string()), req, fx.store.as_ref())
            .await;
        assert_eq!(result.unwrap_err(), Error::InvalidRequest);
    }

    #[tokio::test]
    async fn disallowed_grant_type_is_unauthorized_client() {
        let mut client = test_client("abc123");
        client.grants = vec![GrantType::AuthorizationCode];
        let fx = fixture(client).await;

        let result = fx
            .provider
            .token(
                credentials("abc123"),
                TokenRequest::RefreshToken(RefreshTokenRequest {
                    refresh_token: RefreshToken("rt".to_string()),
                }),
            )
            .await;
        assert_eq!(result.unwrap_err(), Error::UnauthorizedClient);
    }
}
