//! Bundled store. The platform's document database sits behind the
//! `ClientRegistry`/`TokenStore` traits; this in-memory implementation
//! backs single-process deployments and the test suite. One mutex guards
//! all state, which gives revocation its delete-exactly-one atomicity.

use std::collections::HashMap;
use std::path::Path;

use tokio::sync::Mutex;

use crate::auth::{ClientRegistry, ConsentResolver, Error, ResourceOwner, TokenStore};
use crate::core::models::{
    AccessTokenData, AuthCodeData, AuthorizedApp, Client, RefreshTokenData, TokenPair,
};
use crate::core::types::{
    AccessToken, AuthCode, ClientId, ClientSecret, RefreshToken, SessionToken, UnixTime, UserId,
};
use crate::util::hash::HashingService;

use async_trait::async_trait;

#[derive(Debug)]
pub struct MemoryStore {
    hasher: HashingService,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    clients: HashMap<ClientId, Client>,
    access_tokens: HashMap<AccessToken, AccessTokenData>,
    refresh_tokens: HashMap<RefreshToken, RefreshTokenData>,
    codes: HashMap<AuthCode, AuthCodeData>,
    sessions: HashMap<SessionToken, UserId>,
    authorizations: HashMap<UserId, Vec<AuthorizedApp>>,
}

impl MemoryStore {
    pub fn new(hasher: HashingService) -> Self {
        Self {
            hasher,
            state: Mutex::new(State::default()),
        }
    }

    /// Loads the registered clients from a JSON array, as written by
    /// `kouza-util new-client`.
    pub fn from_clients_file(path: impl AsRef<Path>, hasher: HashingService) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::invalid_argument(format!("failed to read clients file: {}", e)))?;
        let clients: Vec<Client> = serde_json::from_str(&contents)
            .map_err(|e| Error::invalid_argument(format!("bad clients file: {}", e)))?;

        let store = Self::new(hasher);
        {
            let mut state = store
                .state
                .try_lock()
                .map_err(|_| Error::invalid_argument("store lock held during construction"))?;
            for client in clients {
                state.clients.insert(client.client_id.clone(), client);
            }
        }
        Ok(store)
    }

    pub async fn add_client(&self, client: Client) {
        let mut state = self.state.lock().await;
        state.clients.insert(client.client_id.clone(), client);
    }

    /// Registers an established user session, normally bridged in from the
    /// platform's session layer.
    pub async fn add_session(&self, session: SessionToken, user_id: UserId) {
        let mut state = self.state.lock().await;
        state.sessions.insert(session, user_id);
    }
}

#[async_trait]
impl ClientRegistry for MemoryStore {
    async fn get_client(
        &self,
        client_id: &ClientId,
        client_secret: Option<&ClientSecret>,
    ) -> Result<Option<Client>, Error> {
        let state = self.state.lock().await;
        let client = match state.clients.get(client_id) {
            Some(client) => client,
            None => return Ok(None),
        };

        if let Some(secret) = client_secret {
            if !self.hasher.verify(secret, &client.secret)? {
                // A bad secret looks exactly like an unknown client.
                return Ok(None);
            }
        }

        Ok(Some(client.clone()))
    }

    async fn touch_last_used(&self, client_id: &ClientId) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if let Some(client) = state.clients.get_mut(client_id) {
            client.last_used = UnixTime::now();
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn save_token_pair(&self, pair: TokenPair) -> Result<TokenPair, Error> {
        // Both halves land under one lock acquisition; no half-committed
        // pair is ever visible to another operation.
        let mut state = self.state.lock().await;
        state
            .access_tokens
            .insert(pair.access.token.clone(), pair.access.clone());
        state
            .refresh_tokens
            .insert(pair.refresh.token.clone(), pair.refresh.clone());
        Ok(pair)
    }

    async fn get_access_token(
        &self,
        token: &AccessToken,
    ) -> Result<Option<AccessTokenData>, Error> {
        let state = self.state.lock().await;
        Ok(state.access_tokens.get(token).cloned())
    }

    async fn get_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<Option<RefreshTokenData>, Error> {
        let state = self.state.lock().await;
        Ok(state.refresh_tokens.get(token).cloned())
    }

    async fn save_authorization_code(&self, data: AuthCodeData) -> Result<AuthCodeData, Error> {
        let mut state = self.state.lock().await;
        state.codes.insert(data.code.clone(), data.clone());
        Ok(data)
    }

    async fn get_authorization_code(
        &self,
        code: &AuthCode,
    ) -> Result<Option<AuthCodeData>, Error> {
        let state = self.state.lock().await;
        Ok(state.codes.get(code).cloned())
    }

    async fn revoke_refresh_token(&self, token: &RefreshToken) -> Result<bool, Error> {
        let mut state = self.state.lock().await;
        Ok(state.refresh_tokens.remove(token).is_some())
    }

    async fn revoke_authorization_code(&self, code: &AuthCode) -> Result<bool, Error> {
        let mut state = self.state.lock().await;
        Ok(state.codes.remove(code).is_some())
    }

    async fn clean_up(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        state.codes.retain(|_, c| !c.expires_at.is_past());
        state.access_tokens.retain(|_, t| !t.expires_at.is_past());
        state.refresh_tokens.retain(|_, t| !t.expires_at.is_past());
        Ok(())
    }
}

#[async_trait]
impl ConsentResolver for MemoryStore {
    async fn resource_owner(&self, session: &SessionToken) -> Result<ResourceOwner, Error> {
        let state = self.state.lock().await;
        let user_id = state
            .sessions
            .get(session)
            .cloned()
            .ok_or(Error::AccessDenied)?;
        let authorized_apps = state
            .authorizations
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        Ok(ResourceOwner {
            user_id,
            authorized_apps,
        })
    }

    async fn approve(
        &self,
        _owner: &ResourceOwner,
        _client: &Client,
        _is_new_auth: bool,
    ) -> Result<bool, Error> {
        // The platform UI presents the consent screen before submitting the
        // authorize request, so a resolved session counts as approval here.
        Ok(true)
    }

    async fn record_authorization(
        &self,
        user_id: &UserId,
        client_id: &ClientId,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let apps = state.authorizations.entry(user_id.clone()).or_default();
        match apps.iter_mut().find(|a| &a.client_id == client_id) {
            Some(app) => app.authorized_at = UnixTime::now(),
            None => apps.push(AuthorizedApp {
                client_id: client_id.clone(),
                authorized_at: UnixTime::now(),
            }),
        }
        Ok(())
    }
}
