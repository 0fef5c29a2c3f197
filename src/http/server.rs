use crate::auth::{
    AuthContext, AuthorizationRequest, ClientCredentials, ClientRegistry, ConsentResolver, Error,
    TokenRequest, TokenStore,
};
use crate::core::types::{BearerToken, SessionToken};
use crate::provider::AuthorizationServer;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{event, Level};
use warp::reply::Reply;
use warp::{Filter, Rejection};

use super::encoding::error::{handle_reject, reject};
use super::encoding::{bearer, body_with_credentials};

/// Cookie carrying the opaque session proof established by the platform's
/// authentication layer.
pub const SESSION_COOKIE: &str = "kouza_session";

#[derive(Debug)]
pub struct Server<R, S, C> {
    provider: Arc<AuthorizationServer<R, S>>,
    consent: Arc<C>,
}

impl<R, S, C> Server<R, S, C>
where
    R: ClientRegistry + Send + Sync + 'static,
    S: TokenStore + Send + Sync + 'static,
    C: ConsentResolver + Send + Sync + 'static,
{
    pub fn new(provider: Arc<AuthorizationServer<R, S>>, consent: Arc<C>) -> Self {
        Self { provider, consent }
    }

    pub fn routes(&self) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
        let with_provider = {
            let provider = Arc::clone(&self.provider);
            warp::any().map(move || Arc::clone(&provider))
        };
        let with_consent = {
            let consent = Arc::clone(&self.consent);
            warp::any().map(move || Arc::clone(&consent))
        };

        let token = warp::path!("oauth" / "token")
            .and(warp::post())
            .and(with_provider.clone())
            .and(with_consent.clone())
            .and(body_with_credentials())
            .and_then(
                |provider: Arc<AuthorizationServer<R, S>>,
                 consent: Arc<C>,
                 (credentials, req): (ClientCredentials, TokenRequest)| async move {
                    let exchange = provider
                        .token(credentials, req)
                        .await
                        .map_err(reject)?;

                    if exchange.is_new_auth {
                        // The grant already stands; a failed consent record
                        // costs a future re-consent, nothing more.
                        if let Err(e) = consent
                            .record_authorization(&exchange.user_id, &exchange.client_id)
                            .await
                        {
                            event!(
                                Level::WARN,
                                user_id = %exchange.user_id.0,
                                client_id = %exchange.client_id.0,
                                error = %e,
                                "failed to record user authorization"
                            );
                        }
                    }

                    Ok::<_, Rejection>(warp::reply::json(&exchange.response))
                },
            );

        let authorize = warp::path!("oauth" / "authorize")
            .and(
                warp::get()
                    .and(warp::query::<AuthorizationRequest>())
                    .or(warp::post().and(warp::body::form::<AuthorizationRequest>()))
                    .unify(),
            )
            .and(warp::cookie::optional::<String>(SESSION_COOKIE))
            .and(with_provider.clone())
            .and(with_consent.clone())
            .and_then(
                |req: AuthorizationRequest,
                 session: Option<String>,
                 provider: Arc<AuthorizationServer<R, S>>,
                 consent: Arc<C>| async move {
                    let session = session
                        .map(SessionToken)
                        .ok_or_else(|| reject(Error::AccessDenied))?;
                    provider
                        .authorize(&session, req, consent.as_ref())
                        .await
                        .map(|redirect| redirect.into_response())
                        .map_err(reject)
                },
            );

        token
            .or(authorize)
            .recover(handle_reject)
            .with(warp::log("kouza::http"))
    }

    pub async fn serve(self, addr: SocketAddr) {
        warp::serve(self.routes()).run(addr).await;
    }
}

/// Filter guarding a resource endpoint. `route` is the endpoint's path
/// template with parameterized segments written `:name`, matching how the
/// platform registers its REST routes.
pub fn with_authentication<R, S>(
    provider: Arc<AuthorizationServer<R, S>>,
    route: &'static str,
    method: &'static str,
) -> impl Filter<Extract = (AuthContext,), Error = Rejection> + Clone
where
    R: ClientRegistry + Send + Sync + 'static,
    S: TokenStore + Send + Sync + 'static,
{
    bearer()
        .and(warp::any().map(move || Arc::clone(&provider)))
        .and_then(
            move |token: BearerToken, provider: Arc<AuthorizationServer<R, S>>| async move {
                provider
                    .authenticate(&token, route, method)
                    .await
                    .map_err(reject)
            },
        )
}
