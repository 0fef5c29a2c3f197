pub mod error;

use crate::auth::{ClientCredentials, Error};
use crate::core::types::{BearerToken, ClientId, ClientSecret};
use http_basic_auth::Credential as BasicCredentials;
use warp::{Filter, Rejection};

use self::error::ApiRejection;

/// A form body with client credentials either inline or via HTTP Basic.
#[derive(serde::Deserialize)]
pub struct WithCredentials<T> {
    #[serde(flatten)]
    credentials: ClientCredentials,
    #[serde(flatten)]
    body: T,
}

impl<T> From<(BasicCredentials, T)> for WithCredentials<T> {
    fn from((credentials, value): (BasicCredentials, T)) -> Self {
        let credentials = ClientCredentials {
            client_id: ClientId(credentials.user_id),
            client_secret: ClientSecret(credentials.password),
        };

        Self::join(credentials, value)
    }
}

impl<T> WithCredentials<T> {
    pub fn join(credentials: ClientCredentials, body: T) -> Self {
        Self { credentials, body }
    }
    pub fn split(self) -> (ClientCredentials, T) {
        (self.credentials, self.body)
    }
}

pub fn body_with_credentials<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = ((ClientCredentials, T),), Error = Rejection> + Clone {
    let basic = warp::header::<BasicCredentials>("Authorization")
        .and(warp::body::form::<T>())
        .map(|c, b| (c, b).into());
    let body = warp::body::form::<WithCredentials<T>>();
    basic
        .or(body)
        .unify()
        .or_else(|_| async move {
            Err(warp::reject::custom(ApiRejection(Error::InvalidClient)))
        })
        .map(|w: WithCredentials<T>| w.split())
}

/// Extracts the bearer token guarding a resource endpoint. A missing or
/// malformed header fails the same way an unknown token does.
pub fn bearer() -> impl Filter<Extract = (BearerToken,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(|header: Option<String>| async move {
        // Auth scheme names are case-insensitive (RFC 7235).
        let token = header.as_deref().and_then(|s| {
            let (scheme, token) = s.split_once(' ')?;
            scheme.eq_ignore_ascii_case("Bearer").then(|| token)
        });
        match token {
            Some(token) if !token.is_empty() => Ok(BearerToken(token.to_string())),
            _ => Err(warp::reject::custom(ApiRejection(Error::InvalidToken))),
        }
    })
}
