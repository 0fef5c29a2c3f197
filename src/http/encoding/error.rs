use crate::auth::{Error, ErrorResponse};

use tracing::{event, Level};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

/// Carries a protocol error through warp's rejection machinery so the
/// recovery handler can shape the response.
#[derive(Debug, Clone)]
pub struct ApiRejection(pub Error);

impl warp::reject::Reject for ApiRejection {}

impl From<Error> for ApiRejection {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

pub fn reject(error: Error) -> Rejection {
    warp::reject::custom(ApiRejection(error))
}

/// Maps rejections onto the fixed error table. Server-side detail is
/// logged here and never forwarded to the caller.
pub async fn handle_reject(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(ApiRejection(error)) = err.find::<ApiRejection>() {
        match error {
            Error::InvalidArgument(detail) => {
                event!(Level::ERROR, detail = %detail, "internal error on oauth request");
            }
            Error::Internal(detail) => {
                event!(Level::WARN, detail = %detail, "unrecognized error on oauth request");
            }
            _ => {}
        }
        let status =
            StatusCode::from_u16(error.status()).unwrap_or(StatusCode::BAD_REQUEST);
        let body = warp::reply::json(&ErrorResponse::from(error));
        return Ok(warp::reply::with_status(body, status));
    }

    // Malformed bodies and query strings are client-side bugs.
    if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::InvalidQuery>().is_some()
    {
        let body = warp::reply::json(&ErrorResponse::from(&Error::InvalidRequest));
        return Ok(warp::reply::with_status(body, StatusCode::BAD_REQUEST));
    }

    Err(err)
}
