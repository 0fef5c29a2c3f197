/// Protocol error taxonomy. Each variant maps to a fixed HTTP status and
/// wire shape; anything that does not fit the recognized set is carried as
/// `Internal` and surfaced conservatively as a 400 with no detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Server-side misconfiguration or a store that failed/timed out.
    InvalidArgument(String),
    /// Expired, consumed, or mismatched code or refresh token.
    InvalidGrant,
    /// Missing, unknown, or expired access token.
    InvalidToken,
    /// Malformed request shape.
    InvalidRequest,
    /// Bad client credentials.
    InvalidClient,
    /// The client is not allowed to use the requested grant type.
    UnauthorizedClient,
    /// Valid token, insufficient permission for the endpoint.
    InsufficientScope,
    /// The resource owner declined the grant.
    AccessDenied,
    /// Anything unrecognized. Logged server-side, never leaked.
    Internal(String),
}

impl Error {
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::InvalidArgument(detail.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidToken => "invalid_token",
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::InsufficientScope => "insufficient_scope",
            Self::AccessDenied => "access_denied",
            Self::Internal(_) => "server_error",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidArgument(_) => 500,
            Self::InvalidGrant | Self::InvalidToken => 401,
            Self::InvalidRequest | Self::InvalidClient | Self::UnauthorizedClient => 400,
            Self::InsufficientScope => 403,
            Self::AccessDenied | Self::Internal(_) => 400,
        }
    }

    /// Server-side log line for the variants whose detail must never reach
    /// the caller.
    pub fn log_detail(&self) -> Option<&str> {
        match self {
            Self::InvalidArgument(detail) | Self::Internal(detail) => Some(detail),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::error::Error for Error {}

/// The caller-visible error body.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// Set on `invalid_grant` so client UIs can prompt re-authorization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_grant: Option<bool>,
    /// Set on `invalid_token` so clients attempt a refresh exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_token: Option<bool>,
}

impl From<&Error> for ErrorResponse {
    fn from(error: &Error) -> Self {
        Self {
            error: error.name(),
            error_description: None,
            expired_grant: matches!(error, Error::InvalidGrant).then(|| true),
            expired_token: matches!(error, Error::InvalidToken).then(|| true),
        }
    }
}
