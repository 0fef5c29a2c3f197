use crate::core::types::{AuthCode, ClientId, RedirectUri, ResponseType, Scope};

/// Query/body parameters of an authorize call. The `scope` parameter is
/// accepted but ignored: codes are always bound to the client's
/// server-recorded scope, so a tampered request cannot escalate.
#[derive(Debug, serde::Deserialize)]
pub struct AuthorizationRequest {
    pub client_id: ClientId,
    pub redirect_uri: Option<RedirectUri>,
    pub scope: Option<Scope>,
    pub response_type: Option<ResponseType>,
    pub state: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct AuthorizationResponse {
    pub code: AuthCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl AuthorizationResponse {
    pub fn new(code: AuthCode, state: Option<String>) -> Self {
        Self { code, state }
    }
}
