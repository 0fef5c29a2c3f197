//! Decides whether an authorize call represents a first-time consent or a
//! re-consent after the client's registered scopes changed.

use crate::core::models::AuthorizedApp;
use crate::core::types::{ClientId, UnixTime};

pub fn find_authorization<'a>(
    apps: &'a [AuthorizedApp],
    client_id: &ClientId,
) -> Option<&'a AuthorizedApp> {
    apps.iter().find(|a| &a.client_id == client_id)
}

/// True when the user has never authorized the client, or authorized it
/// before the client's scopes last changed.
pub fn is_new_auth(prior: Option<&AuthorizedApp>, scopes_last_updated: UnixTime) -> bool {
    match prior {
        None => true,
        Some(app) => app.authorized_at < scopes_last_updated,
    }
}
