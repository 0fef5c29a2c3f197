use crate::auth::Redirect;
use crate::core::types::RedirectUri;
use url::Url;
use warp::reply::{Reply, Response};

fn append_params(r: &RedirectUri, p: impl serde::Serialize) -> Option<Url> {
    let mut url = Url::parse(&r.0).ok()?;
    let new_qs = serde_urlencoded::to_string(p).ok()?;
    let pairs = form_urlencoded::parse(new_qs.as_bytes());
    url.query_pairs_mut().extend_pairs(pairs);
    Some(url)
}

/// Internal redirects become real 302 responses here: the target lands in
/// the `Location` header and nothing else of the internal representation
/// leaks into the response. A client registered without a redirect URI gets
/// the parameters back as a JSON body instead.
impl<T: serde::Serialize + Send> Reply for Redirect<T> {
    fn into_response(self) -> Response {
        if self.uri.0.is_empty() {
            return warp::reply::json(&self.params).into_response();
        }
        match append_params(&self.uri, self.params) {
            Some(url) => warp::http::Response::builder()
                .header("Location", url.to_string())
                .status(302)
                .body(warp::hyper::Body::empty())
                .unwrap_or_else(|_| {
                    warp::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }),
            // A client with an unparseable redirect URI is a registration
            // problem, not something to bounce the user agent at.
            None => warp::http::StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}
