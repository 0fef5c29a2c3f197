//! Maps resource endpoints to canonical scope entries and checks granted
//! scope sets against them.

use crate::core::types::Scope;

/// Canonical scope for an endpoint: `{access}:{path segments joined by ':'}`
/// with parameterized segments (leading `:`) replaced by `*`. `access` is
/// `read` for GET, `write` for POST/PUT/DELETE, `unknown` otherwise.
pub fn endpoint_to_scope(path: &str, method: &str) -> String {
    let access = if method.eq_ignore_ascii_case("GET") {
        "read"
    } else if method.eq_ignore_ascii_case("POST")
        || method.eq_ignore_ascii_case("PUT")
        || method.eq_ignore_ascii_case("DELETE")
    {
        "write"
    } else {
        "unknown"
    };

    let mut scope = String::from(access);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        scope.push(':');
        if segment.starts_with(':') {
            scope.push('*');
        } else {
            scope.push_str(segment);
        }
    }
    scope
}

/// Exact membership check against the granted set. No wildcard or
/// hierarchical matching happens here; `*` only ever appears because the
/// endpoint mapping produced it for a parameterized segment.
pub fn scope_satisfied(granted: &Scope, required: &str) -> bool {
    granted.contains(required)
}
