//! Request identity and the permission hook.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::header::AUTHORIZATION;
use http::HeaderMap;

/// Decides whether a user may invoke a wire path within an application
/// scope: `(app, user, path) -> allowed`. The user is `None` only for
/// anonymous requests a debug server lets through.
pub type PermissionHook = Arc<dyn Fn(&str, Option<&str>, &str) -> bool + Send + Sync>;

/// Username from a Basic Authorization header. Missing headers, other
/// schemes, undecodable credentials, and empty usernames all yield `None`.
pub fn basic_identity(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = strip_basic_scheme(header)?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (user, _password) = credentials.split_once(':')?;
    if user.is_empty() {
        return None;
    }
    Some(user.to_string())
}

fn strip_basic_scheme(header: &str) -> Option<&str> {
    let header = header.trim_start();
    let scheme = header.get(..6)?;
    if !scheme.eq_ignore_ascii_case("basic ") {
        return None;
    }
    header.get(6..).map(str::trim_start)
}
