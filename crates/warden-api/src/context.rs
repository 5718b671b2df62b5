use http::header::{AsHeaderName, COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::Principal;

/// Per-request state shared with the host framework.
///
/// Holds the request facts Warden reads (path, TLS, headers, cookies), the
/// current user, and the `Set-Cookie` values it wants written back.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub path_base: String,
    pub path: String,
    pub is_https: bool,
    pub headers: HeaderMap,
    pub user: Principal,
    response_cookies: Vec<String>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            path_base: String::new(),
            path: "/".to_string(),
            is_https: false,
            headers: HeaderMap::new(),
            user: Principal::anonymous(),
            response_cookies: Vec::new(),
        }
    }
}

impl RequestContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_path_base(mut self, path_base: impl Into<String>) -> Self {
        self.path_base = path_base.into();
        self
    }

    #[must_use]
    pub fn with_https(mut self, is_https: bool) -> Self {
        self.is_https = is_https;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: Principal) -> Self {
        self.user = user;
        self
    }

    /// First value of a header, if it is visible ASCII.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Value of a request cookie, searched across every `Cookie` header.
    pub fn request_cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }

    pub fn append_response_cookie(&mut self, set_cookie: String) {
        self.response_cookies.push(set_cookie);
    }

    /// `Set-Cookie` values queued for the response, in append order.
    pub fn response_cookies(&self) -> &[String] {
        &self.response_cookies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_cookies_from_all_cookie_headers() {
        let ctx = RequestContext::new("/signin")
            .with_header(COOKIE, HeaderValue::from_static("a=1; b=2"))
            .with_header(COOKIE, HeaderValue::from_static("c=3"));
        assert_eq!(ctx.request_cookie("b"), Some("2"));
        assert_eq!(ctx.request_cookie("c"), Some("3"));
        assert_eq!(ctx.request_cookie("d"), None);
    }

    #[test]
    fn default_user_is_anonymous() {
        let ctx = RequestContext::default();
        assert!(!ctx.user.is_authenticated());
        assert_eq!(ctx.path, "/");
    }
}
