//! Cookie helpers.

use crate::{Error, Result};
use httpdate::fmt_http_date;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use warden_api::RequestContext;

/// SameSite attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// SameSite=Strict
    Strict,
    /// SameSite=Lax
    Lax,
    /// SameSite=None
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// How the `Secure` attribute is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CookieSecurePolicy {
    /// Secure iff the request that issues the cookie came over TLS.
    #[default]
    SameAsRequest,
    /// Always Secure.
    Always,
    /// Never Secure.
    None,
}

/// Concrete attributes of one cookie, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    /// Cookie path.
    pub path: String,

    /// Optional cookie domain.
    pub domain: Option<String>,

    /// Send on HTTPS only.
    pub secure: bool,

    /// Not accessible to JS.
    pub http_only: bool,

    /// SameSite attribute.
    pub same_site: SameSite,

    /// Absolute expiry.
    pub expires: Option<SystemTime>,

    /// Max-Age.
    pub max_age: Option<Duration>,

    /// Required for the site to work; exempt from consent gating.
    pub is_essential: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
            expires: None,
            max_age: None,
            is_essential: false,
        }
    }
}

/// Configuration from which per-request [`CookieOptions`] are computed.
///
/// Unset `path` scopes the cookie to the request's path base, optionally
/// extended by an additional path supplied by the owner of the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieBuilder {
    /// Cookie name, or name prefix for builders that append to it.
    pub name: Option<String>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub http_only: bool,
    pub same_site: SameSite,
    pub secure_policy: CookieSecurePolicy,
    /// Lifetime relative to the `expires_from` passed to `build`.
    pub expiration: Option<Duration>,
    pub max_age: Option<Duration>,
    pub is_essential: bool,
}

impl Default for CookieBuilder {
    fn default() -> Self {
        Self {
            name: None,
            path: None,
            domain: None,
            http_only: true,
            same_site: SameSite::Lax,
            secure_policy: CookieSecurePolicy::SameAsRequest,
            expiration: None,
            max_age: None,
            is_essential: false,
        }
    }
}

impl CookieBuilder {
    /// Compute the options for `ctx`.
    pub fn build(&self, ctx: &RequestContext, expires_from: SystemTime) -> CookieOptions {
        self.build_scoped(ctx, expires_from, None)
    }

    /// Compute the options for `ctx`, scoping an unset path to
    /// `path_base + additional_path`.
    pub fn build_scoped(
        &self,
        ctx: &RequestContext,
        expires_from: SystemTime,
        additional_path: Option<&str>,
    ) -> CookieOptions {
        let path = match &self.path {
            Some(p) => p.clone(),
            None => scoped_path(&ctx.path_base, additional_path),
        };

        let secure = match self.secure_policy {
            CookieSecurePolicy::Always => true,
            CookieSecurePolicy::SameAsRequest => ctx.is_https,
            CookieSecurePolicy::None => false,
        };

        CookieOptions {
            path,
            domain: self.domain.clone(),
            secure,
            http_only: self.http_only,
            same_site: self.same_site,
            expires: self.expiration.and_then(|e| expires_from.checked_add(e)),
            max_age: self.max_age,
            is_essential: self.is_essential,
        }
    }
}

fn scoped_path(path_base: &str, additional_path: Option<&str>) -> String {
    let path = format!("{path_base}{}", additional_path.unwrap_or(""));
    if path.is_empty() { "/".to_string() } else { path }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Cookie("cookie name is empty".to_string()));
    }
    // RFC 6265 token: no separators, whitespace or controls.
    if let Some(c) = name
        .chars()
        .find(|c| c.is_ascii_control() || c.is_whitespace() || "()<>@,;:\\\"/[]?={}".contains(*c))
    {
        return Err(Error::Cookie(format!(
            "cookie name {name:?} contains invalid character {c:?}"
        )));
    }
    Ok(())
}

fn check_value(value: &str) -> Result<()> {
    if value
        .chars()
        .any(|c| c.is_ascii_control() || c.is_whitespace() || matches!(c, '"' | ',' | ';' | '\\'))
    {
        return Err(Error::Cookie("cookie value contains invalid characters".to_string()));
    }
    Ok(())
}

/// 9999-12-31T23:59:59Z, the last instant an HTTP-date can express.
const LAST_HTTP_DATE_SECS: u64 = 253_402_300_799;

fn http_date(at: SystemTime) -> Result<String> {
    match at.duration_since(UNIX_EPOCH) {
        Ok(since_epoch) if since_epoch.as_secs() <= LAST_HTTP_DATE_SECS => Ok(fmt_http_date(at)),
        _ => Err(Error::Cookie(
            "cookie expiry is outside the HTTP-date range".to_string(),
        )),
    }
}

fn push_attributes(parts: &mut Vec<String>, opts: &CookieOptions) {
    parts.push(format!("Path={}", opts.path));

    if let Some(domain) = &opts.domain {
        parts.push(format!("Domain={domain}"));
    }

    if opts.secure {
        parts.push("Secure".to_string());
    }
    if opts.http_only {
        parts.push("HttpOnly".to_string());
    }

    parts.push(format!("SameSite={}", opts.same_site.as_str()));
}

/// Build a `Set-Cookie` header value.
pub fn build_set_cookie(name: &str, value: &str, opts: &CookieOptions) -> Result<String> {
    check_name(name)?;
    check_value(value)?;

    let mut parts: Vec<String> = Vec::new();
    parts.push(format!("{name}={value}"));
    push_attributes(&mut parts, opts);

    if let Some(max_age) = opts.max_age {
        parts.push(format!("Max-Age={}", max_age.as_secs()));
    }

    // Expires for older clients that ignore Max-Age.
    let expires = opts
        .expires
        .or_else(|| opts.max_age.and_then(|m| SystemTime::now().checked_add(m)));
    if let Some(expires) = expires {
        parts.push(format!("Expires={}", http_date(expires)?));
    }

    Ok(parts.join("; "))
}

/// Build a `Set-Cookie` header value that clears the cookie.
///
/// Path and domain must match the ones the cookie was set with.
pub fn build_clear_cookie(name: &str, opts: &CookieOptions) -> Result<String> {
    check_name(name)?;

    let mut parts: Vec<String> = Vec::new();
    parts.push(format!("{name}="));
    push_attributes(&mut parts, opts);
    parts.push("Max-Age=0".to_string());
    parts.push(format!("Expires={}", fmt_http_date(UNIX_EPOCH)));

    Ok(parts.join("; "))
}
