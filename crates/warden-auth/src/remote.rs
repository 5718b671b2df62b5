//! Options for redirect-based (remote) authentication handlers.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use once_cell::sync::Lazy;
use warden_api::{MAX_COOKIE_LIFETIME_SECS, RequestContext};

use crate::cookie::{CookieBuilder, CookieOptions, CookieSecurePolicy, SameSite};
use crate::events::{DefaultRemoteEvents, RemoteAuthenticationEvents};
use crate::{Error, Result};

/// Name prefix of correlation cookies.
pub const CORRELATION_COOKIE_PREFIX: &str = ".Warden.Correlation.";
pub const DEFAULT_BACKCHANNEL_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_REMOTE_AUTHENTICATION_TIMEOUT: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_RETURN_URL_PARAMETER: &str = "ReturnUrl";

static DEFAULT_SIGN_IN_SCHEME: Lazy<RwLock<Option<String>>> = Lazy::new(|| RwLock::new(None));

/// Set the process-wide sign-in scheme used by options that leave
/// `sign_in_scheme` unset.
///
/// Must run before remote options are validated; the runtime does this while
/// loading its configuration.
pub fn set_default_sign_in_scheme(scheme: Option<String>) {
    let mut guard = DEFAULT_SIGN_IN_SCHEME
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *guard = scheme.filter(|s| !s.is_empty());
}

/// The process-wide sign-in scheme, if one was set.
pub fn default_sign_in_scheme() -> Option<String> {
    DEFAULT_SIGN_IN_SCHEME
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn default_correlation_cookie() -> CookieBuilder {
    CookieBuilder {
        name: Some(CORRELATION_COOKIE_PREFIX.to_string()),
        http_only: true,
        same_site: SameSite::None,
        secure_policy: CookieSecurePolicy::SameAsRequest,
        is_essential: true,
        ..CookieBuilder::default()
    }
}

/// Configuration of one remote authentication scheme.
#[derive(Clone)]
pub struct RemoteAuthenticationOptions {
    /// Path the remote provider redirects back to, within the app's path base.
    pub callback_path: String,

    /// Timeout for calls the handler makes to the provider.
    pub backchannel_timeout: Duration,

    /// How long a handshake may take; bounds the correlation cookie lifetime.
    pub remote_authentication_timeout: Duration,

    /// Scheme that persists the resulting identity. Falls back to the
    /// process-wide default.
    pub sign_in_scheme: Option<String>,

    /// Keep provider tokens in the resulting authentication properties.
    pub save_tokens: bool,

    /// Where to send users who declined at the provider.
    pub access_denied_path: Option<String>,

    /// Query parameter carrying the return URL on access-denied redirects.
    pub return_url_parameter: String,

    /// Correlation cookie settings; `name` is the cookie name prefix.
    pub correlation_cookie: CookieBuilder,

    pub events: Arc<dyn RemoteAuthenticationEvents>,
}

impl Default for RemoteAuthenticationOptions {
    fn default() -> Self {
        Self {
            callback_path: String::new(),
            backchannel_timeout: DEFAULT_BACKCHANNEL_TIMEOUT,
            remote_authentication_timeout: DEFAULT_REMOTE_AUTHENTICATION_TIMEOUT,
            sign_in_scheme: None,
            save_tokens: false,
            access_denied_path: None,
            return_url_parameter: DEFAULT_RETURN_URL_PARAMETER.to_string(),
            correlation_cookie: default_correlation_cookie(),
            events: Arc::new(DefaultRemoteEvents),
        }
    }
}

impl fmt::Debug for RemoteAuthenticationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAuthenticationOptions")
            .field("callback_path", &self.callback_path)
            .field("backchannel_timeout", &self.backchannel_timeout)
            .field(
                "remote_authentication_timeout",
                &self.remote_authentication_timeout,
            )
            .field("sign_in_scheme", &self.sign_in_scheme)
            .field("save_tokens", &self.save_tokens)
            .field("access_denied_path", &self.access_denied_path)
            .field("return_url_parameter", &self.return_url_parameter)
            .field("correlation_cookie", &self.correlation_cookie)
            .finish_non_exhaustive()
    }
}

impl RemoteAuthenticationOptions {
    pub fn new(callback_path: impl Into<String>) -> Self {
        Self {
            callback_path: callback_path.into(),
            ..Self::default()
        }
    }

    /// Check the options once, at startup.
    ///
    /// # Errors
    ///
    /// [`Error::MissingOption`] when `callback_path` is empty, and
    /// [`Error::InvalidOptions`] when the handshake timeout or a correlation
    /// cookie lifetime exceeds [`MAX_COOKIE_LIFETIME_SECS`].
    pub fn validate(&self) -> Result<()> {
        if self.callback_path.is_empty() {
            return Err(Error::MissingOption("callback_path"));
        }

        let max = Duration::from_secs(MAX_COOKIE_LIFETIME_SECS);
        let lifetimes = [
            (
                "remote_authentication_timeout",
                Some(self.remote_authentication_timeout),
            ),
            ("correlation_cookie.expiration", self.correlation_cookie.expiration),
            ("correlation_cookie.max_age", self.correlation_cookie.max_age),
        ];
        for (option, value) in lifetimes {
            if value.is_some_and(|v| v > max) {
                return Err(Error::InvalidOptions(format!(
                    "'{option}' must not exceed {MAX_COOKIE_LIFETIME_SECS} seconds"
                )));
            }
        }
        Ok(())
    }

    /// [`validate`](Self::validate), plus checks that need the scheme name.
    ///
    /// # Errors
    ///
    /// Also [`Error::InvalidOptions`] when the scheme would sign in to itself.
    pub fn validate_for_scheme(&self, scheme: &str) -> Result<()> {
        self.validate()?;
        if self.resolved_sign_in_scheme().as_deref() == Some(scheme) {
            return Err(Error::InvalidOptions(format!(
                "the sign-in scheme of remote scheme '{scheme}' cannot be set to itself"
            )));
        }
        Ok(())
    }

    /// Sign-in scheme, falling back to the process-wide default at call time.
    pub fn resolved_sign_in_scheme(&self) -> Option<String> {
        self.sign_in_scheme
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(default_sign_in_scheme)
    }

    /// Whether `ctx` is a request to this handler's callback path.
    pub fn is_callback_request(&self, ctx: &RequestContext) -> bool {
        !self.callback_path.is_empty() && ctx.path == self.callback_path
    }

    pub fn correlation_cookie(&self) -> CorrelationCookieBuilder<'_> {
        CorrelationCookieBuilder { options: self }
    }
}

/// Correlation cookie settings bound to their options, for read access to
/// the callback path and handshake timeout.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationCookieBuilder<'a> {
    options: &'a RemoteAuthenticationOptions,
}

impl CorrelationCookieBuilder<'_> {
    /// Cookie name prefix.
    pub fn prefix(&self) -> &str {
        self.options
            .correlation_cookie
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(CORRELATION_COOKIE_PREFIX)
    }

    /// Options for a correlation cookie issued at `expires_from`.
    ///
    /// The path is scoped to the callback path. Without a configured
    /// expiration the cookie expires after the remote authentication timeout.
    pub fn build(&self, ctx: &RequestContext, expires_from: SystemTime) -> CookieOptions {
        let builder = &self.options.correlation_cookie;
        let mut opts =
            builder.build_scoped(ctx, expires_from, Some(self.options.callback_path.as_str()));
        if builder.expiration.is_none() && opts.expires.is_none() {
            opts.expires = expires_from.checked_add(self.options.remote_authentication_timeout);
        }
        opts
    }
}
