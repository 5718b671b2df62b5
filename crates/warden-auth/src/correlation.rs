//! Correlation of remote authentication callbacks with the challenges that
//! started them.
//!
//! A challenge stores a random id in the handshake properties and sets a
//! cookie named after it. The callback is only accepted when the properties
//! that come back name a cookie this browser actually holds.

use std::time::SystemTime;

use base64::Engine;
use rand::RngCore;
use tracing::warn;
use warden_api::{AuthenticationProperties, RequestContext};

use crate::cookie::{build_clear_cookie, build_set_cookie};
use crate::events::{EventAction, RemoteAuthenticationEvents, RemoteFailure};
use crate::remote::RemoteAuthenticationOptions;
use crate::Result;

/// Properties item holding the correlation id.
pub const CORRELATION_PROPERTY: &str = ".xsrf";
/// Value of every correlation cookie.
pub const CORRELATION_MARKER: &str = "N";

const CORRELATION_FAILED: &str = "Correlation failed.";
const ACCESS_DENIED: &str = "Access was denied by the resource owner or by the remote server.";

/// How a callback request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCallbackOutcome {
    /// The callback is genuine; continue with the protocol exchange.
    Continue,
    /// The callback was rejected.
    Failed(RemoteFailure),
    /// An event handler produced the response.
    Handled,
    /// An event handler asked to pass the request on.
    Skipped,
    /// Redirect the user to this location.
    Redirect(String),
}

impl RemoteAuthenticationOptions {
    fn correlation_cookie_name(&self, scheme: &str, correlation_id: &str) -> String {
        format!(
            "{}{scheme}.{correlation_id}",
            self.correlation_cookie().prefix()
        )
    }

    /// Start a handshake: record a fresh correlation id in `properties` and
    /// queue its cookie on the response.
    ///
    /// # Errors
    ///
    /// Fails when the configured cookie prefix or scheme name cannot be used
    /// in a cookie name.
    pub fn generate_correlation_id(
        &self,
        scheme: &str,
        ctx: &mut RequestContext,
        properties: &mut AuthenticationProperties,
        now: SystemTime,
    ) -> Result<String> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let correlation_id = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);

        let cookie_options = self.correlation_cookie().build(ctx, now);
        let cookie_name = self.correlation_cookie_name(scheme, &correlation_id);
        let set_cookie = build_set_cookie(&cookie_name, CORRELATION_MARKER, &cookie_options)?;

        properties.set_item(CORRELATION_PROPERTY, correlation_id.clone());
        ctx.append_response_cookie(set_cookie);
        Ok(correlation_id)
    }

    /// Check that a callback belongs to a handshake this browser started.
    ///
    /// The correlation id is consumed from `properties`, and a cookie that was
    /// found is cleared on the response whatever its value.
    ///
    /// # Errors
    ///
    /// Only when the clearing cookie cannot be built.
    pub fn validate_correlation_id(
        &self,
        scheme: &str,
        ctx: &mut RequestContext,
        properties: &mut AuthenticationProperties,
        now: SystemTime,
    ) -> Result<bool> {
        let Some(correlation_id) = properties.remove_item(CORRELATION_PROPERTY) else {
            warn!(scheme, "correlation property not found");
            return Ok(false);
        };

        let cookie_name = self.correlation_cookie_name(scheme, &correlation_id);
        let Some(value) = ctx.request_cookie(&cookie_name).map(str::to_owned) else {
            warn!(scheme, cookie = %cookie_name, "correlation cookie not found");
            return Ok(false);
        };

        let cookie_options = self.correlation_cookie().build(ctx, now);
        ctx.append_response_cookie(build_clear_cookie(&cookie_name, &cookie_options)?);

        if value != CORRELATION_MARKER {
            warn!(scheme, cookie = %cookie_name, "unexpected correlation cookie value");
            return Ok(false);
        }
        Ok(true)
    }

    /// Run the correlation check for a callback and let the events react to
    /// a failure.
    ///
    /// Requests outside the callback path are `Skipped` untouched.
    ///
    /// # Errors
    ///
    /// See [`validate_correlation_id`](Self::validate_correlation_id).
    pub async fn handle_callback(
        &self,
        scheme: &str,
        ctx: &mut RequestContext,
        properties: &mut AuthenticationProperties,
        now: SystemTime,
    ) -> Result<RemoteCallbackOutcome> {
        if !self.is_callback_request(ctx) {
            return Ok(RemoteCallbackOutcome::Skipped);
        }
        if self.validate_correlation_id(scheme, ctx, properties, now)? {
            return Ok(RemoteCallbackOutcome::Continue);
        }
        Ok(self.remote_failure(scheme, ctx, CORRELATION_FAILED).await)
    }

    /// React to the provider reporting that the user denied access.
    ///
    /// Redirects to `access_denied_path` when configured, otherwise reports a
    /// remote failure.
    pub async fn handle_access_denied(
        &self,
        scheme: &str,
        ctx: &mut RequestContext,
        properties: &AuthenticationProperties,
    ) -> RemoteCallbackOutcome {
        match self.events.on_access_denied(ctx, properties).await {
            EventAction::Handled => return RemoteCallbackOutcome::Handled,
            EventAction::Skip => return RemoteCallbackOutcome::Skipped,
            EventAction::Continue => {}
        }

        if let Some(path) = self.access_denied_path.as_deref().filter(|p| !p.is_empty()) {
            let mut location = format!("{}{path}", ctx.path_base);
            if let Some(return_url) = properties.redirect_uri.as_deref() {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(return_url.as_bytes()).collect();
                let sep = if location.contains('?') { '&' } else { '?' };
                location = format!("{location}{sep}{}={encoded}", self.return_url_parameter);
            }
            return RemoteCallbackOutcome::Redirect(location);
        }

        self.remote_failure(scheme, ctx, ACCESS_DENIED).await
    }

    async fn remote_failure(
        &self,
        scheme: &str,
        ctx: &mut RequestContext,
        reason: &str,
    ) -> RemoteCallbackOutcome {
        let failure = RemoteFailure {
            scheme: scheme.to_string(),
            reason: reason.to_string(),
        };
        match self.events.on_remote_failure(ctx, &failure).await {
            EventAction::Continue => RemoteCallbackOutcome::Failed(failure),
            EventAction::Handled => RemoteCallbackOutcome::Handled,
            EventAction::Skip => RemoteCallbackOutcome::Skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, UNIX_EPOCH};

    use async_trait::async_trait;
    use http::HeaderValue;
    use http::header::COOKIE;

    use super::*;

    const SCHEME: &str = "GitHub";

    fn options() -> RemoteAuthenticationOptions {
        RemoteAuthenticationOptions::new("/signin-github")
    }

    /// Carries the cookies a challenge set into a callback request.
    fn callback_from(challenge: &RequestContext) -> RequestContext {
        let cookies: Vec<String> = challenge
            .response_cookies()
            .iter()
            .filter_map(|sc| sc.split(';').next().map(str::to_owned))
            .collect();
        RequestContext::new("/signin-github")
            .with_header(COOKIE, HeaderValue::from_str(&cookies.join("; ")).unwrap())
    }

    #[test]
    fn generate_sets_scoped_cookie_and_property() {
        let opts = options();
        let mut ctx = RequestContext::new("/login").with_path_base("/app");
        let mut props = AuthenticationProperties::default();
        let now = UNIX_EPOCH + Duration::from_secs(1_000);

        let id = opts
            .generate_correlation_id(SCHEME, &mut ctx, &mut props, now)
            .unwrap();

        assert_eq!(id.len(), 43);
        assert_eq!(props.item(CORRELATION_PROPERTY), Some(id.as_str()));
        let set_cookie = &ctx.response_cookies()[0];
        assert!(set_cookie.starts_with(&format!(".Warden.Correlation.GitHub.{id}=N; ")));
        assert!(set_cookie.contains("Path=/app/signin-github"));
        assert!(set_cookie.contains("SameSite=None"));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Expires=Thu, 01 Jan 1970 00:31:40 GMT"));
    }

    #[tokio::test]
    async fn round_trip_is_accepted_once() {
        let opts = options();
        let mut challenge = RequestContext::new("/login");
        let mut props = AuthenticationProperties::default();
        opts.generate_correlation_id(SCHEME, &mut challenge, &mut props, UNIX_EPOCH)
            .unwrap();

        let mut callback = callback_from(&challenge);
        let outcome = opts
            .handle_callback(SCHEME, &mut callback, &mut props, UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(outcome, RemoteCallbackOutcome::Continue);
        assert!(props.item(CORRELATION_PROPERTY).is_none());
        assert!(callback.response_cookies()[0].contains("Max-Age=0"));

        // The property was consumed; replaying the same state fails.
        let mut replay = callback_from(&challenge);
        let outcome = opts
            .handle_callback(SCHEME, &mut replay, &mut props, UNIX_EPOCH)
            .await
            .unwrap();
        assert!(matches!(outcome, RemoteCallbackOutcome::Failed(f) if f.reason == CORRELATION_FAILED));
    }

    #[tokio::test]
    async fn requests_off_the_callback_path_are_skipped() {
        let opts = options();
        let mut challenge = RequestContext::new("/login");
        let mut props = AuthenticationProperties::default();
        opts.generate_correlation_id(SCHEME, &mut challenge, &mut props, UNIX_EPOCH)
            .unwrap();

        let mut elsewhere = callback_from(&challenge);
        elsewhere.path = "/signin-google".to_string();
        assert!(!opts.is_callback_request(&elsewhere));

        let outcome = opts
            .handle_callback(SCHEME, &mut elsewhere, &mut props, UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(outcome, RemoteCallbackOutcome::Skipped);
        assert!(props.item(CORRELATION_PROPERTY).is_some());
        assert!(elsewhere.response_cookies().is_empty());

        let mut callback = callback_from(&challenge);
        assert!(opts.is_callback_request(&callback));
        let outcome = opts
            .handle_callback(SCHEME, &mut callback, &mut props, UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(outcome, RemoteCallbackOutcome::Continue);
    }

    #[test]
    fn forged_callback_without_cookie_fails() {
        let opts = options();
        let mut props = AuthenticationProperties::default();
        props.set_item(CORRELATION_PROPERTY, "forged");
        let mut ctx = RequestContext::new("/signin-github");

        assert!(
            !opts
                .validate_correlation_id(SCHEME, &mut ctx, &mut props, UNIX_EPOCH)
                .unwrap()
        );
        assert!(ctx.response_cookies().is_empty());
    }

    #[test]
    fn wrong_marker_fails_but_clears_cookie() {
        let opts = options();
        let mut props = AuthenticationProperties::default();
        props.set_item(CORRELATION_PROPERTY, "abc");
        let mut ctx = RequestContext::new("/signin-github").with_header(
            COOKIE,
            HeaderValue::from_static(".Warden.Correlation.GitHub.abc=X"),
        );

        assert!(
            !opts
                .validate_correlation_id(SCHEME, &mut ctx, &mut props, UNIX_EPOCH)
                .unwrap()
        );
        assert_eq!(ctx.response_cookies().len(), 1);
    }

    struct HandleEverything;

    #[async_trait]
    impl RemoteAuthenticationEvents for HandleEverything {
        async fn on_remote_failure(
            &self,
            _ctx: &mut RequestContext,
            _failure: &RemoteFailure,
        ) -> EventAction {
            EventAction::Handled
        }
    }

    #[tokio::test]
    async fn events_can_handle_failures() {
        let opts = RemoteAuthenticationOptions {
            events: Arc::new(HandleEverything),
            ..options()
        };
        let mut ctx = RequestContext::new("/signin-github");
        let outcome = opts
            .handle_callback(
                SCHEME,
                &mut ctx,
                &mut AuthenticationProperties::default(),
                UNIX_EPOCH,
            )
            .await
            .unwrap();
        assert_eq!(outcome, RemoteCallbackOutcome::Handled);
    }

    #[tokio::test]
    async fn access_denied_redirects_with_return_url() {
        let opts = RemoteAuthenticationOptions {
            access_denied_path: Some("/denied".to_string()),
            ..options()
        };
        let mut ctx = RequestContext::new("/signin-github").with_path_base("/app");
        let props = AuthenticationProperties {
            redirect_uri: Some("/home?tab=1".to_string()),
            ..AuthenticationProperties::default()
        };

        let outcome = opts.handle_access_denied(SCHEME, &mut ctx, &props).await;
        assert_eq!(
            outcome,
            RemoteCallbackOutcome::Redirect("/app/denied?ReturnUrl=%2Fhome%3Ftab%3D1".to_string())
        );

        let outcome = options()
            .handle_access_denied(SCHEME, &mut ctx, &props)
            .await;
        assert!(matches!(outcome, RemoteCallbackOutcome::Failed(f) if f.reason == ACCESS_DENIED));
    }
}
