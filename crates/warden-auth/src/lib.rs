//! warden-auth
//!
//! Request-time authentication glue for Warden services.
//! It covers two pieces of the sign-in flow:
//!
//! - **Policy evaluation**: authenticate a request with every scheme a policy
//!   names, merge the identities, then decide between success, forbid and
//!   challenge.
//! - **Remote authentication options**: settings of redirect-based sign-in
//!   handlers, including the correlation cookie that ties a provider
//!   callback to the challenge that started it.
//!
//! ## Quick start
//! ```no_run
//! use std::sync::Arc;
//! use warden_api::{AuthorizationPolicy, AuthorizationService, RequestContext, SchemeAuthenticator};
//! use warden_auth::PolicyEvaluator;
//!
//! # async fn demo(
//! #     schemes: Arc<dyn SchemeAuthenticator>,
//! #     authz: Arc<dyn AuthorizationService>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let evaluator = PolicyEvaluator::new(schemes, authz);
//! let policy = AuthorizationPolicy::builder()
//!     .add_scheme("Bearer")
//!     .require_role(["admin"])
//!     .build();
//!
//! let mut ctx = RequestContext::new("/admin");
//! let authn = evaluator.authenticate(&policy, &mut ctx).await?;
//! let result = evaluator.authorize(Some(&policy), Some(&authn), &ctx, None).await?;
//! println!("{:?}", result.action());
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]

mod cookie;
mod correlation;
mod error;
mod evaluator;
mod events;
mod remote;

pub use cookie::{
    CookieBuilder, CookieOptions, CookieSecurePolicy, SameSite, build_clear_cookie,
    build_set_cookie,
};
pub use correlation::{CORRELATION_MARKER, CORRELATION_PROPERTY, RemoteCallbackOutcome};
pub use error::{Error, Result};
pub use evaluator::PolicyEvaluator;
pub use events::{DefaultRemoteEvents, EventAction, RemoteAuthenticationEvents, RemoteFailure};
pub use remote::{
    CORRELATION_COOKIE_PREFIX, CorrelationCookieBuilder, DEFAULT_BACKCHANNEL_TIMEOUT,
    DEFAULT_REMOTE_AUTHENTICATION_TIMEOUT, DEFAULT_RETURN_URL_PARAMETER,
    RemoteAuthenticationOptions, default_sign_in_scheme, set_default_sign_in_scheme,
};
