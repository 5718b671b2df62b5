//! Shared model and capability traits for Warden.
//!
//! The traits here are the seams between policy evaluation and the host
//! framework: scheme handlers, the scheme registry and the authorization
//! service are all reached through them.

mod context;
mod outcome;
mod policy;
mod principal;
mod scheme;

use async_trait::async_trait;

pub use context::RequestContext;
pub use outcome::{
    AuthenticateOutcome, AuthenticateResult, AuthenticationProperties, AuthenticationTicket,
    AuthorizationFailure, AuthorizationResult, CallerAction, PolicyAuthorizationResult,
};
pub use policy::{AuthorizationPolicy, AuthorizationPolicyBuilder, Requirement};
pub use principal::{Claim, Identity, Principal, claim_types, merge_user_principal};
pub use scheme::{IdentityConfig, SchemeConfig, SchemeKind};

pub type SchemeName = String;
pub type PolicyName = String;

/// Opaque resource handed to the authorization service.
pub type Resource = serde_json::Value;

/// Longest cookie lifetime or remote handshake timeout accepted in
/// configuration: 400 days, the expiry cap of RFC 6265bis.
pub const MAX_COOKIE_LIFETIME_SECS: u64 = 400 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("the '{0}' option must be provided")]
    MissingOption(String),
    #[error("no authentication handler is registered for scheme '{0}'")]
    UnknownScheme(String),
    #[error("handler error: {0}")]
    Handler(String),
    #[error("authorization error: {0}")]
    Authorization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub trait SecretStore: Send + Sync {
    fn get(&self, secret_ref: &str) -> Result<String, WardenError>;
}

/// Authenticates a request for one scheme.
///
/// `NoResult` and `Fail` are expected outcomes; `Err` is reserved for faults
/// the caller cannot recover from (misconfiguration, broken collaborators).
#[async_trait]
pub trait AuthenticationHandler: Send + Sync {
    fn scheme(&self) -> &str;
    async fn authenticate(&self, ctx: &RequestContext)
    -> Result<AuthenticateResult, WardenError>;
}

/// Resolves a scheme name to its handler and runs it.
#[async_trait]
pub trait SchemeAuthenticator: Send + Sync {
    async fn authenticate(
        &self,
        scheme: &str,
        ctx: &RequestContext,
    ) -> Result<AuthenticateResult, WardenError>;
}

/// Evaluates a policy's requirements against a principal.
///
/// A policy that is not satisfied is `Ok` with `succeeded == false`;
/// `Err` means the evaluation itself could not run.
#[async_trait]
pub trait AuthorizationService: Send + Sync {
    async fn authorize(
        &self,
        user: &Principal,
        resource: Option<&Resource>,
        policy: &AuthorizationPolicy,
    ) -> Result<AuthorizationResult, WardenError>;
}

pub trait HandlerFactory: Send + Sync {
    fn build(
        &self,
        cfg: &SchemeConfig,
        secrets: &dyn SecretStore,
    ) -> Result<Box<dyn AuthenticationHandler>, WardenError>;
}
