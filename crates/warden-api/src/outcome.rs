//! Results of authentication and authorization.

use std::collections::BTreeMap;
use std::time::SystemTime;

use http::StatusCode;
use serde::Serialize;

use crate::Principal;

/// State carried alongside a ticket or through a remote handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthenticationProperties {
    pub items: BTreeMap<String, String>,
    pub redirect_uri: Option<String>,
    pub issued_utc: Option<SystemTime>,
    pub expires_utc: Option<SystemTime>,
}

impl AuthenticationProperties {
    pub fn item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn set_item(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.insert(key.into(), value.into());
    }

    pub fn remove_item(&mut self, key: &str) -> Option<String> {
        self.items.remove(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticationTicket {
    pub principal: Principal,
    /// Scheme, or `;`-joined schemes, that produced the principal.
    pub scheme: String,
    pub properties: AuthenticationProperties,
}

impl AuthenticationTicket {
    pub fn new(principal: Principal, scheme: impl Into<String>) -> Self {
        Self {
            principal,
            scheme: scheme.into(),
            properties: AuthenticationProperties::default(),
        }
    }
}

/// What a single scheme handler concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticateResult {
    Success(AuthenticationTicket),
    /// The scheme found nothing to look at (no header, no cookie).
    NoResult,
    /// The scheme found credentials and rejected them.
    Fail(String),
}

impl AuthenticateResult {
    pub fn success(principal: Principal, scheme: impl Into<String>) -> Self {
        AuthenticateResult::Success(AuthenticationTicket::new(principal, scheme))
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        AuthenticateResult::Fail(reason.into())
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, AuthenticateResult::Success(_))
    }

    pub fn ticket(&self) -> Option<&AuthenticationTicket> {
        match self {
            AuthenticateResult::Success(ticket) => Some(ticket),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            AuthenticateResult::Fail(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Outcome of authenticating a request for a whole policy.
///
/// Individual scheme failures never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "ticket", rename_all = "snake_case")]
pub enum AuthenticateOutcome {
    Success(AuthenticationTicket),
    None,
}

impl AuthenticateOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, AuthenticateOutcome::Success(_))
    }

    pub fn ticket(&self) -> Option<&AuthenticationTicket> {
        match self {
            AuthenticateOutcome::Success(ticket) => Some(ticket),
            AuthenticateOutcome::None => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthorizationFailure {
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationResult {
    pub succeeded: bool,
    pub failure: Option<AuthorizationFailure>,
}

impl AuthorizationResult {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            failure: None,
        }
    }

    pub fn failed(failure: AuthorizationFailure) -> Self {
        Self {
            succeeded: false,
            failure: Some(failure),
        }
    }
}

/// What the pipeline should do with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerAction {
    Continue,
    Forbidden,
    Challenge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PolicyAuthorizationResult {
    Success,
    /// Authenticated but not permitted.
    Forbid { failure: Option<AuthorizationFailure> },
    /// Not authenticated; send the user to sign in.
    Challenge,
}

impl PolicyAuthorizationResult {
    pub fn action(&self) -> CallerAction {
        match self {
            PolicyAuthorizationResult::Success => CallerAction::Continue,
            PolicyAuthorizationResult::Forbid { .. } => CallerAction::Forbidden,
            PolicyAuthorizationResult::Challenge => CallerAction::Challenge,
        }
    }

    /// Status to answer with, or `None` when the request continues.
    pub fn status_hint(&self) -> Option<StatusCode> {
        match self.action() {
            CallerAction::Continue => None,
            CallerAction::Forbidden => Some(StatusCode::FORBIDDEN),
            CallerAction::Challenge => Some(StatusCode::UNAUTHORIZED),
        }
    }
}
