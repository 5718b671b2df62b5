//! Hooks a remote authentication handler raises during a callback.

use async_trait::async_trait;
use warden_api::{AuthenticationProperties, RequestContext};

/// Why a remote callback could not be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    pub scheme: String,
    pub reason: String,
}

/// What an event handler decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventAction {
    /// Carry on with default processing.
    #[default]
    Continue,
    /// The handler wrote the response itself; stop processing.
    Handled,
    /// Pass the request on to the rest of the pipeline.
    Skip,
}

#[async_trait]
pub trait RemoteAuthenticationEvents: Send + Sync {
    /// Raised when the callback fails (correlation, access denied, protocol).
    async fn on_remote_failure(
        &self,
        _ctx: &mut RequestContext,
        _failure: &RemoteFailure,
    ) -> EventAction {
        EventAction::Continue
    }

    /// Raised when the remote side reports that the user denied access.
    async fn on_access_denied(
        &self,
        _ctx: &mut RequestContext,
        _properties: &AuthenticationProperties,
    ) -> EventAction {
        EventAction::Continue
    }
}

/// Events with no overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRemoteEvents;

#[async_trait]
impl RemoteAuthenticationEvents for DefaultRemoteEvents {}
