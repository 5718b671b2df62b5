use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;
use warden_api::{
    AuthenticateResult, AuthenticationHandler, IdentityConfig, Principal, RequestContext,
    SchemeConfig, WardenError,
};

pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";

/// Maps static API keys, read from a request header, to configured identities.
pub struct ApiKeyHandler {
    scheme: String,
    header: String,
    keys: BTreeMap<String, IdentityConfig>,
}

impl ApiKeyHandler {
    pub fn new(
        scheme: impl Into<String>,
        header: impl Into<String>,
        keys: BTreeMap<String, IdentityConfig>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            header: header.into().to_ascii_lowercase(),
            keys,
        }
    }

    pub fn from_config(cfg: &SchemeConfig) -> Self {
        Self::new(
            cfg.name.clone(),
            cfg.header.as_deref().unwrap_or(DEFAULT_API_KEY_HEADER),
            cfg.keys.clone(),
        )
    }
}

#[async_trait]
impl AuthenticationHandler for ApiKeyHandler {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    async fn authenticate(
        &self,
        ctx: &RequestContext,
    ) -> Result<AuthenticateResult, WardenError> {
        let Some(key) = ctx.header(self.header.as_str()).map(str::trim) else {
            return Ok(AuthenticateResult::NoResult);
        };
        if key.is_empty() {
            return Ok(AuthenticateResult::NoResult);
        }

        match self.keys.get(key) {
            Some(identity) => Ok(AuthenticateResult::success(
                Principal::from_identity(identity.to_identity(&self.scheme)),
                self.scheme.clone(),
            )),
            None => {
                debug!(scheme = %self.scheme, "unknown api key presented");
                Ok(AuthenticateResult::fail("unknown api key"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderName, HeaderValue};

    use super::*;

    fn handler() -> ApiKeyHandler {
        ApiKeyHandler::new(
            "ApiKey",
            "X-Api-Key",
            BTreeMap::from([(
                "k-123".to_string(),
                IdentityConfig {
                    name: "ci-bot".to_string(),
                    roles: vec!["automation".to_string()],
                    claims: BTreeMap::new(),
                },
            )]),
        )
    }

    fn with_key(key: &'static str) -> RequestContext {
        RequestContext::new("/").with_header(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_static(key),
        )
    }

    #[tokio::test]
    async fn known_key_authenticates() {
        let result = handler().authenticate(&with_key("k-123")).await.unwrap();
        let ticket = result.ticket().unwrap();
        assert_eq!(ticket.scheme, "ApiKey");
        assert_eq!(ticket.principal.name(), Some("ci-bot"));
        assert!(ticket.principal.is_in_role("automation"));
        assert!(ticket.principal.is_authenticated());
    }

    #[tokio::test]
    async fn missing_header_is_no_result() {
        let result = handler()
            .authenticate(&RequestContext::new("/"))
            .await
            .unwrap();
        assert_eq!(result, AuthenticateResult::NoResult);
    }

    #[tokio::test]
    async fn unknown_key_fails() {
        let result = handler().authenticate(&with_key("nope")).await.unwrap();
        assert_eq!(result.failure(), Some("unknown api key"));
    }
}
