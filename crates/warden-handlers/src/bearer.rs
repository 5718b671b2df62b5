//! JWT bearer token scheme.

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;
use warden_api::{
    AuthenticateResult, AuthenticationHandler, Claim, Identity, Principal, RequestContext,
    WardenError, claim_types,
};

const BEARER_SCHEME: &str = "Bearer";

/// Clock skew allowed on `exp`/`nbf`, in seconds.
pub const DEFAULT_LEEWAY_SECONDS: u64 = 60;

/// Verifies HS256 bearer tokens from the `Authorization` header.
pub struct BearerHandler {
    scheme: String,
    key: DecodingKey,
    validation: Validation,
}

impl BearerHandler {
    pub fn new(
        scheme: impl Into<String>,
        secret: &str,
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> Result<Self, WardenError> {
        if secret.is_empty() {
            return Err(WardenError::Validation(
                "bearer scheme secret is empty".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = DEFAULT_LEEWAY_SECONDS;
        validation.validate_nbf = true;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            scheme: scheme.into(),
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }
}

#[async_trait]
impl AuthenticationHandler for BearerHandler {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    async fn authenticate(
        &self,
        ctx: &RequestContext,
    ) -> Result<AuthenticateResult, WardenError> {
        let Some(token) = ctx
            .header(AUTHORIZATION)
            .and_then(bearer_token)
        else {
            return Ok(AuthenticateResult::NoResult);
        };

        match jsonwebtoken::decode::<Value>(token, &self.key, &self.validation) {
            Ok(data) => {
                let identity = identity_from_claims(&self.scheme, &data.claims);
                Ok(AuthenticateResult::success(
                    Principal::from_identity(identity),
                    self.scheme.clone(),
                ))
            }
            Err(e) => {
                debug!(scheme = %self.scheme, error = %e, "bearer token rejected");
                Ok(AuthenticateResult::fail(format!("invalid bearer token: {e}")))
            }
        }
    }
}

/// Token of a `Bearer` credential; the scheme name is case-insensitive.
fn bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Turn JWT claims into an identity.
///
/// `sub` doubles as the name when there is no `name` claim; `role`/`roles`
/// become role claims. Scalar claims are kept as strings, other JSON is
/// dropped.
fn identity_from_claims(scheme: &str, claims: &Value) -> Identity {
    let mut identity = Identity::new(scheme);
    let Some(obj) = claims.as_object() else {
        return identity;
    };
    let issuer = obj.get("iss").and_then(Value::as_str);

    let mut push = |claim_type: &str, value: String| {
        let claim = Claim::new(claim_type, value);
        identity.add_claim(match issuer {
            Some(iss) => claim.with_issuer(iss),
            None => claim,
        });
    };

    for (key, value) in obj {
        match (key.as_str(), value) {
            ("role" | "roles", Value::Array(items)) => {
                for role in items.iter().filter_map(Value::as_str) {
                    push(claim_types::ROLE, role.to_string());
                }
            }
            ("role" | "roles", Value::String(role)) => push(claim_types::ROLE, role.clone()),
            (_, Value::String(s)) => push(key.as_str(), s.clone()),
            (_, Value::Number(n)) => push(key.as_str(), n.to_string()),
            (_, Value::Bool(b)) => push(key.as_str(), b.to_string()),
            _ => {}
        }
    }

    if !obj.contains_key(claim_types::NAME) {
        if let Some(sub) = obj.get(claim_types::SUBJECT).and_then(Value::as_str) {
            push(claim_types::NAME, sub.to_string());
        }
    }

    identity
}
