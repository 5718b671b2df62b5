//! Policy evaluation: authenticate for a policy, then authorize against it.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use warden_api::{
    AuthenticateOutcome, AuthenticateResult, AuthenticationTicket, AuthorizationPolicy,
    AuthorizationService, PolicyAuthorizationResult, Principal, RequestContext, Resource,
    SchemeAuthenticator, merge_user_principal,
};

use crate::{Error, Result};

/// Runs the authenticate → authorize protocol for a request.
///
/// Holds only shared references to its collaborators; one evaluator serves
/// every request.
#[derive(Clone)]
pub struct PolicyEvaluator {
    schemes: Arc<dyn SchemeAuthenticator>,
    authorization: Arc<dyn AuthorizationService>,
}

impl PolicyEvaluator {
    pub fn new(
        schemes: Arc<dyn SchemeAuthenticator>,
        authorization: Arc<dyn AuthorizationService>,
    ) -> Self {
        Self {
            schemes,
            authorization,
        }
    }

    /// Authenticate `ctx` with every scheme of `policy`, in declared order.
    ///
    /// Successful principals are merged and become `ctx.user`; the ticket's
    /// scheme is the `;`-joined names of the schemes that succeeded. When no
    /// scheme succeeds `ctx.user` becomes anonymous and the outcome is
    /// `None`. A policy without schemes leaves `ctx.user` alone.
    ///
    /// # Errors
    ///
    /// Faults raised by the scheme authenticator are returned as-is. Schemes
    /// that fail or have no result are not errors.
    pub async fn authenticate(
        &self,
        policy: &AuthorizationPolicy,
        ctx: &mut RequestContext,
    ) -> Result<AuthenticateOutcome> {
        let schemes = policy.authentication_schemes();
        if schemes.is_empty() {
            return Ok(AuthenticateOutcome::None);
        }

        let mut merged: Option<Principal> = None;
        let mut succeeded: Vec<&str> = Vec::new();

        for scheme in schemes {
            match self.schemes.authenticate(scheme, ctx).await? {
                AuthenticateResult::Success(ticket) => {
                    merged = Some(merge_user_principal(merged, ticket.principal));
                    succeeded.push(scheme);
                }
                AuthenticateResult::NoResult => {
                    debug!(scheme = %scheme, "scheme produced no result");
                }
                AuthenticateResult::Fail(reason) => {
                    debug!(scheme = %scheme, %reason, "scheme failed to authenticate");
                }
            }
        }

        match merged {
            Some(principal) => {
                ctx.user = principal.clone();
                Ok(AuthenticateOutcome::Success(AuthenticationTicket::new(
                    principal,
                    succeeded.join(";"),
                )))
            }
            None => {
                ctx.user = Principal::anonymous();
                Ok(AuthenticateOutcome::None)
            }
        }
    }

    /// Authorize `ctx.user` against `policy`.
    ///
    /// A failed verdict becomes `Forbid` when `authentication` succeeded and
    /// `Challenge` otherwise.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when `policy` is `None`; authorization
    /// service faults are returned as-is.
    pub async fn authorize(
        &self,
        policy: Option<&AuthorizationPolicy>,
        authentication: Option<&AuthenticateOutcome>,
        ctx: &RequestContext,
        resource: Option<&Resource>,
    ) -> Result<PolicyAuthorizationResult> {
        let policy = policy.ok_or(Error::InvalidArgument("policy"))?;

        let result = self
            .authorization
            .authorize(&ctx.user, resource, policy)
            .await?;

        if result.succeeded {
            return Ok(PolicyAuthorizationResult::Success);
        }

        if authentication.is_some_and(AuthenticateOutcome::succeeded) {
            Ok(PolicyAuthorizationResult::Forbid {
                failure: result.failure,
            })
        } else {
            Ok(PolicyAuthorizationResult::Challenge)
        }
    }
}

impl fmt::Debug for PolicyEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEvaluator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use warden_api::{AuthorizationFailure, AuthorizationResult, Identity, WardenError};

    use super::*;

    /// Scheme authenticator answering from a fixed table.
    struct TableSchemes(BTreeMap<&'static str, AuthenticateResult>);

    #[async_trait]
    impl SchemeAuthenticator for TableSchemes {
        async fn authenticate(
            &self,
            scheme: &str,
            _ctx: &RequestContext,
        ) -> std::result::Result<AuthenticateResult, WardenError> {
            self.0
                .get(scheme)
                .cloned()
                .ok_or_else(|| WardenError::UnknownScheme(scheme.to_string()))
        }
    }

    /// Authorization service with a fixed verdict.
    struct Verdict(bool);

    #[async_trait]
    impl AuthorizationService for Verdict {
        async fn authorize(
            &self,
            _user: &Principal,
            _resource: Option<&Resource>,
            _policy: &AuthorizationPolicy,
        ) -> std::result::Result<AuthorizationResult, WardenError> {
            if self.0 {
                Ok(AuthorizationResult::success())
            } else {
                Ok(AuthorizationResult::failed(AuthorizationFailure {
                    reasons: vec!["requires one of roles [admin]".to_string()],
                }))
            }
        }
    }

    struct Broken;

    #[async_trait]
    impl AuthorizationService for Broken {
        async fn authorize(
            &self,
            _user: &Principal,
            _resource: Option<&Resource>,
            _policy: &AuthorizationPolicy,
        ) -> std::result::Result<AuthorizationResult, WardenError> {
            Err(WardenError::Authorization("policy store offline".to_string()))
        }
    }

    fn principal(scheme: &str, name: &str) -> Principal {
        Principal::from_identity(Identity::new(scheme).with_claim("name", name))
    }

    fn evaluator(
        table: Vec<(&'static str, AuthenticateResult)>,
        verdict: bool,
    ) -> PolicyEvaluator {
        PolicyEvaluator::new(
            Arc::new(TableSchemes(table.into_iter().collect())),
            Arc::new(Verdict(verdict)),
        )
    }

    fn policy(schemes: &[&str]) -> AuthorizationPolicy {
        schemes
            .iter()
            .fold(AuthorizationPolicy::builder(), |b, s| b.add_scheme(*s))
            .build()
    }

    #[tokio::test]
    async fn no_schemes_leaves_user_untouched() {
        let ev = evaluator(vec![], true);
        let alice = principal("Cookie", "alice");
        let mut ctx = RequestContext::default().with_user(alice.clone());

        let outcome = ev.authenticate(&policy(&[]), &mut ctx).await.unwrap();
        assert_eq!(outcome, AuthenticateOutcome::None);
        assert_eq!(ctx.user, alice);
    }

    #[tokio::test]
    async fn single_success_returns_that_principal() {
        let p = principal("Bearer", "bob");
        let ev = evaluator(
            vec![
                ("Cookie", AuthenticateResult::fail("expired")),
                ("Bearer", AuthenticateResult::success(p.clone(), "Bearer")),
            ],
            true,
        );
        let mut ctx = RequestContext::default();

        let outcome = ev
            .authenticate(&policy(&["Cookie", "Bearer"]), &mut ctx)
            .await
            .unwrap();
        let ticket = outcome.ticket().unwrap();
        assert_eq!(ticket.principal, p);
        assert_eq!(ticket.scheme, "Bearer");
        assert_eq!(ctx.user, p);

        let result = ev
            .authorize(Some(&policy(&["Cookie", "Bearer"])), Some(&outcome), &ctx, None)
            .await
            .unwrap();
        assert_eq!(result, PolicyAuthorizationResult::Success);
    }

    #[tokio::test]
    async fn two_successes_are_merged_in_declared_order() {
        let cookie = principal("Cookie", "alice");
        let bearer = principal("Bearer", "alice-api");
        let ev = evaluator(
            vec![
                ("Cookie", AuthenticateResult::success(cookie.clone(), "Cookie")),
                ("Bearer", AuthenticateResult::success(bearer.clone(), "Bearer")),
            ],
            true,
        );
        let mut ctx = RequestContext::default();

        let outcome = ev
            .authenticate(&policy(&["Cookie", "Bearer"]), &mut ctx)
            .await
            .unwrap();
        let ticket = outcome.ticket().unwrap();
        assert_eq!(ticket.scheme, "Cookie;Bearer");
        let expected: Vec<_> = cookie
            .identities()
            .iter()
            .chain(bearer.identities())
            .cloned()
            .collect();
        assert_eq!(ticket.principal.identities(), expected.as_slice());
        assert_eq!(ctx.user, ticket.principal);
    }

    #[tokio::test]
    async fn all_failures_make_user_anonymous() {
        let ev = evaluator(
            vec![
                ("Cookie", AuthenticateResult::NoResult),
                ("Bearer", AuthenticateResult::fail("bad signature")),
            ],
            true,
        );
        let mut ctx = RequestContext::default().with_user(principal("Old", "stale"));

        let outcome = ev
            .authenticate(&policy(&["Cookie", "Bearer"]), &mut ctx)
            .await
            .unwrap();
        assert_eq!(outcome, AuthenticateOutcome::None);
        assert!(!ctx.user.is_authenticated());
        assert!(!ctx.user.has_claims());
    }

    #[tokio::test]
    async fn authenticator_faults_propagate() {
        let ev = evaluator(vec![], true);
        let err = ev
            .authenticate(&policy(&["Missing"]), &mut RequestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api(WardenError::UnknownScheme(s)) if s == "Missing"));
    }

    #[tokio::test]
    async fn authorize_without_policy_is_invalid_argument() {
        let outcome = AuthenticateOutcome::None;
        for verdict in [true, false] {
            let ev = evaluator(vec![], verdict);
            for authn in [None, Some(&outcome)] {
                let err = ev
                    .authorize(None, authn, &RequestContext::default(), None)
                    .await
                    .unwrap_err();
                assert!(matches!(err, Error::InvalidArgument("policy")));
            }
        }
    }

    #[tokio::test]
    async fn decision_table() {
        let authenticated = AuthenticateOutcome::Success(AuthenticationTicket::new(
            principal("Bearer", "bob"),
            "Bearer",
        ));
        let anonymous = AuthenticateOutcome::None;
        let p = policy(&["Bearer"]);
        let ctx = RequestContext::default();

        let cases = [
            (true, &authenticated, PolicyAuthorizationResult::Success),
            (true, &anonymous, PolicyAuthorizationResult::Success),
            (
                false,
                &authenticated,
                PolicyAuthorizationResult::Forbid {
                    failure: Some(AuthorizationFailure {
                        reasons: vec!["requires one of roles [admin]".to_string()],
                    }),
                },
            ),
            (false, &anonymous, PolicyAuthorizationResult::Challenge),
        ];

        for (verdict, authn, expected) in cases {
            let result = evaluator(vec![], verdict)
                .authorize(Some(&p), Some(authn), &ctx, None)
                .await
                .unwrap();
            assert_eq!(result, expected, "verdict={verdict} authn={authn:?}");
        }
    }

    #[tokio::test]
    async fn no_schemes_and_denied_is_challenge() {
        let ev = evaluator(vec![], false);
        let p = policy(&[]);
        let mut ctx = RequestContext::default();

        let outcome = ev.authenticate(&p, &mut ctx).await.unwrap();
        let result = ev.authorize(Some(&p), Some(&outcome), &ctx, None).await.unwrap();
        assert_eq!(result, PolicyAuthorizationResult::Challenge);
    }

    #[tokio::test]
    async fn authorization_faults_propagate() {
        let ev = PolicyEvaluator::new(Arc::new(TableSchemes(BTreeMap::new())), Arc::new(Broken));
        let err = ev
            .authorize(Some(&policy(&[])), None, &RequestContext::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api(WardenError::Authorization(_))));
    }
}
