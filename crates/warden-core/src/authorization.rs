use async_trait::async_trait;
use tracing::debug;
use warden_api::{
    AuthorizationFailure, AuthorizationPolicy, AuthorizationResult, AuthorizationService,
    Principal, Requirement, Resource, WardenError, claim_types,
};

/// Authorization service for the built-in requirement kinds.
///
/// Every requirement must hold. A policy without requirements is satisfied.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequirementAuthorizationService;

pub fn is_satisfied(requirement: &Requirement, user: &Principal) -> bool {
    match requirement {
        Requirement::DenyAnonymous => user.is_authenticated(),
        Requirement::Claim {
            claim_type,
            allowed_values,
        } => user.claims().any(|c| {
            c.claim_type == *claim_type
                && (allowed_values.is_empty() || allowed_values.contains(&c.value))
        }),
        Requirement::Role { roles } => roles.iter().any(|r| user.is_in_role(r)),
        Requirement::Name { name } => user
            .identities()
            .iter()
            .any(|i| i.find_first(claim_types::NAME).is_some_and(|c| c.value == *name)),
    }
}

#[async_trait]
impl AuthorizationService for RequirementAuthorizationService {
    async fn authorize(
        &self,
        user: &Principal,
        _resource: Option<&Resource>,
        policy: &AuthorizationPolicy,
    ) -> Result<AuthorizationResult, WardenError> {
        let reasons: Vec<String> = policy
            .requirements()
            .iter()
            .filter(|r| !is_satisfied(r, user))
            .map(ToString::to_string)
            .collect();

        if reasons.is_empty() {
            return Ok(AuthorizationResult::success());
        }

        debug!(failed = reasons.len(), "authorization requirements not met");
        Ok(AuthorizationResult::failed(AuthorizationFailure { reasons }))
    }
}

#[cfg(test)]
mod tests {
    use warden_api::Identity;

    use super::*;

    fn admin() -> Principal {
        Principal::from_identity(
            Identity::new("Bearer")
                .with_claim("name", "alice")
                .with_claim("role", "admin")
                .with_claim("scope", "read"),
        )
    }

    #[tokio::test]
    async fn all_requirements_must_hold() {
        let policy = AuthorizationPolicy::builder()
            .require_authenticated_user()
            .require_role(["admin", "ops"])
            .require_claim("scope", ["read", "write"])
            .require_name("alice")
            .build();

        let result = RequirementAuthorizationService
            .authorize(&admin(), None, &policy)
            .await
            .unwrap();
        assert!(result.succeeded);
        assert!(result.failure.is_none());
    }

    #[tokio::test]
    async fn reports_each_failed_requirement() {
        let policy = AuthorizationPolicy::builder()
            .require_authenticated_user()
            .require_role(["admin"])
            .require_claim("tenant", Vec::<String>::new())
            .build();

        let result = RequirementAuthorizationService
            .authorize(&Principal::anonymous(), None, &policy)
            .await
            .unwrap();
        assert!(!result.succeeded);
        assert_eq!(
            result.failure.unwrap().reasons,
            vec![
                "requires an authenticated user".to_string(),
                "requires one of roles [admin]".to_string(),
                "requires claim 'tenant'".to_string(),
            ]
        );
    }

    #[test]
    fn claim_presence_without_allowed_values() {
        let requirement = Requirement::Claim {
            claim_type: "scope".to_string(),
            allowed_values: Vec::new(),
        };
        assert!(is_satisfied(&requirement, &admin()));
        assert!(!is_satisfied(&requirement, &Principal::anonymous()));
    }

    #[tokio::test]
    async fn empty_policy_is_satisfied() {
        let result = RequirementAuthorizationService
            .authorize(&Principal::anonymous(), None, &AuthorizationPolicy::default())
            .await
            .unwrap();
        assert!(result.succeeded);
    }
}
