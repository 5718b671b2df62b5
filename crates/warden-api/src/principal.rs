//! Claims, identities and principals.

use serde::{Deserialize, Serialize};

/// Well-known claim types.
pub mod claim_types {
    pub const NAME: &str = "name";
    pub const ROLE: &str = "role";
    pub const SUBJECT: &str = "sub";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
            issuer: None,
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }
}

/// A single claims identity.
///
/// An identity is authenticated when it records the scheme that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub authentication_type: Option<String>,
    pub claims: Vec<Claim>,
}

impl Identity {
    pub fn new(authentication_type: impl Into<String>) -> Self {
        Self {
            authentication_type: Some(authentication_type.into()),
            claims: Vec::new(),
        }
    }

    /// Identity with no authentication type and no claims.
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.push(Claim::new(claim_type, value));
        self
    }

    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    pub fn is_authenticated(&self) -> bool {
        self.authentication_type
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.claim_type == claim_type)
    }

    pub fn name(&self) -> Option<&str> {
        self.find_first(claim_types::NAME).map(|c| c.value.as_str())
    }
}

/// The user of a request: every identity established for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    identities: Vec<Identity>,
}

impl Principal {
    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }

    pub fn from_identity(identity: Identity) -> Self {
        Self {
            identities: vec![identity],
        }
    }

    /// The unauthenticated user: a single empty identity.
    pub fn anonymous() -> Self {
        Self::from_identity(Identity::anonymous())
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn add_identity(&mut self, identity: Identity) {
        self.identities.push(identity);
    }

    /// Primary identity, used for name lookups.
    pub fn identity(&self) -> Option<&Identity> {
        self.identities.first()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identities.iter().any(Identity::is_authenticated)
    }

    pub fn claims(&self) -> impl Iterator<Item = &Claim> {
        self.identities.iter().flat_map(|i| i.claims.iter())
    }

    pub fn has_claims(&self) -> bool {
        self.claims().next().is_some()
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.claims().find(|c| c.claim_type == claim_type)
    }

    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims()
            .any(|c| c.claim_type == claim_type && c.value == value)
    }

    pub fn name(&self) -> Option<&str> {
        self.identities.iter().find_map(Identity::name)
    }

    pub fn is_in_role(&self, role: &str) -> bool {
        self.has_claim(claim_types::ROLE, role)
    }
}

/// Merge `additional` into `existing`.
///
/// Identities of `existing` come first. Those that are neither authenticated
/// nor carry claims are dropped, so an anonymous placeholder never survives a
/// merge.
pub fn merge_user_principal(existing: Option<Principal>, additional: Principal) -> Principal {
    let Some(existing) = existing else {
        return additional;
    };

    let mut identities: Vec<Identity> = existing
        .identities
        .into_iter()
        .filter(|i| i.is_authenticated() || !i.claims.is_empty())
        .collect();
    identities.extend(additional.identities);
    Principal { identities }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_principal_is_not_authenticated() {
        let p = Principal::anonymous();
        assert_eq!(p.identities().len(), 1);
        assert!(!p.is_authenticated());
        assert!(!p.has_claims());
    }

    #[test]
    fn merge_keeps_order_and_drops_empty_identities() {
        let cookie = Principal::from_identity(Identity::new("Cookie").with_claim("name", "alice"));
        let bearer = Principal::from_identity(Identity::new("Bearer").with_claim("role", "admin"));

        let merged = merge_user_principal(Some(cookie), bearer);
        let schemes: Vec<_> = merged
            .identities()
            .iter()
            .map(|i| i.authentication_type.as_deref())
            .collect();
        assert_eq!(schemes, vec![Some("Cookie"), Some("Bearer")]);
        assert_eq!(merged.name(), Some("alice"));
        assert!(merged.is_in_role("admin"));

        let merged = merge_user_principal(Some(Principal::anonymous()), merged);
        assert_eq!(merged.identities().len(), 2);
    }
}
