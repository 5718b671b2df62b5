use std::fmt;

use serde::{Deserialize, Serialize};

/// A single condition of an authorization policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Requirement {
    /// Some identity of the user must be authenticated.
    DenyAnonymous,
    /// The user must carry a claim of `claim_type`; when `allowed_values` is
    /// non-empty its value must be one of them.
    Claim {
        claim_type: String,
        allowed_values: Vec<String>,
    },
    /// The user must be in any of `roles`.
    Role { roles: Vec<String> },
    /// The user's name must equal `name`.
    Name { name: String },
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::DenyAnonymous => write!(f, "requires an authenticated user"),
            Requirement::Claim {
                claim_type,
                allowed_values,
            } if allowed_values.is_empty() => write!(f, "requires claim '{claim_type}'"),
            Requirement::Claim {
                claim_type,
                allowed_values,
            } => write!(
                f,
                "requires claim '{claim_type}' with one of [{}]",
                allowed_values.join(", ")
            ),
            Requirement::Role { roles } => write!(f, "requires one of roles [{}]", roles.join(", ")),
            Requirement::Name { name } => write!(f, "requires user name '{name}'"),
        }
    }
}

/// Schemes to authenticate with and requirements to satisfy.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthorizationPolicy {
    authentication_schemes: Vec<String>,
    requirements: Vec<Requirement>,
}

impl AuthorizationPolicy {
    pub fn new(authentication_schemes: Vec<String>, requirements: Vec<Requirement>) -> Self {
        let mut builder = Self::builder();
        for scheme in authentication_schemes {
            builder = builder.add_scheme(scheme);
        }
        for requirement in requirements {
            builder = builder.add_requirement(requirement);
        }
        builder.build()
    }

    pub fn builder() -> AuthorizationPolicyBuilder {
        AuthorizationPolicyBuilder::default()
    }

    pub fn authentication_schemes(&self) -> &[String] {
        &self.authentication_schemes
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicyBuilder {
    authentication_schemes: Vec<String>,
    requirements: Vec<Requirement>,
}

impl AuthorizationPolicyBuilder {
    /// Add a scheme. Duplicates keep their first position.
    #[must_use]
    pub fn add_scheme(mut self, scheme: impl Into<String>) -> Self {
        let scheme = scheme.into();
        if !self.authentication_schemes.contains(&scheme) {
            self.authentication_schemes.push(scheme);
        }
        self
    }

    #[must_use]
    pub fn add_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    #[must_use]
    pub fn require_authenticated_user(self) -> Self {
        self.add_requirement(Requirement::DenyAnonymous)
    }

    #[must_use]
    pub fn require_claim<I, S>(self, claim_type: impl Into<String>, allowed_values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_requirement(Requirement::Claim {
            claim_type: claim_type.into(),
            allowed_values: allowed_values.into_iter().map(Into::into).collect(),
        })
    }

    #[must_use]
    pub fn require_role<I, S>(self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_requirement(Requirement::Role {
            roles: roles.into_iter().map(Into::into).collect(),
        })
    }

    #[must_use]
    pub fn require_name(self, name: impl Into<String>) -> Self {
        self.add_requirement(Requirement::Name { name: name.into() })
    }

    pub fn build(self) -> AuthorizationPolicy {
        AuthorizationPolicy {
            authentication_schemes: self.authentication_schemes,
            requirements: self.requirements,
        }
    }
}
