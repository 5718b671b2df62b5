use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Claim, Identity, claim_types};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeKind {
    ApiKey,
    Bearer,
}

/// Identity handed out for a statically configured credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub claims: BTreeMap<String, String>,
}

impl IdentityConfig {
    pub fn to_identity(&self, scheme: &str) -> Identity {
        let mut identity = Identity::new(scheme).with_claim(claim_types::NAME, &self.name);
        for role in &self.roles {
            identity.add_claim(Claim::new(claim_types::ROLE, role));
        }
        for (claim_type, value) in &self.claims {
            identity.add_claim(Claim::new(claim_type, value));
        }
        identity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeConfig {
    pub name: String,
    pub kind: SchemeKind,
    /// Header carrying the credential; each kind has its own default.
    pub header: Option<String>,
    pub secret_ref: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub keys: BTreeMap<String, IdentityConfig>,
}

impl SchemeConfig {
    pub fn new(name: impl Into<String>, kind: SchemeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            header: None,
            secret_ref: None,
            issuer: None,
            audience: None,
            keys: BTreeMap::new(),
        }
    }
}
