use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use warden_api::{
    AuthorizationPolicy, IdentityConfig, MAX_COOKIE_LIFETIME_SECS, SchemeConfig, SchemeKind,
    WardenError,
};

pub const CONFIG_FILE_NAME: &str = "warden.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub name: String,
    pub schemes: Vec<String>,
    pub require_authenticated: bool,
    pub roles: Vec<String>,
    /// Claim type → allowed values; an empty list only requires presence.
    pub claims: BTreeMap<String, Vec<String>>,
    pub user_name: Option<String>,
}

impl PolicyConfig {
    pub fn to_policy(&self) -> AuthorizationPolicy {
        let mut builder = AuthorizationPolicy::builder();
        for scheme in &self.schemes {
            builder = builder.add_scheme(scheme.as_str());
        }
        if self.require_authenticated {
            builder = builder.require_authenticated_user();
        }
        if !self.roles.is_empty() {
            builder = builder.require_role(self.roles.iter().map(String::as_str));
        }
        for (claim_type, allowed) in &self.claims {
            builder = builder.require_claim(claim_type.as_str(), allowed.iter().map(String::as_str));
        }
        if let Some(name) = &self.user_name {
            builder = builder.require_name(name.as_str());
        }
        builder.build()
    }
}

/// Remote sign-in settings. Unset timeouts take the handler defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub name: String,
    pub callback_path: String,
    pub backchannel_timeout_secs: Option<u64>,
    pub remote_authentication_timeout_secs: Option<u64>,
    pub sign_in_scheme: Option<String>,
    pub save_tokens: bool,
    pub access_denied_path: Option<String>,
    pub correlation_cookie_expiration_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardenConfig {
    pub default_sign_in_scheme: Option<String>,
    pub schemes: BTreeMap<String, SchemeConfig>,
    pub policies: BTreeMap<String, PolicyConfig>,
    pub remote: BTreeMap<String, RemoteConfig>,
}

pub fn validate_config(config: &WardenConfig) -> Result<(), WardenError> {
    for (id, policy) in &config.policies {
        for scheme in &policy.schemes {
            if !config.schemes.contains_key(scheme) {
                return Err(WardenError::Validation(format!(
                    "policy {id} points to missing scheme {scheme}"
                )));
            }
        }
    }

    for (id, remote) in &config.remote {
        if remote.callback_path.is_empty() {
            return Err(WardenError::Validation(format!(
                "remote scheme {id}: the 'callback_path' option must be provided"
            )));
        }
        if config.schemes.contains_key(id) {
            return Err(WardenError::Validation(format!(
                "remote scheme {id} clashes with an authentication scheme of the same name"
            )));
        }
        let lifetimes = [
            (
                "remote_authentication_timeout_secs",
                remote.remote_authentication_timeout_secs,
            ),
            (
                "correlation_cookie_expiration_secs",
                remote.correlation_cookie_expiration_secs,
            ),
        ];
        for (option, secs) in lifetimes {
            if secs.is_some_and(|s| s > MAX_COOKIE_LIFETIME_SECS) {
                return Err(WardenError::Validation(format!(
                    "remote scheme {id}: '{option}' must not exceed {MAX_COOKIE_LIFETIME_SECS}"
                )));
            }
        }
    }

    Ok(())
}

pub fn demo_config() -> WardenConfig {
    let mut api_key = SchemeConfig::new("ApiKey", SchemeKind::ApiKey);
    api_key.keys.insert(
        "demo-key".to_string(),
        IdentityConfig {
            name: "demo".to_string(),
            roles: vec!["admin".to_string()],
            claims: BTreeMap::new(),
        },
    );

    let policy = PolicyConfig {
        name: "default".to_string(),
        schemes: vec![api_key.name.clone()],
        require_authenticated: true,
        roles: Vec::new(),
        claims: BTreeMap::new(),
        user_name: None,
    };

    WardenConfig {
        default_sign_in_scheme: None,
        schemes: BTreeMap::from([(api_key.name.clone(), api_key)]),
        policies: BTreeMap::from([(policy.name.clone(), policy)]),
        remote: BTreeMap::new(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    defaults: RawDefaults,
    #[serde(default)]
    schemes: BTreeMap<String, RawScheme>,
    #[serde(default)]
    policies: BTreeMap<String, RawPolicy>,
    #[serde(default)]
    remote: BTreeMap<String, RawRemote>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefaults {
    sign_in_scheme: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScheme {
    kind: SchemeKind,
    header: Option<String>,
    secret_ref: Option<String>,
    issuer: Option<String>,
    audience: Option<String>,
    #[serde(default)]
    keys: BTreeMap<String, IdentityConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPolicy {
    #[serde(default)]
    schemes: Vec<String>,
    #[serde(default)]
    require_authenticated: bool,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    claims: BTreeMap<String, Vec<String>>,
    user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRemote {
    #[serde(default)]
    callback_path: String,
    backchannel_timeout_secs: Option<u64>,
    remote_authentication_timeout_secs: Option<u64>,
    sign_in_scheme: Option<String>,
    #[serde(default)]
    save_tokens: bool,
    access_denied_path: Option<String>,
    correlation_cookie_expiration_secs: Option<u64>,
}

pub fn default_config_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("warden")
    } else {
        PathBuf::from(".warden")
    }
}

pub fn load_config_from_dir(dir: &Path) -> Result<WardenConfig, WardenError> {
    let path = dir.join(CONFIG_FILE_NAME);
    load_config_from_file(&path)
}

pub fn load_config_from_file(path: &Path) -> Result<WardenConfig, WardenError> {
    let content = fs::read_to_string(path)
        .map_err(|e| WardenError::NotFound(format!("failed to read {}: {e}", path.display())))?;
    parse_config(&content)
        .map_err(|e| WardenError::Validation(format!("{}: {e}", path.display())))
}

/// Parse and validate a TOML configuration document.
pub fn parse_config(content: &str) -> Result<WardenConfig, WardenError> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| WardenError::Validation(format!("invalid TOML: {e}")))?;

    let schemes = raw
        .schemes
        .into_iter()
        .map(|(id, s)| {
            (
                id.clone(),
                SchemeConfig {
                    name: id,
                    kind: s.kind,
                    header: s.header,
                    secret_ref: s.secret_ref,
                    issuer: s.issuer,
                    audience: s.audience,
                    keys: s.keys,
                },
            )
        })
        .collect();

    let policies = raw
        .policies
        .into_iter()
        .map(|(id, p)| {
            (
                id.clone(),
                PolicyConfig {
                    name: id,
                    schemes: p.schemes,
                    require_authenticated: p.require_authenticated,
                    roles: p.roles,
                    claims: p.claims,
                    user_name: p.user_name,
                },
            )
        })
        .collect();

    let remote = raw
        .remote
        .into_iter()
        .map(|(id, r)| {
            (
                id.clone(),
                RemoteConfig {
                    name: id,
                    callback_path: r.callback_path,
                    backchannel_timeout_secs: r.backchannel_timeout_secs,
                    remote_authentication_timeout_secs: r.remote_authentication_timeout_secs,
                    sign_in_scheme: r.sign_in_scheme,
                    save_tokens: r.save_tokens,
                    access_denied_path: r.access_denied_path,
                    correlation_cookie_expiration_secs: r.correlation_cookie_expiration_secs,
                },
            )
        })
        .collect();

    let config = WardenConfig {
        default_sign_in_scheme: raw.defaults.sign_in_scheme,
        schemes,
        policies,
        remote,
    };
    validate_config(&config)?;
    Ok(config)
}

pub fn write_default_config_files(dir: &Path) -> Result<(), WardenError> {
    fs::create_dir_all(dir)
        .map_err(|e| WardenError::Internal(format!("failed to create {}: {e}", dir.display())))?;

    let files: [(&str, &str); 1] = [(
        CONFIG_FILE_NAME,
        include_str!("../../../docs/warden/examples/warden.toml.example"),
    )];

    for (name, body) in files {
        let path = dir.join(name);
        if !path.exists() {
            fs::write(&path, body).map_err(|e| {
                WardenError::Internal(format!("failed to write {}: {e}", path.display()))
            })?;
        }
    }

    Ok(())
}
