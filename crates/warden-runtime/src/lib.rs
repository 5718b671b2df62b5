//! Wires configuration, scheme handlers and the policy evaluator together.

mod registry;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;
use warden_api::{
    AuthenticateOutcome, AuthorizationPolicy, AuthorizationService, HandlerFactory,
    PolicyAuthorizationResult, RequestContext, SecretStore, WardenError,
};
use warden_auth::{
    PolicyEvaluator, RemoteAuthenticationOptions, Result, set_default_sign_in_scheme,
};
use warden_core::{RemoteConfig, RequirementAuthorizationService, WardenConfig, validate_config};
use warden_handlers::{DefaultHandlerFactory, EnvSecretStore};

pub use registry::SchemeRegistry;

/// Outcome of running a named policy against one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyCheck {
    pub authentication: AuthenticateOutcome,
    pub authorization: PolicyAuthorizationResult,
}

pub struct WardenRuntime {
    config: WardenConfig,
    registry: Arc<SchemeRegistry>,
    policies: BTreeMap<String, AuthorizationPolicy>,
    remote: BTreeMap<String, RemoteAuthenticationOptions>,
    evaluator: PolicyEvaluator,
}

impl WardenRuntime {
    pub fn from_config(config: WardenConfig) -> Result<Self> {
        validate_config(&config)?;

        let secrets = EnvSecretStore;
        Self::from_config_with_factory(config, &DefaultHandlerFactory, &secrets)
    }

    pub fn from_config_with_factory(
        config: WardenConfig,
        factory: &dyn HandlerFactory,
        secrets: &dyn SecretStore,
    ) -> Result<Self> {
        Self::from_config_with(
            config,
            factory,
            secrets,
            Arc::new(RequirementAuthorizationService),
        )
    }

    /// Build a runtime with a custom authorization service.
    ///
    /// The process-wide default sign-in scheme is set, when configured,
    /// before any remote options are validated.
    ///
    /// # Errors
    ///
    /// Invalid configuration, handler construction failures, and remote
    /// options that fail validation.
    pub fn from_config_with(
        config: WardenConfig,
        factory: &dyn HandlerFactory,
        secrets: &dyn SecretStore,
        authorization: Arc<dyn AuthorizationService>,
    ) -> Result<Self> {
        validate_config(&config)?;

        if let Some(scheme) = &config.default_sign_in_scheme {
            set_default_sign_in_scheme(Some(scheme.clone()));
        }

        let mut registry = SchemeRegistry::new();
        for cfg in config.schemes.values() {
            registry.register(Arc::from(factory.build(cfg, secrets)?))?;
        }

        let policies = config
            .policies
            .iter()
            .map(|(name, cfg)| (name.clone(), cfg.to_policy()))
            .collect();

        let mut remote = BTreeMap::new();
        for (name, cfg) in &config.remote {
            let options = remote_options(cfg);
            options.validate_for_scheme(name)?;
            remote.insert(name.clone(), options);
        }

        let registry = Arc::new(registry);
        let evaluator = PolicyEvaluator::new(registry.clone(), authorization);

        info!(
            schemes = config.schemes.len(),
            policies = config.policies.len(),
            remote = config.remote.len(),
            "warden runtime ready"
        );

        Ok(Self {
            config,
            registry,
            policies,
            remote,
            evaluator,
        })
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemeRegistry {
        &self.registry
    }

    pub fn evaluator(&self) -> &PolicyEvaluator {
        &self.evaluator
    }

    pub fn policy(&self, name: &str) -> Option<&AuthorizationPolicy> {
        self.policies.get(name)
    }

    pub fn policy_names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    pub fn remote(&self, name: &str) -> Result<&RemoteAuthenticationOptions> {
        self.remote
            .get(name)
            .ok_or_else(|| WardenError::NotFound(format!("remote scheme {name} not found")).into())
    }

    /// Authenticate `ctx` for the named policy, then authorize it.
    ///
    /// # Errors
    ///
    /// [`warden_auth::Error::InvalidArgument`] when no policy has that name,
    /// plus any fault raised by a handler or the authorization service.
    pub async fn check(
        &self,
        policy_name: &str,
        ctx: &mut RequestContext,
    ) -> Result<PolicyCheck> {
        let policy = self.policies.get(policy_name);
        let authentication = match policy {
            Some(policy) => Some(self.evaluator.authenticate(policy, ctx).await?),
            None => None,
        };
        let authorization = self
            .evaluator
            .authorize(policy, authentication.as_ref(), ctx, None)
            .await?;
        let authentication = authentication.unwrap_or(AuthenticateOutcome::None);

        Ok(PolicyCheck {
            authentication,
            authorization,
        })
    }
}

fn remote_options(cfg: &RemoteConfig) -> RemoteAuthenticationOptions {
    let mut options = RemoteAuthenticationOptions::new(cfg.callback_path.clone());
    if let Some(secs) = cfg.backchannel_timeout_secs {
        options.backchannel_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = cfg.remote_authentication_timeout_secs {
        options.remote_authentication_timeout = Duration::from_secs(secs);
    }
    options.sign_in_scheme.clone_from(&cfg.sign_in_scheme);
    options.save_tokens = cfg.save_tokens;
    options.access_denied_path.clone_from(&cfg.access_denied_path);
    options.correlation_cookie.expiration = cfg
        .correlation_cookie_expiration_secs
        .map(Duration::from_secs);
    options
}
