//! Built-in authentication scheme handlers.

mod api_key;
mod bearer;

use warden_api::{
    AuthenticationHandler, HandlerFactory, SchemeConfig, SchemeKind, SecretStore, WardenError,
};

pub use api_key::{ApiKeyHandler, DEFAULT_API_KEY_HEADER};
pub use bearer::{BearerHandler, DEFAULT_LEEWAY_SECONDS};

pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, secret_ref: &str) -> Result<String, WardenError> {
        std::env::var(secret_ref)
            .map_err(|_| WardenError::NotFound(format!("missing secret env var {secret_ref}")))
    }
}

#[derive(Default)]
pub struct DefaultHandlerFactory;

impl HandlerFactory for DefaultHandlerFactory {
    fn build(
        &self,
        cfg: &SchemeConfig,
        secrets: &dyn SecretStore,
    ) -> Result<Box<dyn AuthenticationHandler>, WardenError> {
        match cfg.kind {
            SchemeKind::ApiKey => Ok(Box::new(ApiKeyHandler::from_config(cfg))),
            SchemeKind::Bearer => {
                let secret_ref = cfg
                    .secret_ref
                    .as_deref()
                    .ok_or_else(|| WardenError::MissingOption("secret_ref".to_string()))?;
                let secret = secrets.get(secret_ref)?;
                Ok(Box::new(BearerHandler::new(
                    cfg.name.clone(),
                    &secret,
                    cfg.issuer.as_deref(),
                    cfg.audience.as_deref(),
                )?))
            }
        }
    }
}
