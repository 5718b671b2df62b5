use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use warden_api::{
    AuthenticateResult, AuthenticationHandler, RequestContext, SchemeAuthenticator, WardenError,
};

/// Scheme name → handler, filled once at startup.
#[derive(Default, Clone)]
pub struct SchemeRegistry {
    handlers: BTreeMap<String, Arc<dyn AuthenticationHandler>>,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn AuthenticationHandler>) -> Result<(), WardenError> {
        let scheme = handler.scheme().to_string();
        if self.handlers.contains_key(&scheme) {
            return Err(WardenError::Validation(format!(
                "scheme {scheme} is already registered"
            )));
        }
        self.handlers.insert(scheme, handler);
        Ok(())
    }

    pub fn get(&self, scheme: &str) -> Option<&Arc<dyn AuthenticationHandler>> {
        self.handlers.get(scheme)
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

#[async_trait]
impl SchemeAuthenticator for SchemeRegistry {
    async fn authenticate(
        &self,
        scheme: &str,
        ctx: &RequestContext,
    ) -> Result<AuthenticateResult, WardenError> {
        let handler = self
            .handlers
            .get(scheme)
            .ok_or_else(|| WardenError::UnknownScheme(scheme.to_string()))?;
        handler.authenticate(ctx).await
    }
}

impl std::fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemeRegistry")
            .field("schemes", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use warden_api::{Identity, Principal};

    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl AuthenticationHandler for Fixed {
        fn scheme(&self) -> &str {
            self.0
        }

        async fn authenticate(
            &self,
            _ctx: &RequestContext,
        ) -> Result<AuthenticateResult, WardenError> {
            Ok(AuthenticateResult::success(
                Principal::from_identity(Identity::new(self.0)),
                self.0,
            ))
        }
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let mut registry = SchemeRegistry::new();
        registry.register(Arc::new(Fixed("A"))).unwrap();
        registry.register(Arc::new(Fixed("B"))).unwrap();

        let result = registry
            .authenticate("B", &RequestContext::default())
            .await
            .unwrap();
        assert_eq!(result.ticket().unwrap().scheme, "B");
        assert_eq!(registry.schemes().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn unknown_scheme_is_an_error() {
        let registry = SchemeRegistry::new();
        let err = registry
            .authenticate("Nope", &RequestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::UnknownScheme(s) if s == "Nope"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = SchemeRegistry::new();
        registry.register(Arc::new(Fixed("A"))).unwrap();
        assert!(registry.register(Arc::new(Fixed("A"))).is_err());
    }
}
