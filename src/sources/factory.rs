//! Source code to strategy constructor

use std::collections::BTreeMap;
use std::sync::Arc;

use super::registry::{RegistryError, SourceRegistry};
use super::{
    ao_papardo, arnas_civico, asp_agrigento, asp_caltanissetta, asp_palermo, ospedali_riuniti,
    policlinico_catania, policlinico_messina, policlinico_palermo, HospitalScraper,
    ScraperContext, SourceBinding, SourceCode,
};

/// Builds a strategy for one binding
pub type ScraperConstructor =
    Arc<dyn Fn(SourceBinding, &ScraperContext) -> Box<dyn HospitalScraper> + Send + Sync>;

/// Resolves hospital ids to strategy instances
#[derive(Clone)]
pub struct ScraperFactory {
    registry: Arc<SourceRegistry>,
    constructors: BTreeMap<SourceCode, ScraperConstructor>,
}

impl ScraperFactory {
    /// Factory with no strategies registered
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self {
            registry,
            constructors: BTreeMap::new(),
        }
    }

    /// Factory with every built-in strategy registered
    pub fn standard(registry: Arc<SourceRegistry>) -> Self {
        let mut factory = Self::new(registry);
        for code in SourceCode::ALL {
            let constructor = builtin_constructor(code);
            // ALL has no duplicates
            if factory.register(code, constructor).is_err() {
                tracing::error!(source = %code, "Built-in strategy registered twice");
            }
        }
        factory
    }

    /// Register the constructor for a code
    ///
    /// # Errors
    ///
    /// Fails if the code already has a constructor
    pub fn register(
        &mut self,
        code: SourceCode,
        constructor: ScraperConstructor,
    ) -> Result<(), RegistryError> {
        if self.constructors.contains_key(&code) {
            return Err(RegistryError::DuplicateStrategy(code));
        }
        self.constructors.insert(code, constructor);
        Ok(())
    }

    /// Instantiate the strategy for a hospital
    ///
    /// # Errors
    ///
    /// Fails if the hospital has no registry entry or its code has no strategy
    pub fn create(
        &self,
        hospital_id: i64,
        context: &ScraperContext,
    ) -> Result<Box<dyn HospitalScraper>, RegistryError> {
        let code = self
            .registry
            .code_for(hospital_id)
            .ok_or(RegistryError::HospitalNotRegistered(hospital_id))?;
        let constructor = self
            .constructors
            .get(&code)
            .ok_or(RegistryError::NoStrategy(code))?;

        Ok(constructor(SourceBinding { hospital_id, code }, context))
    }

    /// Codes with a registered strategy
    pub fn available_sources(&self) -> Vec<SourceCode> {
        self.constructors.keys().copied().collect()
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }
}

/// Wrap a concrete strategy constructor
pub fn constructor<S, F>(build: F) -> ScraperConstructor
where
    S: HospitalScraper + 'static,
    F: Fn(SourceBinding, &ScraperContext) -> S + Send + Sync + 'static,
{
    Arc::new(
        move |binding: SourceBinding, ctx: &ScraperContext| -> Box<dyn HospitalScraper> {
            Box::new(build(binding, ctx))
        },
    )
}

fn builtin_constructor(code: SourceCode) -> ScraperConstructor {
    use super::SourceFamily::*;

    match code.family() {
        AspPalermo => constructor(asp_palermo::AspPalermoScraper::new),
        PoliclinicoPalermo => constructor(policlinico_palermo::PoliclinicoPalermoScraper::new),
        AspAgrigento => constructor(asp_agrigento::AspAgrigentoScraper::new),
        AspCaltanissetta => constructor(asp_caltanissetta::AspCaltanissettaScraper::new),
        OspedaliRiuniti => constructor(ospedali_riuniti::OspedaliRiunitiScraper::new),
        ArnasCivico => constructor(arnas_civico::ArnasCivicoScraper::new),
        PoliclinicoCatania => constructor(policlinico_catania::PoliclinicoCataniaScraper::new),
        AoPapardo => constructor(ao_papardo::AoPapardoScraper::new),
        PoliclinicoMessina => constructor(policlinico_messina::PoliclinicoMessinaScraper::new),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{RequestOptions, Transport};
    use crate::utils::error::FetchError;
    use async_trait::async_trait;

    struct NoTransport;

    #[async_trait]
    impl Transport for NoTransport {
        async fn get(&self, url: &str, _options: &RequestOptions) -> Result<String, FetchError> {
            Err(FetchError::Connect(url.to_string()))
        }
    }

    fn context() -> ScraperContext {
        ScraperContext::new(Arc::new(NoTransport))
    }

    #[test]
    fn test_every_registered_hospital_resolves() {
        let registry = Arc::new(SourceRegistry::standard());
        let factory = ScraperFactory::standard(registry.clone());
        let ctx = context();

        for (id, code) in registry.entries() {
            let scraper = factory.create(id, &ctx).unwrap();
            assert_eq!(scraper.hospital_id(), id);
            assert_eq!(scraper.source_code(), code);
        }
        assert_eq!(factory.available_sources().len(), 21);
    }

    #[test]
    fn test_unregistered_hospital() {
        let factory = ScraperFactory::standard(Arc::new(SourceRegistry::standard()));
        let err = factory.create(99, &context()).err().unwrap();
        assert_eq!(err, RegistryError::HospitalNotRegistered(99));
    }

    #[test]
    fn test_missing_strategy() {
        let mut registry = SourceRegistry::new();
        registry.register(5, SourceCode::PsSciacca).unwrap();
        let factory = ScraperFactory::new(Arc::new(registry));

        let err = factory.create(5, &context()).err().unwrap();
        assert_eq!(err, RegistryError::NoStrategy(SourceCode::PsSciacca));
    }

    #[test]
    fn test_duplicate_strategy_rejected() {
        let mut factory = ScraperFactory::standard(Arc::new(SourceRegistry::standard()));
        let err = factory
            .register(SourceCode::AoPapardo, builtin_constructor(SourceCode::AoPapardo))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateStrategy(SourceCode::AoPapardo));
    }
}
