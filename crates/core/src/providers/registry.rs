use super::traits::QuoteProvider;
use super::yahoo_finance::YahooFinanceProvider;

/// Ordered registry of upstream quote providers.
///
/// Registration order is fallback priority: the quote service tries
/// each provider in turn until one succeeds. New sources can be added
/// without touching the fetch logic.
pub struct ProviderRegistry {
    providers: Vec<Box<dyn QuoteProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Create a registry with the default provider set.
    ///
    /// Yahoo Finance is the primary (and currently only) default source;
    /// connector construction can fail, in which case the registry is
    /// empty and every refresh degrades to last-known-good data.
    pub fn new_with_defaults() -> Self {
        let mut registry = Self::new();

        if let Ok(yahoo) = YahooFinanceProvider::new() {
            registry.register(Box::new(yahoo));
        }

        registry
    }

    /// Register a provider at the end of the fallback chain.
    pub fn register(&mut self, provider: Box<dyn QuoteProvider>) {
        self.providers.push(provider);
    }

    /// All providers in priority order.
    #[must_use]
    pub fn providers(&self) -> &[Box<dyn QuoteProvider>] {
        &self.providers
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Names of registered providers, in fallback order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
