//! Provider pool: one logical generator over several providers.

use std::sync::Arc;

use async_trait::async_trait;
use contentpipe_shared::{ContentPipeError, Result, SelectionStrategy};
use tracing::info;

use crate::TextGenerator;

/// Delegates each call to the provider picked by the selection strategy.
pub struct ProviderPool {
    providers: Vec<Arc<dyn TextGenerator>>,
    strategy: Arc<dyn SelectionStrategy>,
}

impl ProviderPool {
    pub fn new(
        providers: Vec<Arc<dyn TextGenerator>>,
        strategy: Arc<dyn SelectionStrategy>,
    ) -> Result<Self> {
        if providers.is_empty() {
            return Err(ContentPipeError::config("provider pool needs at least one provider"));
        }
        Ok(Self {
            providers,
            strategy,
        })
    }
}

#[async_trait]
impl TextGenerator for ProviderPool {
    async fn generate(&self, instruction: &str, input: &str) -> Result<String> {
        let index = self.strategy.pick(self.providers.len()).unwrap_or(0);
        let provider = &self.providers[index.min(self.providers.len() - 1)];
        info!(provider = provider.name(), "selected provider");
        provider.generate(instruction, input).await
    }

    fn name(&self) -> &str {
        "pool"
    }
}

#[cfg(test)]
mod tests {
    use contentpipe_shared::RoundRobin;

    use super::*;
    use crate::FakeGenerator;

    #[tokio::test]
    async fn delegates_by_strategy() {
        let a = Arc::new(FakeGenerator::named("a").with_default("from a"));
        let b = Arc::new(FakeGenerator::named("b").with_default("from b"));
        let providers: Vec<Arc<dyn TextGenerator>> = vec![a.clone(), b.clone()];
        let pool = ProviderPool::new(providers, Arc::new(RoundRobin::default())).unwrap();

        assert_eq!(pool.generate("i", "1").await.unwrap(), "from a");
        assert_eq!(pool.generate("i", "2").await.unwrap(), "from b");
        assert_eq!(pool.generate("i", "3").await.unwrap(), "from a");
        assert_eq!(a.calls().len(), 2);
        assert_eq!(b.calls().len(), 1);
    }

    #[test]
    fn empty_pool_rejected() {
        assert!(ProviderPool::new(vec![], Arc::new(RoundRobin::default())).is_err());
    }
}
