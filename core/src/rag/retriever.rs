use async_trait::async_trait;

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, question: &str) -> anyhow::Result<String>;
}

const PRODUCT_CONTEXT: &str = "Simple Water Bottle - Amber (limited edition launched Jan 1st 2025)
A water bottle designed with a perfect blend of functionality and aesthetics in mind. Crafted from high-quality, durable plastic with a sleek honey-colored finish.
Price: $24.99 
Dimensions: 10 inches height x 4 inches width";

/// Returns the same context for every question.
pub struct StaticRetriever {
    context: String,
}

impl Default for StaticRetriever {
    fn default() -> Self {
        Self::new(PRODUCT_CONTEXT)
    }
}

impl StaticRetriever {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _question: &str) -> anyhow::Result<String> {
        Ok(self.context.clone())
    }
}
