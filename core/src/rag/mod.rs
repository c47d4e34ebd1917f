pub mod pipeline;
pub mod prompt;
pub mod retriever;

pub use pipeline::RagPipeline;
pub use prompt::{FALLBACK_ANSWER, default_system_prompt, form_prompt};
pub use retriever::{Retriever, StaticRetriever};
