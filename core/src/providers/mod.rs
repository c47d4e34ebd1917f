pub mod factory;
pub mod openai;
pub mod stream;

pub use factory::create_provider;
pub use openai::OpenAIProvider;
pub use stream::StreamAssembler;
