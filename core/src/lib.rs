pub mod agent;
pub mod config;
pub mod notebooks;
pub mod notify;
pub mod providers;
pub mod rag;
pub mod tools;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{ChatLoop, ChatOutcome, ToolRegistry};
pub use config::*;
pub use notebooks::*;
pub use notify::*;
pub use providers::*;
pub use rag::*;
pub use tools::*;
pub use traits::*;
