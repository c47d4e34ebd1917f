pub mod loop_;
pub mod registry;

pub use loop_::{ChatLoop, ChatOutcome};
pub use registry::ToolRegistry;
