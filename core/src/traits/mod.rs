pub mod execution;
pub mod provider;
pub mod tool;

pub use execution::{NotebookExecutor, Notifier};
pub use provider::{
    ChatMessage, ChatRequest, ChatResponse, Provider, ProviderEvent, Role, ToolCall,
};
pub use tool::{Tool, ToolOutcome, ToolSpec};
