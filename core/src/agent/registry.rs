use crate::traits::{Tool, ToolCall, ToolOutcome, ToolSpec};
use serde_json::Value;
use std::sync::Arc;

/// Tools the model may call, looked up by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        tracing::debug!(tool = tool.name(), "Registering tool");
        self.tools.push(tool);
        self
    }

    pub fn get_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Decodes the streamed arguments and runs the named tool. Never fails:
    /// every problem becomes [`ToolOutcome::Failed`].
    pub async fn execute(&self, call: &ToolCall) -> ToolOutcome {
        let raw = if call.arguments.trim().is_empty() {
            "{}"
        } else {
            call.arguments.as_str()
        };

        let args: Value = match serde_json::from_str(raw) {
            Ok(args) => args,
            Err(e) => {
                return ToolOutcome::failed(
                    format!(
                        "Exception in handling tool '{}': invalid arguments: {}",
                        call.name, e
                    ),
                    Value::String(call.arguments.clone()),
                );
            }
        };

        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            return ToolOutcome::failed(
                format!("Tool '{}' not found or not callable.", call.name),
                args,
            );
        };

        tracing::debug!(tool = %call.name, %args, "Invoking tool");
        match tool.call(&args).await {
            Ok(output) => ToolOutcome::Output(output),
            Err(e) => ToolOutcome::failed(
                format!("Exception in handling tool '{}': {}", call.name, e),
                args,
            ),
        }
    }
}
