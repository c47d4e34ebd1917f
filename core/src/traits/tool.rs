use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

/// What a tool call produced, as it will be reported back to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Output(String),
    Failed { error: String, arguments: Value },
}

impl ToolOutcome {
    pub fn failed(error: impl Into<String>, arguments: Value) -> Self {
        Self::Failed {
            error: error.into(),
            arguments,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Output(_))
    }

    /// Body of the `tool` message: the output as a JSON string, or
    /// `{"error": ..., "arguments": ...}`.
    pub fn content(&self) -> String {
        match self {
            Self::Output(output) => Value::String(output.clone()).to_string(),
            Self::Failed { error, arguments } => json!({
                "error": error,
                "arguments": arguments,
            })
            .to_string(),
        }
    }
}

/// Function definition advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(rename = "parameters")]
    pub parameters_schema: Value,
}

/// A locally implemented function the model may call by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> Value;

    /// Returns the text handed back to the model. `Err` becomes
    /// [`ToolOutcome::Failed`] in the registry.
    async fn call(&self, args: &Value) -> anyhow::Result<String>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters_schema: self.parameters_schema(),
        }
    }
}
