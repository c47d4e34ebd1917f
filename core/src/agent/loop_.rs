use crate::ChatRequest;
use crate::agent::ToolRegistry;
use crate::traits::{ChatMessage, Provider, ProviderEvent, ToolCall, ToolOutcome};
use anyhow::{Result, anyhow};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_MAX_ITERATIONS: usize = 10;

/// How a conversation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    /// The service answered with plain text.
    Answer(ChatMessage),
    /// A tool call failed; carries the tool-result message that was not sent back.
    ToolFailed(ChatMessage),
}

impl ChatOutcome {
    pub fn message(&self) -> &ChatMessage {
        match self {
            Self::Answer(m) | Self::ToolFailed(m) => m,
        }
    }

    pub fn content(&self) -> &str {
        &self.message().content
    }

    pub fn is_answer(&self) -> bool {
        matches!(self, Self::Answer(_))
    }
}

struct Turn {
    text: String,
    tool_calls: Vec<ToolCall>,
}

pub struct ChatLoop {
    provider: Arc<dyn Provider>,
    tool_registry: Arc<ToolRegistry>,
    model: String,
    temperature: f64,
    stream: bool,
    max_iterations: usize,
}

impl ChatLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        tool_registry: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tool_registry,
            model: model.into(),
            temperature: 0.0,
            stream: true,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Drives the conversation until the service answers with text or a tool
    /// call fails. Tool calls and their results are appended to `messages`.
    pub async fn run(&self, messages: &mut Vec<ChatMessage>) -> Result<ChatOutcome> {
        let tools = self.tool_registry.get_specs();

        for iteration in 1..=self.max_iterations {
            let request = ChatRequest {
                messages: messages.as_slice(),
                tools: if tools.is_empty() { None } else { Some(&tools) },
                parallel_tool_calls: false,
            };

            let turn = self.request_turn(request).await?;

            if turn.tool_calls.is_empty() {
                debug!(iteration, chars = turn.text.len(), "Received final answer");
                return Ok(ChatOutcome::Answer(ChatMessage::assistant(turn.text)));
            }

            let mut results = Vec::with_capacity(turn.tool_calls.len());
            for call in &turn.tool_calls {
                let outcome = self.tool_registry.execute(call).await;
                let message = ChatMessage::tool_result(call.id.clone(), outcome.content());

                match &outcome {
                    ToolOutcome::Output(output) => {
                        info!(tool = %call.name, %output, "Tool call succeeded");
                    }
                    ToolOutcome::Failed { error, .. } => {
                        warn!(tool = %call.name, %error, "Tool call failed, ending conversation");
                        return Ok(ChatOutcome::ToolFailed(message));
                    }
                }
                results.push(message);
            }

            messages.push(ChatMessage::tool_request(turn.text, turn.tool_calls));
            messages.extend(results);
        }

        Err(anyhow!(
            "No final answer after {} round trips",
            self.max_iterations
        ))
    }

    async fn request_turn(&self, request: ChatRequest<'_>) -> Result<Turn> {
        if !self.stream || !self.provider.supports_streaming() {
            let response = self
                .provider
                .chat(request, &self.model, self.temperature)
                .await?;
            return Ok(Turn {
                text: response.text,
                tool_calls: response.tool_calls,
            });
        }

        let mut events = self
            .provider
            .chat_stream(request, &self.model, self.temperature)
            .await?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();

        while let Some(event) = events.next().await {
            match event {
                ProviderEvent::Token(token) => text.push_str(&token),
                ProviderEvent::ToolCall(call) => tool_calls.push(call),
                ProviderEvent::Error(message) => {
                    return Err(anyhow!("Chat completion stream failed: {message}"));
                }
                ProviderEvent::Done => return Ok(Turn { text, tool_calls }),
            }
        }

        Err(anyhow!("Chat completion stream ended without a Done event"))
    }
}
