use crate::traits::{ProviderEvent, ToolCall};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PendingToolCall {
    fn into_tool_call(self) -> ToolCall {
        let id = if self.id.is_empty() {
            format!("call_{:x}", md5::compute(self.arguments.as_bytes()))
        } else {
            self.id
        };

        ToolCall {
            id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

/// Turns server-sent chat completion chunks into [`ProviderEvent`]s.
///
/// Tool-call fragments are keyed by their `index`; the first non-empty id and
/// name win and argument fragments are concatenated until the service reports
/// `finish_reason = "tool_calls"`.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    pending: BTreeMap<usize, PendingToolCall>,
    completed: bool,
}

impl StreamAssembler {
    pub fn push_line(&mut self, line: &str) -> Vec<ProviderEvent> {
        let line = line.trim();

        if line == "data: [DONE]" {
            self.completed = true;
            return Vec::new();
        }

        if line.is_empty() {
            return Vec::new();
        }

        let Some(data) = line.strip_prefix("data:") else {
            return Vec::new();
        };

        match serde_json::from_str::<StreamResponse>(data.trim_start()) {
            Ok(response) => self.push_chunk(response),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unparseable stream chunk");
                Vec::new()
            }
        }
    }

    fn push_chunk(&mut self, response: StreamResponse) -> Vec<ProviderEvent> {
        let mut events = Vec::new();

        let Some(choice) = response.choices.into_iter().next() else {
            return events;
        };

        if let Some(content) = choice.delta.content
            && !content.is_empty()
        {
            events.push(ProviderEvent::Token(content));
        }

        for fragment in choice.delta.tool_calls.unwrap_or_default() {
            let entry = self.pending.entry(fragment.index).or_default();

            if let Some(id) = fragment.id
                && !id.is_empty()
                && entry.id.is_empty()
            {
                entry.id = id;
            }

            if let Some(function) = fragment.function {
                if let Some(name) = function.name
                    && !name.is_empty()
                    && entry.name.is_empty()
                {
                    entry.name = name;
                }
                if let Some(arguments) = function.arguments {
                    entry.arguments.push_str(&arguments);
                }
            }
        }

        match choice.finish_reason.as_deref() {
            Some("tool_calls") => {
                self.completed = true;
                events.extend(self.drain());
            }
            Some(_) => self.completed = true,
            None => {}
        }

        events
    }

    /// Whether the service signalled the end of its reply.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Flushes calls the service never closed with a `tool_calls` finish reason.
    pub fn finish(&mut self) -> Vec<ProviderEvent> {
        self.pending.retain(|_, call| !call.name.is_empty());
        self.drain()
    }

    fn drain(&mut self) -> Vec<ProviderEvent> {
        std::mem::take(&mut self.pending)
            .into_values()
            .map(|call| ProviderEvent::ToolCall(call.into_tool_call()))
            .collect()
    }
}
