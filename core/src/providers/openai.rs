use crate::providers::stream::StreamAssembler;
use crate::traits::{ChatMessage, ChatResponse, Provider, ToolCall, ToolSpec};
use crate::{ChatRequest, ProviderEvent};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCallRequest<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct OpenAIToolCallRequest<'a> {
    id: &'a str,
    r#type: &'a str,
    function: OpenAIFunctionRequest<'a>,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionRequest<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAITool<'a> {
    r#type: &'a str,
    function: &'a ToolSpec,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

/// Client for any service speaking the OpenAI chat completions wire format.
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn convert_messages(messages: &[ChatMessage]) -> Vec<OpenAIMessage<'_>> {
        messages
            .iter()
            .map(|m| {
                let tool_calls = m.tool_calls.as_ref().map(|tcs| {
                    tcs.iter()
                        .map(|tc| OpenAIToolCallRequest {
                            id: &tc.id,
                            r#type: "function",
                            function: OpenAIFunctionRequest {
                                name: &tc.name,
                                arguments: &tc.arguments,
                            },
                        })
                        .collect()
                });

                // An assistant turn that only carries tool calls has no content.
                let content = if m.content.is_empty() && tool_calls.is_some() {
                    None
                } else {
                    Some(m.content.as_str())
                };

                OpenAIMessage {
                    role: m.role.as_str(),
                    content,
                    tool_calls,
                    tool_call_id: m.tool_call_id.as_deref(),
                }
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<OpenAITool<'_>> {
        tools
            .iter()
            .map(|function| OpenAITool {
                r#type: "function",
                function,
            })
            .collect()
    }

    fn build_request<'a>(
        request: ChatRequest<'a>,
        model: &'a str,
        temperature: f64,
        stream: bool,
    ) -> OpenAIRequest<'a> {
        let tools = request.tools.filter(|t| !t.is_empty()).map(Self::convert_tools);
        let parallel_tool_calls = tools.as_ref().map(|_| request.parallel_tool_calls);

        OpenAIRequest {
            model,
            messages: Self::convert_messages(request.messages),
            tools,
            parallel_tool_calls,
            temperature,
            stream,
        }
    }

    async fn send(&self, body: &OpenAIRequest<'_>) -> anyhow::Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Chat completion API error {}: {}",
                status,
                error_text
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn chat(
        &self,
        request: ChatRequest<'_>,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<ChatResponse> {
        let body = Self::build_request(request, model, temperature, false);
        let response = self.send(&body).await?;
        let openai_response: OpenAIResponse = response.json().await?;

        let message = openai_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow::anyhow!("No choices in response"))?;

        let tool_calls: Vec<ToolCall> = message
            .tool_calls
            .map(|calls| {
                calls
                    .into_iter()
                    .map(|c| ToolCall {
                        id: c.id,
                        name: c.function.name,
                        arguments: c.function.arguments,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            text: message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    async fn chat_stream(
        &self,
        request: ChatRequest<'_>,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
        let body = Self::build_request(request, model, temperature, true);
        let response = self.send(&body).await?;

        let (tx, rx) = tokio::sync::mpsc::channel::<ProviderEvent>(256);

        tokio::spawn(async move {
            // A send error only means the receiver went away.
            let _ = pump_events(response, tx).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

type EventSender = tokio::sync::mpsc::Sender<ProviderEvent>;
type EventSendError = tokio::sync::mpsc::error::SendError<ProviderEvent>;

/// Forwards the SSE body as events. Ends in `Done` only when the service
/// finished its reply; otherwise the last event is `Error` and any
/// half-assembled tool call is dropped.
async fn pump_events(response: reqwest::Response, tx: EventSender) -> Result<(), EventSendError> {
    use futures_util::StreamExt as _;

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    let mut assembler = StreamAssembler::default();

    while let Some(chunk_result) = stream.next().await {
        let chunk = match chunk_result {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "Chat completion stream interrupted");
                return tx
                    .send(ProviderEvent::Error(format!(
                        "Chat completion stream interrupted: {e}"
                    )))
                    .await;
            }
        };
        buffer.extend_from_slice(&chunk);

        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            for event in assembler.push_line(&String::from_utf8_lossy(&line)) {
                tx.send(event).await?;
            }
        }
    }

    if !buffer.is_empty() {
        for event in assembler.push_line(&String::from_utf8_lossy(&buffer)) {
            tx.send(event).await?;
        }
    }

    if !assembler.is_complete() {
        tracing::warn!("Chat completion stream closed before the reply finished");
        return tx
            .send(ProviderEvent::Error(
                "Chat completion stream closed before the reply finished".to_string(),
            ))
            .await;
    }

    for event in assembler.finish() {
        tx.send(event).await?;
    }
    tx.send(ProviderEvent::Done).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_once;
    use serde_json::json;

    #[test]
    fn request_disables_parallel_tool_calls_only_with_tools() {
        let messages = vec![ChatMessage::user("hi")];
        let tools = vec![ToolSpec {
            name: "get_todays_date".into(),
            description: "date".into(),
            parameters_schema: json!({"type": "object"}),
        }];

        let with_tools = OpenAIProvider::build_request(
            ChatRequest {
                messages: &messages,
                tools: Some(&tools),
                parallel_tool_calls: false,
            },
            "gpt-4o",
            0.0,
            true,
        );
        let value = serde_json::to_value(&with_tools).unwrap();
        assert_eq!(value["parallel_tool_calls"], json!(false));
        assert_eq!(value["stream"], json!(true));
        assert_eq!(value["tools"][0]["function"]["name"], json!("get_todays_date"));
        assert_eq!(
            value["tools"][0]["function"]["parameters"],
            json!({"type": "object"})
        );

        let without_tools = OpenAIProvider::build_request(
            ChatRequest {
                messages: &messages,
                tools: None,
                parallel_tool_calls: false,
            },
            "gpt-4o",
            0.0,
            false,
        );
        let value = serde_json::to_value(&without_tools).unwrap();
        assert!(value.get("parallel_tool_calls").is_none());
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn tool_call_message_omits_empty_content() {
        let messages = vec![
            ChatMessage::tool_request(
                "",
                vec![ToolCall {
                    id: "call_1".into(),
                    name: "get_todays_date".into(),
                    arguments: r#"{"date_format":"%Y"}"#.into(),
                }],
            ),
            ChatMessage::tool_result("call_1", "\"2025\""),
        ];

        let converted = OpenAIProvider::convert_messages(&messages);
        let value = serde_json::to_value(&converted).unwrap();

        assert!(value[0].get("content").is_none());
        assert_eq!(value[0]["tool_calls"][0]["type"], json!("function"));
        assert_eq!(
            value[0]["tool_calls"][0]["function"]["arguments"],
            json!(r#"{"date_format":"%Y"}"#)
        );
        assert_eq!(value[1]["role"], json!("tool"));
        assert_eq!(value[1]["tool_call_id"], json!("call_1"));
        assert_eq!(value[1]["content"], json!("\"2025\""));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let provider = OpenAIProvider::new("key").with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    const SSE_HEAD: &str =
        "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";

    fn provider_for(url: &str) -> OpenAIProvider {
        OpenAIProvider::new("test-key").with_base_url(format!("{url}/v1"))
    }

    fn request(messages: &[ChatMessage]) -> ChatRequest<'_> {
        ChatRequest {
            messages,
            tools: None,
            parallel_tool_calls: false,
        }
    }

    async fn collect_stream(provider: &OpenAIProvider) -> Vec<ProviderEvent> {
        use futures_util::StreamExt as _;

        let messages = vec![ChatMessage::user("price?")];
        provider
            .chat_stream(request(&messages), "gpt-4o", 0.0)
            .await
            .unwrap()
            .collect()
            .await
    }

    #[tokio::test]
    async fn server_error_status_is_an_error() {
        let (url, server) = serve_once(vec![
            b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 8\r\nconnection: close\r\n\r\noverload"
                .to_vec(),
        ])
        .await;

        let messages = vec![ChatMessage::user("hi")];
        let err = provider_for(&url)
            .chat(request(&messages), "gpt-4o", 0.0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("overload"));

        let sent = server.await.unwrap();
        assert!(sent.starts_with("POST /v1/chat/completions"));
        assert!(sent.to_ascii_lowercase().contains("authorization: bearer test-key"));
    }

    #[tokio::test]
    async fn empty_reply_is_an_empty_answer() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let (url, _server) = serve_once(vec![
            format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .into_bytes(),
        ])
        .await;

        let messages = vec![ChatMessage::user("hi")];
        let response = provider_for(&url)
            .chat(request(&messages), "gpt-4o", 0.0)
            .await
            .unwrap();
        assert_eq!(response, ChatResponse::default());
    }

    #[tokio::test]
    async fn lines_split_across_chunks_are_reassembled() {
        let body = concat!(
            r#"data: {"choices":[{"delta":{"content":"The price"}}]}"#,
            "\n\n",
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_7","function":{"name":"get_todays_date","arguments":"{\"date_format\": \"%d\"}"}}]}}]}"#,
            "\n\n",
            r#"data: {"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            "\n\n",
            "data: [DONE]\n\n",
        );
        let first_cut = body.find("price").unwrap() + 2;
        let second_cut = body.find("date_format").unwrap() + 4;

        let (url, _server) = serve_once(vec![
            SSE_HEAD.as_bytes().to_vec(),
            body[..first_cut].as_bytes().to_vec(),
            body[first_cut..second_cut].as_bytes().to_vec(),
            body[second_cut..].as_bytes().to_vec(),
        ])
        .await;

        let events = collect_stream(&provider_for(&url)).await;

        assert_eq!(
            events,
            vec![
                ProviderEvent::Token("The price".into()),
                ProviderEvent::ToolCall(ToolCall {
                    id: "call_7".into(),
                    name: "get_todays_date".into(),
                    arguments: r#"{"date_format": "%d"}"#.into(),
                }),
                ProviderEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn broken_chunked_body_ends_in_error() {
        let chunk = "data: {\"choices\":[{\"delta\":{\"content\":\"The price is $2\"}}]}\n\n";
        let (url, _server) = serve_once(vec![
            b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n"
                .to_vec(),
            format!("{:x}\r\n{}\r\n", chunk.len(), chunk).into_bytes(),
        ])
        .await;

        let events = collect_stream(&provider_for(&url)).await;

        assert_eq!(events[0], ProviderEvent::Token("The price is $2".into()));
        assert!(matches!(events.last(), Some(ProviderEvent::Error(_))));
        assert!(!events.contains(&ProviderEvent::Done));
    }

    #[tokio::test]
    async fn stream_closed_before_finish_ends_in_error() {
        let (url, _server) = serve_once(vec![
            SSE_HEAD.as_bytes().to_vec(),
            br#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"get_todays_date","arguments":"{\"date"}}]}}]}"#.to_vec(),
            b"\n\n".to_vec(),
        ])
        .await;

        let events = collect_stream(&provider_for(&url)).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            ProviderEvent::Error(message) => assert!(message.contains("before the reply finished")),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
