//! In-memory fakes shared by unit tests.

use crate::traits::{
    ChatMessage, ChatRequest, ChatResponse, NotebookExecutor, Notifier, Provider, ProviderEvent,
};
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;

/// Replays one scripted list of events per request.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Vec<ProviderEvent>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    parallel_flags: Mutex<Vec<bool>>,
    stream_calls: Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Vec<ProviderEvent>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
            parallel_flags: Mutex::new(Vec::new()),
            stream_calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn stream_calls(&self) -> usize {
        *self.stream_calls.lock().unwrap()
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn saw_parallel_tool_calls(&self) -> bool {
        self.parallel_flags.lock().unwrap().iter().any(|p| *p)
    }

    fn next_turn(&self, request: ChatRequest<'_>) -> anyhow::Result<Vec<ProviderEvent>> {
        self.requests.lock().unwrap().push(request.messages.to_vec());
        self.parallel_flags
            .lock()
            .unwrap()
            .push(request.parallel_tool_calls);
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("script exhausted"))
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(
        &self,
        request: ChatRequest<'_>,
        _model: &str,
        _temperature: f64,
    ) -> anyhow::Result<ChatResponse> {
        let mut response = ChatResponse::default();
        for event in self.next_turn(request)? {
            match event {
                ProviderEvent::Token(t) => response.text.push_str(&t),
                ProviderEvent::ToolCall(c) => response.tool_calls.push(c),
                ProviderEvent::Error(e) => anyhow::bail!(e),
                ProviderEvent::Done => break,
            }
        }
        Ok(response)
    }

    async fn chat_stream(
        &self,
        request: ChatRequest<'_>,
        _model: &str,
        _temperature: f64,
    ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
        *self.stream_calls.lock().unwrap() += 1;
        let events = self.next_turn(request)?;
        Ok(stream::iter(events).boxed())
    }
}

/// Fails the notebooks whose file names are listed.
pub struct FakeExecutor {
    failing: HashSet<String>,
    executed: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotebookExecutor for FakeExecutor {
    fn name(&self) -> &str {
        "fake"
    }

    async fn execute(&self, notebook: &Path) -> anyhow::Result<()> {
        let name = notebook
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.executed.lock().unwrap().push(name.clone());
        if self.failing.contains(&name) {
            anyhow::bail!("kernel died while running {name}");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn unreachable() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> anyhow::Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            anyhow::bail!("webhook unreachable");
        }
        Ok(())
    }
}

/// Accepts one HTTP request and answers with `parts`, written one at a time
/// with a short pause so the client sees them as separate reads. The socket
/// is closed afterwards. Resolves to the raw request text.
pub async fn serve_once(parts: Vec<Vec<u8>>) -> (String, tokio::task::JoinHandle<String>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&request);
            if let Some(split) = text.find("\r\n\r\n") {
                let length = text[..split]
                    .lines()
                    .find_map(|l| {
                        l.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if request.len() >= split + 4 + length {
                    break;
                }
            }
        }

        for part in parts {
            socket.write_all(&part).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let _ = socket.shutdown().await;

        String::from_utf8_lossy(&request).into_owned()
    });

    (url, handle)
}
