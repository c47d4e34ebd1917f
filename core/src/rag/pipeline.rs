use crate::agent::{ChatLoop, ChatOutcome};
use crate::rag::{Retriever, default_system_prompt, form_prompt};
use crate::traits::ChatMessage;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    chat: ChatLoop,
}

impl RagPipeline {
    pub fn new(retriever: Arc<dyn Retriever>, chat: ChatLoop) -> Self {
        Self { retriever, chat }
    }

    /// Answers `question`, returning the final text or the failed tool result.
    pub async fn ask(&self, question: &str) -> Result<ChatOutcome> {
        let context = self
            .retriever
            .retrieve(question)
            .await
            .context("Failed to retrieve context")?;
        let prompt = form_prompt(question, &context);
        info!("Invoking LLM with prompt + context\n{}", prompt);

        let mut messages = vec![
            ChatMessage::system(default_system_prompt()),
            ChatMessage::user(prompt),
        ];
        let outcome = self.chat.run(&mut messages).await?;
        debug!(messages = messages.len(), answered = outcome.is_answer(), "Conversation finished");

        Ok(outcome)
    }

    pub async fn answer(&self, question: &str) -> Result<String> {
        let outcome = self.ask(question).await?;
        Ok(format!("[RAG response] {}", outcome.content()))
    }
}
