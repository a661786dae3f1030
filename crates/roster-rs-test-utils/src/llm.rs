use async_trait::async_trait;
use autoagents_llm::chat::{ChatMessage, ChatProvider, ChatResponse, StructuredOutputFormat, Tool};
use autoagents_llm::completion::{CompletionProvider, CompletionRequest, CompletionResponse};
use autoagents_llm::embedding::EmbeddingProvider;
use autoagents_llm::error::LLMError;
use autoagents_llm::models::ModelsProvider;
use autoagents_llm::{LLMProvider, ToolCall};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// The classifier only chats; the remaining provider traits answer with an
/// error naming the mock.
macro_rules! chat_only {
    ($mock:ty) => {
        #[async_trait]
        impl CompletionProvider for $mock {
            async fn complete(
                &self,
                _req: &CompletionRequest,
                _json_schema: Option<StructuredOutputFormat>,
            ) -> Result<CompletionResponse, LLMError> {
                Err(unsupported(stringify!($mock)))
            }
        }

        #[async_trait]
        impl EmbeddingProvider for $mock {
            async fn embed(&self, _input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError> {
                Err(unsupported(stringify!($mock)))
            }
        }

        #[async_trait]
        impl ModelsProvider for $mock {}

        impl LLMProvider for $mock {}
    };
}

fn unsupported(mock: &str) -> LLMError {
    LLMError::ProviderError(format!("{mock} only supports chat"))
}

/// Chat reply carrying plain text and no tool calls.
#[derive(Debug, Clone)]
pub struct FixedChatResponse(String);

impl FixedChatResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl std::fmt::Display for FixedChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ChatResponse for FixedChatResponse {
    fn text(&self) -> Option<String> {
        Some(self.0.clone())
    }

    fn tool_calls(&self) -> Option<Vec<ToolCall>> {
        None
    }
}

fn reply(text: &str) -> Result<Box<dyn ChatResponse>, LLMError> {
    Ok(Box::new(FixedChatResponse::new(text)))
}

/// Answers every chat with the same text.
#[derive(Debug, Clone)]
pub struct FixedLLM {
    response: String,
}

impl FixedLLM {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for FixedLLM {
    async fn chat_with_tools(
        &self,
        _messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        reply(&self.response)
    }
}

chat_only!(FixedLLM);

/// Replies with queued responses in order and records every conversation.
#[derive(Debug, Clone)]
pub struct ScriptedLLM {
    responses: Arc<Mutex<VecDeque<String>>>,
    pub conversations: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedLLM {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Into::into).collect())),
            conversations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Content of the last user message seen.
    pub fn last_user_message(&self) -> Option<String> {
        self.conversations
            .lock()
            .last()
            .and_then(|messages| messages.last())
            .map(|message| message.content.clone())
    }

    pub fn calls(&self) -> usize {
        self.conversations.lock().len()
    }
}

#[async_trait]
impl ChatProvider for ScriptedLLM {
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        self.conversations.lock().push(messages.to_vec());
        match self.responses.lock().pop_front() {
            Some(response) => reply(&response),
            None => Err(LLMError::ProviderError("script exhausted".to_string())),
        }
    }
}

chat_only!(ScriptedLLM);

#[derive(Debug, Clone)]
pub struct FailingLLM {
    message: String,
}

impl FailingLLM {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for FailingLLM {
    async fn chat_with_tools(
        &self,
        _messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        Err(LLMError::ProviderError(self.message.clone()))
    }
}

chat_only!(FailingLLM);

/// Answers after a delay, for timeout tests.
#[derive(Debug, Clone)]
pub struct SlowLLM {
    delay: Duration,
    response: String,
}

impl SlowLLM {
    pub fn new(delay: Duration, response: impl Into<String>) -> Self {
        Self {
            delay,
            response: response.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for SlowLLM {
    async fn chat_with_tools(
        &self,
        _messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        tokio::time::sleep(self.delay).await;
        reply(&self.response)
    }
}

chat_only!(SlowLLM);
