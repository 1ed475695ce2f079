use crate::config::LanguageModelConfig;
use crate::error::ModelInvocationError;
use crate::traits::LanguageModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const ERROR_ANSWER_PREFIX: &str = "Error: No valid response.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChatModel {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    api_key: Option<String>,
}

impl OpenAiChatModel {
    pub fn new(config: &LanguageModelConfig) -> Result<Self, ModelInvocationError> {
        let endpoint = url::Url::parse(&config.endpoint)?;
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.timeout,
            api_key: config.api_key.clone(),
        })
    }

    async fn request(&self, prompt: &str) -> Result<String, ModelInvocationError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "system",
                content: prompt,
            }],
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(ModelInvocationError::BackendResponse {
                backend: "chat completions".to_string(),
                status: status.as_u16(),
                details,
            });
        }

        let payload: ChatResponse = response.json().await?;
        first_choice_text(payload)
    }
}

fn first_choice_text(payload: ChatResponse) -> Result<String, ModelInvocationError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(ModelInvocationError::EmptyResponse)
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelInvocationError> {
        tokio::time::timeout(self.timeout, self.request(prompt))
            .await
            .map_err(|_| ModelInvocationError::Timeout(self.timeout.as_secs()))?
    }
}

/// Calls the model and never fails: errors come back as a readable answer.
pub struct AnswerGenerator<M: ?Sized> {
    model: Arc<M>,
}

impl<M: LanguageModel + ?Sized> AnswerGenerator<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self { model }
    }

    pub async fn generate(&self, prompt: &str) -> String {
        match self.model.complete(prompt).await {
            Ok(answer) => answer,
            Err(error) => {
                warn!(%error, "language model call failed");
                format!("{ERROR_ANSWER_PREFIX} {error}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn complete(&self, _prompt: &str) -> Result<String, ModelInvocationError> {
            Err(ModelInvocationError::Timeout(30))
        }
    }

    struct EchoModel;

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn complete(&self, prompt: &str) -> Result<String, ModelInvocationError> {
            Ok(format!("echo: {prompt}"))
        }
    }

    #[tokio::test]
    async fn model_failure_becomes_error_answer() {
        let generator = AnswerGenerator::new(Arc::new(FailingModel));
        let answer = generator.generate("prompt").await;

        assert!(answer.starts_with(ERROR_ANSWER_PREFIX));
        assert!(answer.contains("timed out"));
    }

    #[tokio::test]
    async fn model_answer_is_returned_verbatim() {
        let generator = AnswerGenerator::new(Arc::new(EchoModel));
        assert_eq!(generator.generate("hi").await, "echo: hi");
    }

    #[test]
    fn chat_response_takes_first_choice() -> Result<(), Box<dyn std::error::Error>> {
        let payload: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "  Mitosis.  "}}]}"#,
        )?;
        assert_eq!(first_choice_text(payload)?, "Mitosis.");
        Ok(())
    }

    #[test]
    fn chat_response_without_content_is_empty() -> Result<(), Box<dyn std::error::Error>> {
        let payload: ChatResponse = serde_json::from_str(r#"{"choices": []}"#)?;
        assert!(matches!(
            first_choice_text(payload),
            Err(ModelInvocationError::EmptyResponse)
        ));
        Ok(())
    }
}
