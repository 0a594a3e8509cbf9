//! OpenAI-compatible chat-completions backend.

use super::{ChatModel, ChatModelFactory, ClientParams, ModelError};
use crate::api::{first_message_object, ChatCompletion, ChatMessage, ChatRequest};
use crate::core::credentials::API_KEY_ENV;
use crate::core::response::{AssistantMessage, ChatResponse, Generation};
use crate::utils::api_error::format_api_error;
use crate::utils::url::construct_api_url;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct OpenAiFactory {
    base_url: String,
    timeout: Option<Duration>,
    use_system_proxy: bool,
    env: EnvLookup,
}

impl OpenAiFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            use_system_proxy: true,
            env: Box::new(|name| std::env::var(name).ok()),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ignore `HTTP(S)_PROXY` settings, e.g. for a server on localhost.
    pub fn without_proxy(mut self) -> Self {
        self.use_system_proxy = false;
        self
    }

    /// Replaces the environment lookup used for ambient credentials.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(env);
        self
    }

    /// The resolved key when the caller supplied one, the environment otherwise.
    fn ambient_key(&self, params: &ClientParams) -> Option<String> {
        match &params.ambient_key {
            Some(key) => Some(key.clone()),
            None => (self.env)(API_KEY_ENV),
        }
        .filter(|key| !key.is_empty())
    }
}

impl ChatModelFactory for OpenAiFactory {
    fn construct(&self, params: &ClientParams) -> Result<Box<dyn ChatModel>, ModelError> {
        if params.model.trim().is_empty() {
            return Err(ModelError::Rejected(format!(
                "{} must not be empty",
                params.model_param.as_str()
            )));
        }
        if !(0.0..=2.0).contains(&params.temperature) {
            return Err(ModelError::Rejected(format!(
                "temperature {} is outside 0.0..=2.0",
                params.temperature
            )));
        }

        let api_key = match &params.api_key {
            Some(key) => key.clone(),
            None => self.ambient_key(params).ok_or_else(|| {
                ModelError::Rejected(format!(
                    "{API_KEY_ENV} is not set in the environment and no key was passed"
                ))
            })?,
        };

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if !self.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(Box::new(OpenAiChatModel {
            client,
            base_url: self.base_url.clone(),
            api_key,
            model: params.model.clone(),
            temperature: params.temperature,
        }))
    }
}

pub struct OpenAiChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Value, ModelError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: self.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(construct_api_url(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: format_api_error(&body),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| ModelError::Decode(err.to_string()))
    }

    fn parse_completion(body: &Value) -> Result<ChatCompletion, ModelError> {
        serde_json::from_value(body.clone()).map_err(|err| ModelError::Decode(err.to_string()))
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    /// First choice as a message, or the whole body when it has none.
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatResponse, ModelError> {
        let body = self.complete(messages).await?;
        let content = Self::parse_completion(&body)
            .ok()
            .and_then(|completion| completion.choices.into_iter().next())
            .and_then(|choice| choice.message.content);

        Ok(match content {
            Some(content) => ChatResponse::text(content),
            None => ChatResponse::from_json(body),
        })
    }

    /// The first choice's raw message object.
    async fn call(&self, messages: &[ChatMessage]) -> Result<ChatResponse, ModelError> {
        let body = self.complete(messages).await?;
        Ok(match first_message_object(&body) {
            Some(message) => ChatResponse::Mapping(message.clone()),
            None => ChatResponse::from_json(body),
        })
    }

    fn supports_predict_messages(&self) -> bool {
        true
    }

    /// Like `invoke`, but a body without message content is an error.
    async fn predict_messages(&self, messages: &[ChatMessage]) -> Result<ChatResponse, ModelError> {
        let body = self.complete(messages).await?;
        Self::parse_completion(&body)?
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(ChatResponse::text)
            .ok_or_else(|| ModelError::Decode("completion has no message content".to_string()))
    }

    fn supports_generate(&self) -> bool {
        true
    }

    async fn generate(&self, batches: &[Vec<ChatMessage>]) -> Result<ChatResponse, ModelError> {
        let mut generations = Vec::with_capacity(batches.len());
        for messages in batches {
            let body = self.complete(messages).await?;
            let completion = Self::parse_completion(&body)?;
            generations.push(
                completion
                    .choices
                    .into_iter()
                    .map(|choice| Generation {
                        text: choice.message.content.clone(),
                        message: choice
                            .message
                            .content
                            .map(|content| AssistantMessage { content }),
                    })
                    .collect(),
            );
        }
        Ok(ChatResponse::Generations(generations))
    }
}
