//! Building a chat model and getting one response out of it.
//!
//! Chat backends differ in how they want to be constructed and which call
//! forms they implement. Construction walks a fixed list of parameter sets and
//! keeps the first model that builds; invocation walks a fixed list of call
//! forms on that model and keeps the first response. Every attempt runs once,
//! in order, without delay. Nothing here retries.

pub mod openai;
#[cfg(test)]
pub(crate) mod testing;

use crate::api::ChatMessage;
use crate::core::credentials::Credential;
use crate::core::response::ChatResponse;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use tracing::debug;

/// Spelling of the model parameter handed to the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelParam {
    Model,
    ModelName,
}

impl ModelParam {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelParam::Model => "model",
            ModelParam::ModelName => "model_name",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
}

/// One construction attempt. `api_key: None` asks the factory to find the
/// credential on its own; `ambient_key` is what it should find there, the key
/// the credential resolver picked.
#[derive(Clone, PartialEq)]
pub struct ClientParams {
    pub model_param: ModelParam,
    pub model: String,
    pub temperature: f32,
    pub api_key: Option<String>,
    pub ambient_key: Option<String>,
}

impl ClientParams {
    pub fn label(&self) -> String {
        let credential = if self.api_key.is_some() {
            "explicit key"
        } else {
            "ambient key"
        };
        format!("{}={} ({credential})", self.model_param.as_str(), self.model)
    }
}

impl fmt::Debug for ClientParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientParams")
            .field("model_param", &self.model_param)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("ambient_key", &self.ambient_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Model/model_name with the ambient credential, then the same two with the
/// key passed explicitly. The explicit pair is skipped when there is no key.
/// Every attempt carries `api_key` as its ambient key.
pub fn construction_attempts(settings: &ModelSettings, api_key: Option<&str>) -> Vec<ClientParams> {
    let keys = std::iter::once(None).chain(api_key.map(|key| Some(key.to_string())));

    keys.flat_map(|key| {
        [ModelParam::Model, ModelParam::ModelName].map(|model_param| ClientParams {
            model_param,
            model: settings.model.clone(),
            temperature: settings.temperature,
            api_key: key.clone(),
            ambient_key: api_key.map(str::to_string),
        })
    })
    .collect()
}

#[derive(Debug)]
pub enum ModelError {
    /// The model does not implement this call form.
    Unsupported,
    /// The factory refused the construction parameters.
    Rejected(String),
    Transport(reqwest::Error),
    Api { status: u16, message: String },
    Decode(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Unsupported => write!(f, "no compatible invocation method"),
            ModelError::Rejected(reason) => write!(f, "{reason}"),
            ModelError::Transport(err) => write!(f, "request failed: {err}"),
            ModelError::Api { status, message } => write!(f, "HTTP {status}: {message}"),
            ModelError::Decode(reason) => write!(f, "unreadable response: {reason}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        ModelError::Transport(err)
    }
}

#[derive(Debug)]
pub enum ClientError {
    /// No construction attempt produced a model. Holds every attempt's error.
    Unavailable { attempts: Vec<(String, ModelError)> },
    /// A model was built but no call form produced a response.
    InvocationFailed { error: ModelError, trace: Vec<String> },
}

impl ClientError {
    /// One `attempt: error` line per failed construction attempt.
    pub fn construction_errors(&self) -> String {
        match self {
            ClientError::Unavailable { attempts } => attempts
                .iter()
                .map(|(label, err)| format!("{label}: {err}"))
                .collect::<Vec<_>>()
                .join("\n"),
            ClientError::InvocationFailed { .. } => String::new(),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Unavailable { attempts } => match attempts.last() {
                Some((_, last)) => write!(f, "no chat model could be constructed: {last}"),
                None => write!(f, "no chat model could be constructed"),
            },
            ClientError::InvocationFailed { error, .. } => write!(f, "{error}"),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientError::Unavailable { attempts } => {
                attempts.last().map(|(_, err)| err as &(dyn Error + 'static))
            }
            ClientError::InvocationFailed { error, .. } => Some(error),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatResponse, ModelError>;

    /// Legacy direct-call form.
    async fn call(&self, _messages: &[ChatMessage]) -> Result<ChatResponse, ModelError> {
        Err(ModelError::Unsupported)
    }

    fn supports_predict_messages(&self) -> bool {
        false
    }

    async fn predict_messages(&self, _messages: &[ChatMessage]) -> Result<ChatResponse, ModelError> {
        Err(ModelError::Unsupported)
    }

    fn supports_generate(&self) -> bool {
        false
    }

    /// Batch form: one list of generations per message list.
    async fn generate(&self, _batches: &[Vec<ChatMessage>]) -> Result<ChatResponse, ModelError> {
        Err(ModelError::Unsupported)
    }
}

pub trait ChatModelFactory: Send + Sync {
    fn construct(&self, params: &ClientParams) -> Result<Box<dyn ChatModel>, ModelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationForm {
    Invoke,
    Call,
    PredictMessages,
    Generate,
}

impl InvocationForm {
    pub const ORDER: [InvocationForm; 4] = [
        InvocationForm::Invoke,
        InvocationForm::Call,
        InvocationForm::PredictMessages,
        InvocationForm::Generate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InvocationForm::Invoke => "invoke",
            InvocationForm::Call => "call",
            InvocationForm::PredictMessages => "predict_messages",
            InvocationForm::Generate => "generate",
        }
    }

    fn is_supported(self, model: &dyn ChatModel) -> bool {
        match self {
            InvocationForm::Invoke | InvocationForm::Call => true,
            InvocationForm::PredictMessages => model.supports_predict_messages(),
            InvocationForm::Generate => model.supports_generate(),
        }
    }

    async fn run(
        self,
        model: &dyn ChatModel,
        messages: &[ChatMessage],
    ) -> Result<ChatResponse, ModelError> {
        match self {
            InvocationForm::Invoke => model.invoke(messages).await,
            InvocationForm::Call => model.call(messages).await,
            InvocationForm::PredictMessages => model.predict_messages(messages).await,
            InvocationForm::Generate => model.generate(&[messages.to_vec()]).await,
        }
    }
}

/// Tries each construction attempt in order and keeps the first model built.
pub fn construct_model(
    factory: &dyn ChatModelFactory,
    attempts: &[ClientParams],
) -> Result<Box<dyn ChatModel>, ClientError> {
    let mut failures = Vec::new();

    for params in attempts {
        match factory.construct(params) {
            Ok(model) => {
                debug!(attempt = %params.label(), "chat model constructed");
                return Ok(model);
            }
            Err(err) => {
                debug!(attempt = %params.label(), error = %err, "chat model construction failed");
                failures.push((params.label(), err));
            }
        }
    }

    Err(ClientError::Unavailable { attempts: failures })
}

/// Tries each supported call form in order and keeps the first response.
pub async fn invoke_model(
    model: &dyn ChatModel,
    messages: &[ChatMessage],
) -> Result<ChatResponse, ClientError> {
    let mut trace = Vec::new();
    let mut last_error = None;

    for form in InvocationForm::ORDER {
        if !form.is_supported(model) {
            continue;
        }

        match form.run(model, messages).await {
            Ok(response) => {
                debug!(form = form.as_str(), "chat model responded");
                return Ok(response);
            }
            Err(err) => {
                debug!(form = form.as_str(), error = %err, "chat model call failed");
                trace.push(format!("{}: {err}", form.as_str()));
                last_error = Some(err);
            }
        }
    }

    Err(ClientError::InvocationFailed {
        error: last_error.unwrap_or(ModelError::Unsupported),
        trace,
    })
}

/// Construction then invocation against one factory.
pub struct ClientAdapter {
    factory: Box<dyn ChatModelFactory>,
    settings: ModelSettings,
}

impl ClientAdapter {
    pub fn new(factory: Box<dyn ChatModelFactory>, settings: ModelSettings) -> Self {
        Self { factory, settings }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub async fn invoke(
        &self,
        credential: &Credential,
        messages: &[ChatMessage],
    ) -> Result<ChatResponse, ClientError> {
        let attempts = construction_attempts(&self.settings, credential.value.as_deref());
        let model = construct_model(self.factory.as_ref(), &attempts)?;
        invoke_model(model.as_ref(), messages).await
    }
}
