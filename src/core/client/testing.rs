//! Scripted chat models for exercising the construction and invocation paths,
//! plus a one-shot HTTP stub for the OpenAI backend.

use super::{ChatModel, ChatModelFactory, ClientParams, ModelError};
use crate::api::ChatMessage;
use crate::core::response::ChatResponse;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

type Outcome = Result<ChatResponse, String>;

fn to_model_result(form: &str, outcome: &Outcome) -> Result<ChatResponse, ModelError> {
    outcome.clone().map_err(|message| {
        ModelError::Rejected(format!("{form} failed: {message}"))
    })
}

#[derive(Clone)]
pub(crate) struct ScriptedModel {
    invoke: Outcome,
    call: Outcome,
    predict: Option<Outcome>,
    generate: Option<Outcome>,
    log: CallLog,
}

impl ScriptedModel {
    pub(crate) fn answering(text: &str) -> Self {
        Self::with_invoke(Ok(ChatResponse::text(text)))
    }

    pub(crate) fn with_invoke(invoke: Result<ChatResponse, &str>) -> Self {
        Self {
            invoke: invoke.map_err(str::to_string),
            call: Err("call down".to_string()),
            predict: None,
            generate: None,
            log: CallLog::default(),
        }
    }

    /// `invoke` and `call` fail; nothing else is supported.
    pub(crate) fn failing() -> Self {
        Self::with_invoke(Err("invoke down"))
    }

    pub(crate) fn with_predict(mut self, outcome: Result<ChatResponse, &str>) -> Self {
        self.predict = Some(outcome.map_err(str::to_string));
        self
    }

    pub(crate) fn with_generate(mut self, outcome: Result<ChatResponse, &str>) -> Self {
        self.generate = Some(outcome.map_err(str::to_string));
        self
    }

    pub(crate) fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn invoke(&self, _messages: &[ChatMessage]) -> Result<ChatResponse, ModelError> {
        self.log.push("invoke");
        to_model_result("invoke", &self.invoke)
    }

    async fn call(&self, _messages: &[ChatMessage]) -> Result<ChatResponse, ModelError> {
        self.log.push("call");
        to_model_result("call", &self.call)
    }

    fn supports_predict_messages(&self) -> bool {
        self.predict.is_some()
    }

    async fn predict_messages(&self, _messages: &[ChatMessage]) -> Result<ChatResponse, ModelError> {
        self.log.push("predict_messages");
        match &self.predict {
            Some(outcome) => to_model_result("predict_messages", outcome),
            None => Err(ModelError::Unsupported),
        }
    }

    fn supports_generate(&self) -> bool {
        self.generate.is_some()
    }

    async fn generate(&self, _batches: &[Vec<ChatMessage>]) -> Result<ChatResponse, ModelError> {
        self.log.push("generate");
        match &self.generate {
            Some(outcome) => to_model_result("generate", outcome),
            None => Err(ModelError::Unsupported),
        }
    }
}

type Acceptor = Box<dyn Fn(&ClientParams) -> bool + Send + Sync>;

/// Hands out clones of one scripted model for the attempts it accepts.
pub(crate) struct ScriptedFactory {
    model: ScriptedModel,
    accepts: Acceptor,
    log: CallLog,
}

impl ScriptedFactory {
    pub(crate) fn new(model: ScriptedModel, log: CallLog) -> Self {
        Self {
            model: model.with_log(log.clone()),
            accepts: Box::new(|_| true),
            log,
        }
    }

    pub(crate) fn accepting<F>(mut self, accepts: F) -> Self
    where
        F: Fn(&ClientParams) -> bool + Send + Sync + 'static,
    {
        self.accepts = Box::new(accepts);
        self
    }
}

impl ChatModelFactory for ScriptedFactory {
    fn construct(&self, params: &ClientParams) -> Result<Box<dyn ChatModel>, ModelError> {
        self.log.push(format!("construct {}", params.label()));
        if (self.accepts)(params) {
            Ok(Box::new(self.model.clone()))
        } else {
            Err(ModelError::Rejected(format!(
                "unexpected keyword argument '{}'",
                params.model_param.as_str()
            )))
        }
    }
}

pub(crate) const COMPLETION_BODY: &str = r#"{"id":"chatcmpl-1","model":"gpt-4o-mini","choices":[{"index":0,"message":{"role":"assistant","content":"Hello from stub"},"finish_reason":"stop"}]}"#;

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = socket.read(&mut chunk).await.expect("read request");
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        if let Some(header_end) = find_header_end(&buffer) {
            let headers = String::from_utf8_lossy(&buffer[..header_end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Serves one canned response and returns the raw request it received.
pub(crate) async fn spawn_stub(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub address");

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        let _ = socket.shutdown().await;
        request
    });

    (format!("http://{addr}/v1/"), handle)
}
