//! One question in, one string out.
//!
//! Every stage reports failure through [`AnswerError`]; [`Orchestrator::answer`]
//! renders each error kind as a message, so callers always get something to
//! display.

use crate::core::client::{ClientAdapter, ClientError};
use crate::core::credentials::{CredentialResolver, CredentialSource};
use crate::core::expert::{Expert, ExpertRegistry};
use crate::core::prompt::build_messages;
use crate::core::response::extract_text;
use std::fmt;
use tracing::debug;

pub const MISSING_CREDENTIAL_MESSAGE: &str = "No OpenAI API key was found. \
Add `OPENAI_API_KEY` to secrets.toml (or an `[openai]` table with `api_key`), \
run `expert-mode auth`, or export `OPENAI_API_KEY` in the environment.";

const CLIENT_UNAVAILABLE_HINT: &str = "Check the chat client settings in config.toml:\n\
  model = \"gpt-4o-mini\"\n\
  temperature = 0.3\n\
  base_url = \"https://api.openai.com/v1\"";

#[derive(Debug)]
pub enum AnswerError {
    CredentialMissing,
    Client(ClientError),
}

impl fmt::Display for AnswerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerError::CredentialMissing => write!(f, "no API key in any credential source"),
            AnswerError::Client(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AnswerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnswerError::CredentialMissing => None,
            AnswerError::Client(err) => Some(err),
        }
    }
}

impl From<ClientError> for AnswerError {
    fn from(err: ClientError) -> Self {
        AnswerError::Client(err)
    }
}

/// A successful answer plus what produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEnvelope {
    pub answer_text: String,
    pub expert_label: String,
    pub model_name: String,
    pub credential_source: CredentialSource,
}

impl fmt::Display for ResultEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n\n---\n(Expert: {} | Model: {} | Key source: {})",
            self.answer_text, self.expert_label, self.model_name, self.credential_source
        )
    }
}

pub struct Orchestrator<'a> {
    experts: &'a ExpertRegistry,
    credentials: CredentialResolver,
    client: ClientAdapter,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        experts: &'a ExpertRegistry,
        credentials: CredentialResolver,
        client: ClientAdapter,
    ) -> Self {
        Self {
            experts,
            credentials,
            client,
        }
    }

    /// Never fails: errors come back as diagnostic text.
    pub async fn answer(&self, user_text: &str, expert_code: &str) -> String {
        match self.try_answer(user_text, expert_code).await {
            Ok(envelope) => envelope.to_string(),
            Err(err) => {
                debug!(error = %err, "answer failed");
                self.render_error(&err)
            }
        }
    }

    pub async fn try_answer(
        &self,
        user_text: &str,
        expert_code: &str,
    ) -> Result<ResultEnvelope, AnswerError> {
        let credential = self.credentials.resolve();
        if !credential.is_present() {
            return Err(AnswerError::CredentialMissing);
        }
        debug!(source = %credential.source, "credential resolved");

        let expert: &Expert = self.experts.get(expert_code);
        let messages = build_messages(expert, user_text);
        let response = self.client.invoke(&credential, &messages).await?;

        Ok(ResultEnvelope {
            answer_text: extract_text(&response),
            expert_label: expert.label.clone(),
            model_name: self.client.settings().model.clone(),
            credential_source: credential.source,
        })
    }

    fn render_error(&self, err: &AnswerError) -> String {
        let model = &self.client.settings().model;
        match err {
            AnswerError::CredentialMissing => MISSING_CREDENTIAL_MESSAGE.to_string(),
            AnswerError::Client(client_err @ ClientError::Unavailable { .. }) => format!(
                "Failed to set up the chat client for model {model}.\n\
                 {CLIENT_UNAVAILABLE_HINT}\n\nDetails:\n{}",
                client_err.construction_errors()
            ),
            AnswerError::Client(ClientError::InvocationFailed { error, trace }) => format!(
                "The chat request to model {model} failed. Details: {error}\n\nAttempts:\n{}",
                trace.join("\n")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::openai::OpenAiFactory;
    use crate::core::client::testing::{
        spawn_stub, CallLog, ScriptedFactory, ScriptedModel, COMPLETION_BODY,
    };
    use crate::core::client::{ModelParam, ModelSettings};
    use crate::core::response::{ChatResponse, Generation};
    use crate::core::secrets::{SecretStore, SecretStoreError};
    use serde_json::json;

    struct FixedStore(Option<&'static str>);

    impl SecretStore for FixedStore {
        fn describe(&self) -> String {
            "fixed".to_string()
        }

        fn lookup(&self, path: &[&str]) -> Result<Option<String>, SecretStoreError> {
            Ok(match path {
                ["OPENAI_API_KEY"] => self.0.map(str::to_string),
                _ => None,
            })
        }

        fn store(&self, _path: &[&str], _value: &str) -> Result<(), SecretStoreError> {
            Ok(())
        }

        fn remove(&self, _path: &[&str]) -> Result<bool, SecretStoreError> {
            Ok(false)
        }
    }

    fn settings() -> ModelSettings {
        ModelSettings {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
        }
    }

    fn orchestrator<'a>(
        experts: &'a ExpertRegistry,
        store_key: Option<&'static str>,
        env_key: Option<&'static str>,
        factory: ScriptedFactory,
    ) -> Orchestrator<'a> {
        let credentials = CredentialResolver::with_env(Box::new(FixedStore(store_key)), move |_| {
            env_key.map(str::to_string)
        });
        Orchestrator::new(
            experts,
            credentials,
            ClientAdapter::new(Box::new(factory), settings()),
        )
    }

    #[tokio::test]
    async fn env_credential_and_direct_text_answer() {
        let experts = ExpertRegistry::builtin();
        let factory = ScriptedFactory::new(ScriptedModel::answering("Hello"), CallLog::default());
        let orchestrator = orchestrator(&experts, None, Some("sk-env"), factory);

        let answer = orchestrator.answer("hi", "A").await;
        assert!(answer.starts_with("Hello"));
        let label = &experts.get("A").label;
        assert!(answer.ends_with(&format!(
            "(Expert: {label} | Model: gpt-4o-mini | Key source: env)"
        )));
        assert_eq!(
            answer,
            format!(
                "Hello\n\n---\n(Expert: {label} | Model: gpt-4o-mini | Key source: env)"
            )
        );
    }

    #[tokio::test]
    async fn missing_credential_never_touches_the_factory() {
        let experts = ExpertRegistry::builtin();
        let log = CallLog::default();
        let factory = ScriptedFactory::new(ScriptedModel::answering("unused"), log.clone());
        let orchestrator = orchestrator(&experts, None, None, factory);

        let answer = orchestrator.answer("hi", "A").await;
        assert_eq!(answer, MISSING_CREDENTIAL_MESSAGE);
        assert!(answer.contains("OPENAI_API_KEY"));
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn store_credential_reports_secrets_source() {
        let experts = ExpertRegistry::builtin();
        let factory = ScriptedFactory::new(ScriptedModel::answering("Yo"), CallLog::default())
            .accepting(|params| params.api_key.as_deref() == Some("sk-store"));
        let orchestrator = orchestrator(&experts, Some("sk-store"), Some("sk-env"), factory);

        let envelope = orchestrator.try_answer("hi", "B").await.expect("answer");
        assert_eq!(envelope.credential_source, CredentialSource::PrimaryStore);
        assert_eq!(envelope.expert_label, experts.get("B").label);
        assert!(envelope.to_string().ends_with("Key source: secrets)"));
    }

    #[tokio::test]
    async fn request_carries_the_key_the_footer_reports() {
        let experts = ExpertRegistry::builtin();
        let (base_url, server) = spawn_stub(200, COMPLETION_BODY).await;
        let factory = OpenAiFactory::new(base_url)
            .without_proxy()
            .with_env(|_| Some("sk-env".to_string()));
        let credentials = CredentialResolver::with_env(
            Box::new(FixedStore(Some("sk-store"))),
            |_| Some("sk-env".to_string()),
        );
        let orchestrator = Orchestrator::new(
            &experts,
            credentials,
            ClientAdapter::new(Box::new(factory), settings()),
        );

        let answer = orchestrator.answer("hi", "A").await;
        assert!(answer.starts_with("Hello from stub"));
        assert!(answer.ends_with("Key source: secrets)"));

        let request = server.await.expect("stub task").to_lowercase();
        assert!(request.contains("authorization: bearer sk-store"));
        assert!(!request.contains("sk-env"));
    }

    #[tokio::test]
    async fn unknown_expert_uses_default_label() {
        let experts = ExpertRegistry::builtin();
        let factory = ScriptedFactory::new(ScriptedModel::answering("ok"), CallLog::default());
        let orchestrator = orchestrator(&experts, None, Some("sk-env"), factory);

        let envelope = orchestrator.try_answer("hi", "Q").await.expect("answer");
        assert_eq!(envelope.expert_label, experts.default_expert().label);
    }

    #[tokio::test]
    async fn construction_failure_lists_every_attempt() {
        let experts = ExpertRegistry::builtin();
        let factory = ScriptedFactory::new(ScriptedModel::answering("unused"), CallLog::default())
            .accepting(|_| false);
        let orchestrator = orchestrator(&experts, None, Some("sk-env"), factory);

        let answer = orchestrator.answer("hi", "A").await;
        assert!(answer.starts_with("Failed to set up the chat client for model gpt-4o-mini."));
        assert!(answer.contains("model = \"gpt-4o-mini\""));
        assert!(answer.contains("model=gpt-4o-mini (ambient key): unexpected keyword argument 'model'"));
        assert!(answer.contains(
            "model_name=gpt-4o-mini (explicit key): unexpected keyword argument 'model_name'"
        ));
    }

    #[tokio::test]
    async fn invocation_failure_includes_error_and_trace() {
        let experts = ExpertRegistry::builtin();
        let factory = ScriptedFactory::new(ScriptedModel::failing(), CallLog::default());
        let orchestrator = orchestrator(&experts, None, Some("sk-env"), factory);

        let answer = orchestrator.answer("hi", "A").await;
        assert!(answer.starts_with("The chat request to model gpt-4o-mini failed. Details: "));
        assert!(answer.contains("call failed: call down"));
        assert!(answer.contains("invoke: invoke failed: invoke down"));
    }

    #[tokio::test]
    async fn every_pipeline_combination_returns_text() {
        let experts = ExpertRegistry::builtin();
        let shapes = [
            ChatResponse::text("direct"),
            ChatResponse::from_json(json!({"content": "mapped"})),
            ChatResponse::Generations(vec![vec![Generation {
                text: Some("generated".to_string()),
                message: None,
            }]]),
            ChatResponse::from_json(json!([1, 2, 3])),
        ];

        for env_key in [None, Some("sk-env")] {
            for constructible in [false, true] {
                for invocable in [false, true] {
                    for shape in &shapes {
                        let model = if invocable {
                            ScriptedModel::with_invoke(Ok(shape.clone()))
                        } else {
                            ScriptedModel::failing()
                        };
                        let factory = ScriptedFactory::new(model, CallLog::default())
                            .accepting(move |params| {
                                constructible && params.model_param == ModelParam::Model
                            });
                        let orchestrator = orchestrator(&experts, None, env_key, factory);

                        let answer = orchestrator.answer("hi", "A").await;
                        assert!(
                            !answer.trim().is_empty(),
                            "env={env_key:?} constructible={constructible} invocable={invocable}"
                        );
                    }
                }
            }
        }
    }
}
