use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AiConfig, Language};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionRequest {
    pub title: String,
    /// Category label already translated to `language`.
    pub category_label: String,
    pub language: Language,
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("text generation is not configured: {0}")]
    NotConfigured(String),
    #[error("text generation request failed")]
    Http(#[from] reqwest::Error),
    #[error("text generation returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("text generation returned no text")]
    EmptyResponse,
    #[error("text generation worker stopped before replying")]
    WorkerLost,
}

/// Black-box text generator. One attempt per call, no retries.
pub trait DescriptionGenerator: Send + Sync {
    fn generate(&self, request: &DescriptionRequest) -> Result<String, AiError>;
}

pub fn build_prompt(request: &DescriptionRequest) -> String {
    format!(
        "Напиши привлекательное и профессиональное описание для объявления на сайте.\n\
         Заголовок: {}\n\
         Категория: {}\n\
         Описание должно быть на {} языке, содержать преимущества и призыв к действию.",
        request.title,
        request.category_label,
        request.language.prompt_name()
    )
}

/// Text to put in the description field for a finished request.
pub fn resolve_description(result: Result<String, AiError>, language: Language) -> String {
    let strings = language.strings();
    match result {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) | Err(AiError::EmptyResponse) => strings.ai_empty.to_string(),
        Err(err) => {
            tracing::warn!(error = %err, "description generation failed");
            strings.ai_failed.to_string()
        }
    }
}

pub struct GeminiClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key_env: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl GeminiClient {
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("building text generation HTTP client")?;
        let api_key = config.api_key();
        if api_key.is_none() {
            tracing::debug!(env = %config.api_key_env, "no API key for text generation");
        }
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key_env: config.api_key_env.clone(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

impl DescriptionGenerator for GeminiClient {
    fn generate(&self, request: &DescriptionRequest) -> Result<String, AiError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AiError::NotConfigured(format!(
                "{} is not set",
                self.api_key_env
            )));
        };
        let prompt = build_prompt(request);
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: &prompt }],
            }],
        };
        tracing::debug!(model = %self.model, title = %request.title, "requesting description");
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: GenerateResponse = response.json()?;
        parsed.into_text().ok_or(AiError::EmptyResponse)
    }
}

/// Identifies the form state a request was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiTicket {
    pub generation: u64,
}

#[derive(Debug)]
pub struct AiCompletion {
    pub ticket: AiTicket,
    pub language: Language,
    pub result: Result<String, AiError>,
}

/// Runs generation off the event thread and hands results back over a channel.
pub struct AiDispatcher {
    generator: Arc<dyn DescriptionGenerator>,
    tx: Sender<AiCompletion>,
    rx: Receiver<AiCompletion>,
}

impl AiDispatcher {
    pub fn new(generator: Arc<dyn DescriptionGenerator>) -> Self {
        let (tx, rx) = unbounded();
        Self { generator, tx, rx }
    }

    pub fn spawn(&self, ticket: AiTicket, request: DescriptionRequest) {
        let generator = Arc::clone(&self.generator);
        let tx = self.tx.clone();
        let language = request.language;
        let spawned = thread::Builder::new()
            .name("ai-describe".into())
            .spawn(move || {
                let result = generator.generate(&request);
                // Receiver gone means shutdown.
                let _ = tx.send(AiCompletion {
                    ticket,
                    language,
                    result,
                });
            });
        if let Err(err) = spawned {
            tracing::error!(?err, "failed to spawn description worker");
            let _ = self.tx.send(AiCompletion {
                ticket,
                language,
                result: Err(AiError::WorkerLost),
            });
        }
    }

    pub fn try_recv(&self) -> Option<AiCompletion> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<AiCompletion> {
        self.rx.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Generator with a canned answer, for tests.
    pub struct StubGenerator {
        pub reply: Option<String>,
    }

    impl DescriptionGenerator for StubGenerator {
        fn generate(&self, _request: &DescriptionRequest) -> Result<String, AiError> {
            match &self.reply {
                Some(text) => Ok(text.clone()),
                None => Err(AiError::NotConfigured("stub".into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubGenerator;
    use super::*;
    use assert_matches::assert_matches;

    fn request() -> DescriptionRequest {
        DescriptionRequest {
            title: "Toyota Camry 2022".into(),
            category_label: "Авто".into(),
            language: Language::Ru,
        }
    }

    #[test]
    fn prompt_carries_title_category_and_language() {
        let mut req = request();
        req.language = Language::Tg;
        let prompt = build_prompt(&req);
        assert!(prompt.contains("Заголовок: Toyota Camry 2022"));
        assert!(prompt.contains("Категория: Авто"));
        assert!(prompt.contains("тоҷикӣ"));
    }

    #[test]
    fn failures_resolve_to_localized_fallbacks() {
        assert_eq!(
            resolve_description(Err(AiError::NotConfigured("x".into())), Language::Ru),
            "Произошла ошибка при генерации описания."
        );
        assert_eq!(
            resolve_description(Err(AiError::EmptyResponse), Language::Tg),
            Language::Tg.strings().ai_empty
        );
        assert_eq!(
            resolve_description(Ok("  ".into()), Language::Ru),
            "Не удалось сгенерировать описание."
        );
        assert_eq!(
            resolve_description(Ok(" Great car \n".into()), Language::Ru),
            "Great car"
        );
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() -> Result<()> {
        let config = AiConfig {
            api_key_env: "BOZOR_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..AiConfig::default()
        };
        let client = GeminiClient::from_config(&config)?;
        assert_matches!(client.generate(&request()), Err(AiError::NotConfigured(_)));
        Ok(())
    }

    #[test]
    fn response_text_is_extracted_from_first_candidate() -> Result<()> {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}]}}]}"#,
        )?;
        assert_eq!(parsed.into_text().as_deref(), Some("Hello world"));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#)?;
        assert_eq!(empty.into_text(), None);
        Ok(())
    }

    #[test]
    fn dispatcher_delivers_results_with_ticket() {
        let dispatcher = AiDispatcher::new(Arc::new(StubGenerator {
            reply: Some("Generated".into()),
        }));
        let ticket = AiTicket { generation: 7 };
        dispatcher.spawn(ticket, request());
        let completion = dispatcher
            .recv_timeout(Duration::from_secs(5))
            .expect("completion");
        assert_eq!(completion.ticket, ticket);
        assert_eq!(completion.language, Language::Ru);
        assert_eq!(completion.result.ok().as_deref(), Some("Generated"));
    }
}
