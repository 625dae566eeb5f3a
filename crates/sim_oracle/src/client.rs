//! Oracle client abstraction and its HTTP and mock implementations.
//!
//! `HttpOracle` speaks the OpenAI-compatible chat-completions wire shape, so
//! any conforming endpoint (hosted or local) can serve as the oracle.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use crate::OracleError;

/// The external decision oracle, reduced to one call: send a structured
/// prompt pair, get raw response text back. Parsing happens in `protocol`.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Stable identifier (model name) for logs and metadata.
    fn id(&self) -> &str;

    async fn adjudicate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, OracleError>;
}

/* ---------------------------- HTTP implementation ---------------------------- */

pub struct HttpOracle {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl HttpOracle {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, OracleError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            temperature: 0.7,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl DecisionOracle for HttpOracle {
    fn id(&self) -> &str {
        &self.model
    }

    async fn adjudicate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
        };

        let mut request = self.client.post(self.chat_completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::RequestFailed {
                status: status.as_u16(),
            });
        }
        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| OracleError::Parse("response had no choices".to_string()))
    }
}

/* ---------------------------- mock implementation ---------------------------- */

/// Scripted oracle for tests: serves queued responses in order, optionally
/// failing the first `fail_first` calls.
pub struct MockOracle {
    responses: Mutex<Vec<String>>,
    fail_first: u32,
    call_count: AtomicU32,
}

impl MockOracle {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            fail_first: 0,
            call_count: AtomicU32::new(0),
        }
    }

    /// Fail the first `n` adjudications with a network error.
    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = n;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionOracle for MockOracle {
    fn id(&self) -> &str {
        "mock-oracle"
    }

    async fn adjudicate(&self, _system: &str, _user: &str) -> Result<String, OracleError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(OracleError::Network("simulated outage".to_string()));
        }
        let mut queue = self.responses.lock().expect("mock queue poisoned");
        if queue.is_empty() {
            Err(OracleError::Parse("mock queue exhausted".to_string()))
        } else {
            Ok(queue.remove(0))
        }
    }
}
