use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Fixed user-facing text for a 2xx response whose body lacks generated text.
pub const INVALID_RESPONSE_MSG: &str =
    "Error: Could not get a valid response from the model.";
/// Fixed user-facing text shown once the retry budget is exhausted.
pub const CONNECTION_FAILED_MSG: &str =
    "Sorry, I am having trouble connecting right now. Please try again later.";

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Serialize)]
struct RequestContent {
    role: String,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

impl GenerateRequest {
    fn single_turn(prompt: &str) -> Self {
        Self {
            contents: vec![RequestContent {
                role: "user".to_string(),
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Pulls `candidates[0].content.parts[0].text` out of the body, if present.
    fn reply_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.trim().is_empty())
    }
}

/// Per-attempt failure. Both variants are transient and drive the retry loop.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(StatusCode),
}

/// Final result of one logical dispatch (a single prompt, retries included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The model produced text.
    Reply(String),
    /// 2xx response whose body was not JSON or lacked the generated text.
    /// Soft error: returned immediately, never retried.
    InvalidResponse,
    /// Every attempt failed at the transport level or with a non-2xx status.
    ConnectionFailed,
}

impl DispatchOutcome {
    /// Displayable text for this outcome. Never empty.
    pub fn message(&self) -> &str {
        match self {
            DispatchOutcome::Reply(text) => text.as_str(),
            DispatchOutcome::InvalidResponse => INVALID_RESPONSE_MSG,
            DispatchOutcome::ConnectionFailed => CONNECTION_FAILED_MSG,
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    retry_delay: Duration,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Per-attempt request timeout. Defaults to 30 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// First backoff delay; doubles after each failed attempt. Defaults to 1s.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one prompt and resolves it to a displayable outcome.
    ///
    /// Transient failures (connect error, timeout, non-2xx) are retried up to
    /// 3 attempts with exponential backoff (1s, then 2s). A 2xx body without
    /// generated text is a soft error and short-circuits without retrying.
    /// This never returns an `Err`; every failure maps to an outcome variant.
    pub async fn dispatch(&self, prompt: &str) -> DispatchOutcome {
        let payload = GenerateRequest::single_turn(prompt);
        let mut delay = self.retry_delay;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_generate(&payload).await {
                Ok(Some(text)) => {
                    debug!(attempt, chars = text.len(), "received model reply");
                    return DispatchOutcome::Reply(text);
                }
                Ok(None) => {
                    warn!(attempt, "response body missing generated text");
                    return DispatchOutcome::InvalidResponse;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "generateContent attempt failed");
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        error!("giving up after {MAX_ATTEMPTS} failed attempts");
        DispatchOutcome::ConnectionFailed
    }

    /// One HTTP attempt. `Ok(None)` means the body parsed but held no text.
    async fn try_generate(
        &self,
        payload: &GenerateRequest,
    ) -> Result<Option<String>, AttemptError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }

        // A 2xx with an unparseable body is malformed, not transient.
        let body: GenerateResponse = match response.json().await {
            Ok(body) => body,
            Err(_) => return Ok(None),
        };

        Ok(body.reply_text())
    }
}
