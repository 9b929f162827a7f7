use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::{Completion, TEMPERATURE};
use crate::config::Config;
use crate::error::CompletionError;
use crate::state::{ChatMessage, ChatRole};

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f64,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    role: Option<String>,
    content: Option<String>,
}

/// Client for an Azure OpenAI chat-completions deployment.
///
/// The credential is fixed at construction. A client without one never
/// touches the network.
#[derive(Clone)]
pub struct AzureClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl AzureClient {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            api_key,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.completions_url(), config.resolve_api_key())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Synchronous pre-dispatch check for the credential.
    pub fn ensure_credential(&self) -> Result<&str, CompletionError> {
        self.api_key
            .as_deref()
            .ok_or(CompletionError::MissingCredential)
    }

    /// Send the full history and decode the first choice.
    ///
    /// `history` must start with the system directive; the service gets the
    /// whole conversation on every call.
    pub async fn complete(&self, history: &[ChatMessage]) -> Result<Completion, CompletionError> {
        let api_key = self.ensure_credential()?;

        match history.first() {
            None => return Err(CompletionError::InvalidHistory("history is empty")),
            Some(first) if first.role != ChatRole::System => {
                return Err(CompletionError::InvalidHistory(
                    "history must start with the system directive",
                ))
            }
            Some(_) => {}
        }

        let request = CompletionRequest {
            messages: history,
            temperature: TEMPERATURE,
        };

        debug!(messages = history.len(), url = %self.url, "sending completion request");

        let response = self
            .client
            .post(&self.url)
            .header("api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "completion service rejected request");
            return Err(CompletionError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        let envelope: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(CompletionError::Envelope)?;

        let completion = decode_completion(envelope);
        if let Completion::Malformed { reason } = &completion {
            warn!(%reason, "completion response had unexpected shape");
        } else {
            debug!(bytes = bytes.len(), "completion received");
        }
        Ok(completion)
    }
}

fn decode_completion(envelope: serde_json::Value) -> Completion {
    let malformed = |reason: &str| Completion::Malformed {
        reason: reason.to_string(),
    };

    let response: CompletionResponse = match serde_json::from_value(envelope) {
        Ok(response) => response,
        Err(e) => {
            return Completion::Malformed {
                reason: e.to_string(),
            }
        }
    };

    let Some(choice) = response.choices.into_iter().next() else {
        return malformed("no choices in response");
    };
    let Some(message) = choice.message else {
        return malformed("first choice has no message");
    };
    if message.role.as_deref() != Some(ChatRole::Assistant.as_str()) {
        return malformed("first choice is not an assistant message");
    }
    match message.content {
        Some(content) => Completion::Reply(ChatMessage::assistant(content)),
        None => malformed("assistant message has no content"),
    }
}
