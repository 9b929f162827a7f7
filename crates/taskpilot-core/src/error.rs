use std::path::PathBuf;

/// Failures that leave the conversation log un-appended.
///
/// A reply that arrives but has the wrong shape is not an error; see
/// [`crate::ai::Completion::Malformed`].
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("missing API key: set AZURE_OPENAI_KEY or api_key in the config file")]
    MissingCredential,
    #[error("invalid history: {0}")]
    InvalidHistory(&'static str),
    #[error("request to completion service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("completion service returned a non-JSON body: {0}")]
    Envelope(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("the system directive is fixed at the start of the conversation")]
    SystemMessage,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
