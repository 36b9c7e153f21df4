//! Error types for the call bridge.
//!
//! Every failure the bridge surfaces is a [`BridgeError`]. Callers that need to
//! branch on the broad category use [`BridgeError::kind`].

use thiserror::Error;

/// Broad failure categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Name unresolved locally and through the forwarding chain.
    NotFound,
    /// Empty name, missing handle, or malformed envelope.
    InvalidArgument,
    /// The far side failed while dispatching the call.
    RemoteInvocation,
    /// The underlying call channel is broken.
    Transport,
}

/// Main error type for the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("No {namespace} registered for {name}")]
    NotFound { namespace: String, name: String },

    #[error("Invalid argument {field}: {message}")]
    InvalidArgument { field: String, message: String },

    #[error("Remote invocation failed: {message}")]
    RemoteInvocation {
        message: String,
        #[source]
        source: Option<Box<BridgeError>>,
    },

    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Codec error: {message}")]
    Codec { message: String },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl BridgeError {
    pub fn not_found(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        BridgeError::NotFound {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        BridgeError::Transport {
            message: message.into(),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        BridgeError::Codec {
            message: message.into(),
        }
    }

    /// Wrap a failure raised while dispatching an interface call.
    pub fn invocation(message: impl Into<String>, cause: BridgeError) -> Self {
        BridgeError::RemoteInvocation {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Kind of the innermost cause.
    pub fn root_kind(&self) -> ErrorKind {
        match self {
            BridgeError::RemoteInvocation {
                source: Some(cause),
                ..
            } => cause.root_kind(),
            other => other.kind(),
        }
    }

    /// Map to the category reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::NotFound { .. } => ErrorKind::NotFound,
            BridgeError::InvalidArgument { .. } | BridgeError::Json { .. } => {
                ErrorKind::InvalidArgument
            }
            BridgeError::RemoteInvocation { .. } | BridgeError::Codec { .. } => {
                ErrorKind::RemoteInvocation
            }
            BridgeError::Transport { .. } => ErrorKind::Transport,
        }
    }

    /// Render the error together with its whole cause chain.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut current: Option<&(dyn std::error::Error + 'static)> =
            std::error::Error::source(self);
        while let Some(cause) = current {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            current = cause.source();
        }
        out
    }
}
