use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FerryError {
    #[error("Source file not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Stream truncated: peer closed the connection mid-frame")]
    StreamTruncated,

    #[error("Frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Ciphertext chunk of {len} bytes exceeds the {max} byte limit")]
    ChunkTooLarge { len: usize, max: usize },

    #[error("Chunk authentication failed: data was corrupted or tampered with")]
    ChunkAuthenticationFailed,

    #[error("Invalid manifest: {0}")]
    ManifestInvalid(String),

    #[error("Session key unwrap failed: wrong private key or tampered ciphertext")]
    SessionKeyUnwrapFailed,

    #[error("Authentication rejected: peer responded with '{status}'")]
    AuthRejected { status: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Connection locked: a transfer is already in progress")]
    ConnectionLocked,

    #[error("Keypair inconsistent: {} exists but {} is missing", present.display(), missing.display())]
    KeypairInconsistent { present: PathBuf, missing: PathBuf },

    #[error("Key store error: {0}")]
    KeyStore(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl FerryError {
    /// Returns a user-friendly suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            FerryError::SourceNotFound { .. } => {
                Some("Check the path exists and spelling is correct.")
            }
            FerryError::AuthRejected { .. } => {
                Some("Check the passcode matches the one configured on the listening node.")
            }
            FerryError::ConnectionLocked => {
                Some("Wait for the current transfer to finish, then try again.")
            }
            FerryError::KeypairInconsistent { .. } => {
                Some("Remove the remaining .pem file so a fresh keypair can be generated.")
            }
            FerryError::ChunkAuthenticationFailed => {
                Some("The transfer cannot be retried safely; ask the sender to send again.")
            }
            FerryError::Config(_) => Some("Run with --help to see the accepted options."),
            _ => None,
        }
    }

    /// Whether the orchestrator may retry the operation that produced this
    /// error. Only dial/listen failures qualify; everything else is either
    /// fatal for the transfer or requires operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FerryError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_rejected_carries_status() {
        let err = FerryError::AuthRejected {
            status: "FAIL".into(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("FAIL"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(FerryError::Transport("dial failed".into()).is_retryable());
        assert!(!FerryError::ChunkAuthenticationFailed.is_retryable());
        assert!(!FerryError::ConnectionLocked.is_retryable());
        assert!(!FerryError::AuthRejected {
            status: "FAIL".into()
        }
        .is_retryable());
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: FerryError = io.into();
        assert!(matches!(err, FerryError::Io { .. }));
    }
}
