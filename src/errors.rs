use thiserror::Error;

/// Errors raised while collecting credentials, connecting or transferring
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("invalid server address: {0}")]
    InvalidServer(String),

    #[error("input closed while reading {0}")]
    InputClosed(&'static str),

    #[error("connection to {0} timed out")]
    Timeout(String),

    #[error("authentication rejected for user {0}")]
    AuthRejected(String),

    #[error("host key mismatch: expected {expected}, server offered {actual}")]
    HostKeyMismatch { expected: String, actual: String },

    #[error("not connected")]
    NotConnected,

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("no previous directory")]
    NoPreviousDirectory,

    #[error("ssh error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("sftp error: {0}")]
    Sftp(#[from] russh_sftp::client::error::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransferError>;
