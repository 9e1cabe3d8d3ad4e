//! Error types for shim invocations.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Coarse classification of a [`ShimError`], one per invocation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required path was empty.
    Configuration,
    /// A configured path does not exist.
    NotFound,
    /// The runtime process could not be launched.
    Start,
    /// Pipe setup or read failure.
    Io,
    /// The runtime completed without writing anything.
    EmptyOutput,
    /// The deadline expired and the runtime was killed.
    Timeout,
    Encoding,
    Decoding,
    /// The runtime reported a failure inside an otherwise valid document.
    Remote,
}

#[derive(Debug, Error)]
pub enum ShimError {
    #[error("ruby compatibility shim was not configured")]
    ShimNotConfigured,

    #[error("ruby compatibility shim configuration file not configured")]
    ConfigNotConfigured,

    #[error("invalid ruby compatibility shim setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("ruby compatibility shim was not found in {}", .0.display())]
    ShimNotFound(PathBuf),

    #[error("ruby compatibility shim configuration file was not found in {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("cannot start the ruby compatibility shim: {0}")]
    Start(#[source] io::Error),

    #[error("cannot {context} for ruby compatibility shim: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("cannot read compatibility shim output: zero bytes received")]
    EmptyOutput,

    #[error("ruby compatibility shim did not complete within {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("cannot JSON encode ruby compatibility shim request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("cannot decode output from the ruby compatibility shim: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("cannot decode output from the ruby compatibility shim: {0}")]
    CallStackEncoding(#[source] std::string::FromUtf8Error),

    #[error("ruby compatibility shim encountered an error: {0}")]
    Remote(String),

    #[error("could not parse filter: {0}")]
    FilterParse(#[source] Box<ShimError>),
}

impl ShimError {
    pub(crate) fn io(context: &'static str, source: io::Error) -> Self {
        Self::Io { context, source }
    }

    /// Phase that produced this error. A filter parse failure reports the
    /// kind of its cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ShimNotConfigured | Self::ConfigNotConfigured | Self::InvalidSetting { .. } => {
                ErrorKind::Configuration
            }
            Self::ShimNotFound(_) | Self::ConfigNotFound(_) => ErrorKind::NotFound,
            Self::Start(_) => ErrorKind::Start,
            Self::Io { .. } => ErrorKind::Io,
            Self::EmptyOutput => ErrorKind::EmptyOutput,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Encode(_) => ErrorKind::Encoding,
            Self::Decode(_) | Self::CallStackEncoding(_) => ErrorKind::Decoding,
            Self::Remote(_) => ErrorKind::Remote,
            Self::FilterParse(cause) => cause.kind(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

pub type Result<T> = std::result::Result<T, ShimError>;
