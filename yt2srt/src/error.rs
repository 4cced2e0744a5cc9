use thiserror::Error;

/// Process exit status reserved for transport failures.
pub const NETWORK_ERROR_EXIT_CODE: i32 = 6;

/// Errors produced while listing, downloading, parsing or writing captions
#[derive(Error, Debug)]
pub enum Yt2SrtError {
    /// The caption service could not be reached or answered with a non-2xx status
    #[error("Network error: Unable to retrieve {url}\n{source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The timed-text or track-list document is not usable
    #[error("Malformed caption document: {message}")]
    Format { message: String },

    #[error("Invalid video URL: {url}")]
    InvalidUrl { url: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("File system error: {source}")]
    FileSystem {
        #[from]
        source: std::io::Error,
    },
}

impl Yt2SrtError {
    pub(crate) fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Whether the error came from the transport layer
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Exit status a command-line driver should terminate with
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Network { .. } => NETWORK_ERROR_EXIT_CODE,
            _ => 1,
        }
    }
}

pub type Yt2SrtResult<T> = Result<T, Yt2SrtError>;
