use curlring_future::FutureError;

use crate::response::TransferStats;

/// A failed transfer, as reported by libcurl.
///
/// Displays as `cURL error <code>: <description>`. Transport errors never
/// surface as `Err` from [`TransferExecutor::execute`]; they ride in
/// [`Response::error`] or reject the transfer's promise.
///
/// [`TransferExecutor::execute`]: crate::TransferExecutor::execute
/// [`Response::error`]: crate::Response::error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cURL error {code}: {description}")]
pub struct TransportError {
    code: u32,
    description: String,
    stats: Option<Box<TransferStats>>,
}

impl TransportError {
    pub fn new(code: u32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            stats: None,
        }
    }

    /// Attach what libcurl measured before the transfer failed.
    pub fn with_stats(mut self, stats: TransferStats) -> Self {
        self.stats = Some(Box::new(stats));
        self
    }

    /// The libcurl `CURLcode`.
    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn transfer_stats(&self) -> Option<&TransferStats> {
        self.stats.as_deref()
    }
}

impl From<&curl::Error> for TransportError {
    fn from(e: &curl::Error) -> Self {
        let description = e.extra_description().unwrap_or(e.description());
        TransportError::new(e.code() as u32, description)
    }
}

/// Errors produced while issuing a transfer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request has no `host` header.
    #[error("request is missing a host header")]
    MissingHost,

    /// A client option is out of range.
    #[error("invalid client option: {0}")]
    InvalidOption(String),

    /// Configuring the easy handle failed.
    #[error("curl error: {0}")]
    Curl(#[from] curl::Error),

    /// The multi handle rejected an operation.
    #[error("curl multi error: {0}")]
    Multi(#[from] curl::MultiError),

    /// Progress callbacks issued transfers deeper than the configured limit.
    #[error("transfer nesting depth {0} exceeds the configured limit")]
    NestingTooDeep(usize),

    /// A transfer was forced from a callback of its own nesting level.
    #[error("cannot drive transfer {0} from inside its own event loop level")]
    ReentrantDrive(usize),

    /// Forcing the transfer's future failed.
    #[error(transparent)]
    Future(#[from] FutureError),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}
