use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Credential exchange failed ({status}): {body}")]
    Auth { status: String, body: String },

    #[error("Fetching metrics for app {app_key} failed: {source}")]
    Fetch {
        app_key: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Metrics API responded with {status} for app {app_key}: {body}")]
    FetchStatus {
        app_key: String,
        status: StatusCode,
        body: String,
    },

    #[error("Destination is not in the expected shape: {message}")]
    Schema { message: String },

    #[error("Sheets API responded with {status}: {body}")]
    Store { status: StatusCode, body: String },

    #[error("Drive API responded with {status}: {body}")]
    Drive { status: StatusCode, body: String },

    #[error("Notification was not delivered: {message}")]
    Notify { message: String },

    #[error("API responded with error: {0}")]
    ApiFailure(#[from] reqwest::Error),

    #[error("Failed to parse URL: {0}")]
    UrlParsingFailed(#[from] url::ParseError),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("'The date supplied {date} is invalid'")]
    InvalidDate { date: String },
}

impl Error {
    pub fn schema<T: Into<String>>(message: T) -> Self {
        Error::Schema {
            message: message.into(),
        }
    }

    /// True for failures of the credential exchange or the metrics fetch, the only
    /// errors a [`crate::report::FailurePolicy::SkipAndContinue`] run may absorb.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            Error::Auth { .. } | Error::Fetch { .. } | Error::FetchStatus { .. }
        )
    }
}
