use thiserror::Error;

/// Failure of a single provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote API answered with a body that could not be parsed. The
    /// registry answers this way once its quota is exhausted.
    #[error("rate limited by {provider}")]
    RateLimited { provider: &'static str },

    /// Browser automation hiccup (navigation, tab creation, page source).
    #[error("navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    /// Network level failure talking to a remote API.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Bad input or a response that will never parse no matter how often we ask.
    #[error("{0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn navigation(url: &str, reason: impl ToString) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether asking again could produce a different answer.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

/// Failure of the persistence gateway.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("company '{0}' already exists")]
    DuplicateCompany(String),

    #[error("company '{0}' does not exist")]
    UnknownCompany(String),

    #[error("database lock poisoned")]
    Poisoned,

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Missing or malformed configuration. Fatal, and only raised at start-up.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },

    #[error("invalid role pattern: {0}")]
    RolePattern(#[from] regex::Error),
}
