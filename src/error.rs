use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProxyLibError>;

/// What is wrong with a rejected proxy URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlDefect {
    UnsupportedScheme,
    MissingHost,
    Malformed(String),
}

impl fmt::Display for UrlDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlDefect::UnsupportedScheme => {
                f.write_str("Only 'http' and 'https' schemes are supported.")
            }
            UrlDefect::MissingHost => f.write_str("It must include a valid hostname or netloc."),
            UrlDefect::Malformed(reason) => write!(f, "It could not be parsed: {reason}."),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProxyLibError {
    /// A required Juju variable is absent or malformed
    #[error("{0}")]
    JujuEnvironment(String),

    #[error("Invalid proxy URL: url='{url}'. {defect}")]
    ProxyUrl { url: String, defect: UrlDefect },

    /// An optional collaborator is not available in this build
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ProxyLibError {
    pub(crate) fn missing_var(name: &str) -> Self {
        ProxyLibError::JujuEnvironment(format!(
            "Juju environment variable '{name}' is not set"
        ))
    }

    pub(crate) fn invalid_url(url: &str, defect: UrlDefect) -> Self {
        ProxyLibError::ProxyUrl {
            url: url.to_string(),
            defect,
        }
    }
}
