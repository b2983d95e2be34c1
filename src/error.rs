#[derive(Debug, thiserror::Error)]
pub enum HeadersError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Phish target '{0}' has an empty domain")]
    EmptyPhishDomain(String),
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Unparsable address list: {0}")]
    Address(String),
    #[error("No host part in address: {0}")]
    MissingHost(String),
}
