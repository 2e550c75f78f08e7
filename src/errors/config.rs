//! Configuration errors.

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Invalid private key format: {message}")]
    InvalidPrivateKey { message: String },

    #[error("Missing required environment variable {name}")]
    MissingVariable { name: &'static str },
}
