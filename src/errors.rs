use thiserror::Error;

/// Error type for configuration and usage failures.
#[derive(Error, Debug)]
pub enum SolanumError {
    #[error("Missing required parameter '{0}'")]
    MissingParameter(String),
    #[error("Invalid value for parameter '{key}': {reason}")]
    InvalidParameter { key: String, reason: String },
    #[error("Weather record is missing required field '{0}'")]
    MissingWeatherField(String),
    #[error("Unrecognised date '{0}', expected YYYY-MM-DD or DD/MM/YYYY")]
    InvalidDate(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No results found. Run the simulation first")]
    NotSimulated,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for SolanumError {
    fn from(err: toml::de::Error) -> Self {
        SolanumError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SolanumError {
    fn from(err: toml::ser::Error) -> Self {
        SolanumError::Config(err.to_string())
    }
}

/// Convenience type for `Result<T, SolanumError>`.
pub type SolanumResult<T> = Result<T, SolanumError>;
