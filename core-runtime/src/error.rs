use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A setting is out of range or a required collaborator for an enabled
    /// feature is absent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    /// Bad filter directive, or a global subscriber is already installed.
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl Error {
    pub(crate) fn missing(capability: &str, message: impl Into<String>) -> Self {
        Error::CapabilityMissing {
            capability: capability.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
