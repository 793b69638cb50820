#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Unknown media type: {0}")]
    UnknownMediaType(String),

    #[error("Provider {provider} does not generate {media_type}")]
    UnsupportedMedia {
        provider: &'static str,
        media_type: &'static str,
    },
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CoreError::Validation(errors.to_string())
    }
}
