pub type BlarpResult<T> = Result<T, BlarpError>;

#[derive(thiserror::Error, Debug)]
pub enum BlarpError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("gpu error: {0}")]
    Gpu(String),

    #[error("media error: {0}")]
    Media(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BlarpError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn gpu(msg: impl Into<String>) -> Self {
        Self::Gpu(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }
}

impl From<std::io::Error> for BlarpError {
    fn from(e: std::io::Error) -> Self {
        Self::Other(anyhow::Error::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            BlarpError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            BlarpError::unsupported("x")
                .to_string()
                .contains("unsupported:")
        );
        assert!(BlarpError::gpu("x").to_string().contains("gpu error:"));
        assert!(BlarpError::media("x").to_string().contains("media error:"));
        assert!(
            BlarpError::pipeline("x")
                .to_string()
                .contains("pipeline error:")
        );
    }

    #[test]
    fn io_errors_keep_their_message() {
        let err: BlarpError = std::io::Error::other("boom").into();
        assert!(matches!(err, BlarpError::Other(_)));
        assert!(err.to_string().contains("boom"));
    }
}
