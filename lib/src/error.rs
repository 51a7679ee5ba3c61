pub type DitherResult<T> = Result<T, DitherError>;

#[derive(thiserror::Error, Debug)]
pub enum DitherError {
    #[error("unknown dither pattern: {0}")]
    UnknownPattern(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("frame source error: {0}")]
    Source(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl DitherError {
    pub fn unknown_pattern(name: impl Into<String>) -> Self {
        Self::UnknownPattern(name.into())
    }

    pub fn invalid_settings(msg: impl Into<String>) -> Self {
        Self::InvalidSettings(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            DitherError::unknown_pattern("x")
                .to_string()
                .contains("unknown dither pattern:")
        );
        assert!(
            DitherError::invalid_settings("x")
                .to_string()
                .contains("invalid settings:")
        );
        assert!(DitherError::backend("x").to_string().contains("backend error:"));
        assert!(
            DitherError::source("x")
                .to_string()
                .contains("frame source error:")
        );
    }

    #[test]
    fn image_error_is_transparent() {
        let io = std::io::Error::other("boom");
        let err = DitherError::from(image::ImageError::IoError(io));
        assert!(err.to_string().contains("boom"));
    }
}
