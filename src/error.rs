pub type ArtisticResult<T> = Result<T, ArtisticError>;

/// Errors raised while rendering or compositing a QR code.
///
/// Codec failures are surfaced unchanged through the transparent variants.
#[derive(thiserror::Error, Debug)]
pub enum ArtisticError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    DataTooLong(#[from] crate::qrcode::DataTooLong),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Png(#[from] png::EncodingError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ArtisticError {
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(ArtisticError::invalid_parameter("scale")
            .to_string()
            .contains("invalid parameter:"));
        assert!(ArtisticError::unsupported_format("svg")
            .to_string()
            .contains("unsupported format:"));
    }

    #[test]
    fn io_preserves_source() {
        let err = ArtisticError::from(std::io::Error::other("boom"));
        assert!(err.to_string().contains("boom"));
    }
}
