use thiserror::Error;

/// Errors raised while decoding, translating or configuring block patches.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The wire buffer ended before a header-declared length was satisfied.
    #[error("Truncated input: needed {needed} bytes, {available} available")]
    TruncatedInput { needed: usize, available: usize },
    /// Bits-per-entry, word count or bitmask outside the supported eras.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Palette slot {0} not found")]
    NotFound(u32),
    #[error("Malformed VarInt")]
    MalformedVarInt,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PatchError {
    pub fn truncated(needed: usize, available: usize) -> Self {
        PatchError::TruncatedInput { needed, available }
    }

    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        PatchError::UnsupportedFormat(msg.into())
    }

    /// Returns `Ok(())` when `index < len`.
    pub fn range_check(index: usize, len: usize) -> Result<(), PatchError> {
        if index < len {
            Ok(())
        } else {
            Err(PatchError::IndexOutOfRange { index, len })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_range_check() {
        assert!(PatchError::range_check(0, 4096).is_ok());
        assert!(PatchError::range_check(4095, 4096).is_ok());
        assert_matches!(
            PatchError::range_check(4096, 4096),
            Err(PatchError::IndexOutOfRange { index: 4096, len: 4096 })
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            PatchError::truncated(2048, 12).to_string(),
            "Truncated input: needed 2048 bytes, 12 available"
        );
        assert_eq!(PatchError::NotFound(7).to_string(), "Palette slot 7 not found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: PatchError = io.into();
        assert_matches!(err, PatchError::IoError(_));
    }
}
