//! Error types for image construction, arithmetic, and model application.
//!
//! Invalid configurations (a degradation scale below 1.0, mismatched channel
//! dimensions) are reported as `Result` values at construction time instead
//! of aborting. Non-convergence of the solver is *not* an error; it is a
//! normal terminal state reported through [`crate::solver::SolveStatus`].

use thiserror::Error;

/// Errors produced by the super-resolution core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SuperResError {
    /// Two images (or an image and a channel) disagree on spatial size.
    #[error("dimension mismatch: expected {expected_rows}x{expected_cols}, got {got_rows}x{got_cols}")]
    DimensionMismatch {
        expected_rows: usize,
        expected_cols: usize,
        got_rows: usize,
        got_cols: usize,
    },

    /// Two images disagree on channel count.
    #[error("channel count mismatch: expected {expected}, got {got}")]
    ChannelCountMismatch { expected: usize, got: usize },

    /// A degradation stage was configured with a scale below 1.0.
    #[error("invalid degradation scale {scale}: must be >= 1.0")]
    InvalidScale { scale: f64 },

    /// A resize was requested to a degenerate target.
    #[error("invalid resize target {rows}x{cols}")]
    InvalidResizeTarget { rows: usize, cols: usize },

    /// Scalar division by zero.
    #[error("division of image by zero scalar")]
    ZeroScalar,

    /// An operation that needs pixel data was applied to an empty image.
    #[error("operation requires a non-empty image")]
    EmptyImage,

    /// Channel index beyond the number of channels in the image.
    #[error("channel index {index} out of range for {num_channels} channels")]
    ChannelIndexOutOfRange { index: usize, num_channels: usize },

    /// Flat pixel buffer length inconsistent with the declared geometry.
    #[error("pixel buffer length {got} does not match {expected} ({num_channels} channels of {rows}x{cols})")]
    PixelBufferMismatch {
        expected: usize,
        got: usize,
        rows: usize,
        cols: usize,
        num_channels: usize,
    },
}

impl SuperResError {
    /// Convenience constructor for the common size-mismatch case.
    pub fn dimension_mismatch(expected: (usize, usize), got: (usize, usize)) -> Self {
        Self::DimensionMismatch {
            expected_rows: expected.0,
            expected_cols: expected.1,
            got_rows: got.0,
            got_cols: got.1,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SuperResError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SuperResError::dimension_mismatch((4, 4), (2, 3));
        assert_eq!(
            err.to_string(),
            "dimension mismatch: expected 4x4, got 2x3"
        );

        let err = SuperResError::InvalidScale { scale: 0.5 };
        assert!(err.to_string().contains("0.5"));
    }
}
