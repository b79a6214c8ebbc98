//! Crate-level error types.

use std::fmt;

use crate::image::ImageDesc;

/// Errors produced by the viso-bloom crate.
///
/// Every variant is local to one `process` call: the host skips the effect
/// for that frame and shows the unprocessed source instead.
#[derive(Debug)]
pub enum BloomError {
    /// Settings out of range or the kernel program identifier is unset.
    /// Raised before any buffer is acquired.
    InvalidConfig(String),
    /// The filtering program could not be constructed. Cached by the kernel
    /// after the first failed attempt.
    KernelUnavailable(String),
    /// The buffer pool could not satisfy an acquire.
    AllocationFailure {
        /// Shape that was requested.
        desc: ImageDesc,
        /// Pool budget in bytes.
        budget: u64,
        /// Bytes held by outstanding and pooled buffers at the time.
        in_use: u64,
    },
    /// A core invariant was broken (pyramid index misuse, unknown handle).
    InvariantViolation(String),
    /// Generic I/O failure while reading or writing settings.
    Io(std::io::Error),
    /// TOML settings parsing/serialization failure.
    SettingsParse(String),
}

impl BloomError {
    /// Whether the host should skip the effect for this frame and display the
    /// unprocessed source.
    ///
    /// Settings I/O errors never come out of `process`, so they are not
    /// frame skips.
    #[must_use]
    pub const fn is_frame_skip(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::KernelUnavailable(_)
                | Self::AllocationFailure { .. }
                | Self::InvariantViolation(_)
        )
    }
}

impl fmt::Display for BloomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid bloom config: {msg}"),
            Self::KernelUnavailable(msg) => {
                write!(f, "bloom kernel unavailable: {msg}")
            }
            Self::AllocationFailure {
                desc,
                budget,
                in_use,
            } => write!(
                f,
                "buffer pool exhausted acquiring {desc} \
                 ({in_use} of {budget} bytes in use)"
            ),
            Self::InvariantViolation(msg) => {
                write!(f, "bloom invariant violated: {msg}")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::SettingsParse(msg) => {
                write!(f, "settings parse error: {msg}")
            }
        }
    }
}

impl std::error::Error for BloomError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BloomError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_failure_message_names_the_request() {
        let err = BloomError::AllocationFailure {
            desc: ImageDesc::new(64, 32, wgpu::TextureFormat::Rgba16Float),
            budget: 1024,
            in_use: 1000,
        };
        let msg = err.to_string();
        assert!(msg.contains("64x32"));
        assert!(msg.contains("1000 of 1024"));
        assert!(err.is_frame_skip());
    }

    #[test]
    fn settings_errors_are_not_frame_skips() {
        let err = BloomError::SettingsParse("bad".to_owned());
        assert!(!err.is_frame_skip());
        let io = BloomError::from(std::io::Error::other("disk"));
        assert!(std::error::Error::source(&io).is_some());
    }
}
