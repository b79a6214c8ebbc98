//! Transient buffer allocation contract.

use crate::error::BloomError;
use crate::image::{Image, ImageDesc};

/// Pool of transient image buffers borrowed for the duration of one
/// `process` call.
///
/// Implementations must never hand out a buffer that is still outstanding.
/// Releasing a buffer the pool did not issue (or releasing it twice) is a
/// caller bug: implementations `debug_assert!` on it, and in release builds
/// record it for [`take_release_fault`](Self::take_release_fault), which
/// fails the current frame.
pub trait BufferAllocator {
    /// Handle type produced by this allocator.
    type Buffer: Image;

    /// Borrow a buffer with the given shape.
    ///
    /// # Errors
    ///
    /// Returns [`BloomError::AllocationFailure`] when backing storage is
    /// exhausted.
    fn acquire(&mut self, desc: ImageDesc) -> Result<Self::Buffer, BloomError>;

    /// Return a buffer previously obtained from [`acquire`](Self::acquire).
    fn release(&mut self, buffer: Self::Buffer);

    /// Take the unmatched-release fault recorded since the last call, if any.
    fn take_release_fault(&mut self) -> Option<BloomError> {
        None
    }
}
