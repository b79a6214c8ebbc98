//! Filtering kernel contract consumed by the bloom core.
//!
//! The kernel owns all pixel math. The core only decides which pass runs,
//! on which buffers, in which order.

use crate::error::BloomError;
use crate::image::Image;

/// Which filtering operation the kernel performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Threshold extraction from the source into pyramid level 0.
    Prefilter,
    /// Half-resolution reduction of one pyramid level into the next.
    Downsample,
    /// Expansion of a smaller level, combined into a larger stored level.
    Upsample,
    /// Final blend of the collapsed glow with the original source.
    Composite,
}

impl PassKind {
    /// All pass kinds in pipeline order.
    pub const ALL: [Self; 4] = [
        Self::Prefilter,
        Self::Downsample,
        Self::Upsample,
        Self::Composite,
    ];

    /// Number of input images this pass reads.
    #[must_use]
    pub const fn input_count(self) -> usize {
        match self {
            Self::Prefilter | Self::Downsample => 1,
            Self::Upsample | Self::Composite => 2,
        }
    }

    /// Human-readable label, used for GPU debug markers and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Prefilter => "Bloom Prefilter",
            Self::Downsample => "Bloom Downsample",
            Self::Upsample => "Bloom Upsample",
            Self::Composite => "Bloom Composite",
        }
    }
}

/// One or two input images for a pass.
#[derive(Debug)]
pub struct PassInputs<'a, I> {
    /// The image being filtered.
    pub primary: &'a I,
    /// Upsample: the stored level being combined into.
    /// Composite: the original, undownsampled source.
    pub secondary: Option<&'a I>,
}

impl<I> Clone for PassInputs<'_, I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I> Copy for PassInputs<'_, I> {}

impl<'a, I> PassInputs<'a, I> {
    /// Inputs for a single-input pass.
    #[must_use]
    pub const fn single(primary: &'a I) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    /// Inputs for a two-input pass.
    #[must_use]
    pub const fn pair(primary: &'a I, secondary: &'a I) -> Self {
        Self {
            primary,
            secondary: Some(secondary),
        }
    }

    /// Number of images present.
    #[must_use]
    pub const fn len(&self) -> usize {
        if self.secondary.is_some() {
            2
        } else {
            1
        }
    }

    /// Always false; a pass reads at least one image.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// Scalar parameters for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PassParams {
    /// Brightness cutoff. Only set for [`PassKind::Prefilter`].
    pub threshold: Option<f32>,
}

/// Executes named filtering passes.
///
/// A kernel is owned by exactly one processor and is mutated in place per
/// call (uniforms, bound textures), so every method takes `&mut self`.
pub trait PassKernel {
    /// Image handle type this kernel reads and writes.
    type Image: Image;

    /// Whether the program identifier has been supplied.
    fn is_configured(&self) -> bool;

    /// Build the filtering program if it has not been built yet.
    ///
    /// The outcome of the first attempt is cached: a kernel that failed once
    /// keeps reporting the same failure without retrying.
    ///
    /// # Errors
    ///
    /// [`BloomError::InvalidConfig`] when no program is configured,
    /// [`BloomError::KernelUnavailable`] when construction failed.
    fn prepare(&mut self) -> Result<(), BloomError>;

    /// Run one pass, writing the whole of `destination`.
    ///
    /// Implementations must not keep references to `inputs` past the call.
    ///
    /// # Errors
    ///
    /// Kernel-specific failures; the processor releases every transient
    /// buffer before propagating them.
    fn apply(
        &mut self,
        kind: PassKind,
        inputs: PassInputs<'_, Self::Image>,
        params: PassParams,
        destination: &Self::Image,
    ) -> Result<(), BloomError>;

    /// Submit work recorded since the last flush.
    fn flush(&mut self) {}

    /// Drop work recorded since the last flush.
    fn discard(&mut self) {}

    /// Release the program objects. The next [`prepare`](Self::prepare)
    /// rebuilds them.
    fn teardown(&mut self) {}
}

enum ProgramState<P> {
    Pending,
    Ready(P),
    Unavailable(String),
}

/// Build-once cache for a kernel's program objects.
///
/// The first [`get_or_build`](Self::get_or_build) runs the builder; its
/// outcome, success or failure, is kept for the lifetime of the cache.
/// [`reset`](Self::reset) drops a built program so the next call rebuilds
/// it, but never clears a recorded failure.
pub struct LazyProgram<P> {
    state: ProgramState<P>,
}

impl<P> Default for LazyProgram<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> LazyProgram<P> {
    /// An empty cache; nothing is built yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ProgramState::Pending,
        }
    }

    /// Return the program, building it on first use.
    ///
    /// # Errors
    ///
    /// [`BloomError::KernelUnavailable`] with the builder's reason, now and
    /// on every later call.
    pub fn get_or_build(
        &mut self,
        build: impl FnOnce() -> Result<P, String>,
    ) -> Result<&mut P, BloomError> {
        if matches!(self.state, ProgramState::Pending) {
            self.state = match build() {
                Ok(program) => ProgramState::Ready(program),
                Err(reason) => {
                    log::warn!("bloom kernel program unavailable: {reason}");
                    ProgramState::Unavailable(reason)
                }
            };
        }
        self.get_mut()
    }

    /// Return the program if it was built.
    ///
    /// # Errors
    ///
    /// [`BloomError::KernelUnavailable`] if building failed,
    /// [`BloomError::InvariantViolation`] if nothing was built yet.
    pub fn get_mut(&mut self) -> Result<&mut P, BloomError> {
        match &mut self.state {
            ProgramState::Ready(program) => Ok(program),
            ProgramState::Unavailable(reason) => {
                Err(BloomError::KernelUnavailable(reason.clone()))
            }
            ProgramState::Pending => Err(BloomError::InvariantViolation(
                "kernel used before prepare".to_owned(),
            )),
        }
    }

    /// Whether a program is built and usable.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.state, ProgramState::Ready(_))
    }

    /// Whether building failed.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self.state, ProgramState::Unavailable(_))
    }

    /// Drop a built program. A recorded failure is kept.
    pub fn reset(&mut self) {
        if self.is_ready() {
            self.state = ProgramState::Pending;
        }
    }
}
