//! Bloom orchestration: prefilter, pyramid build/collapse, composite.

use crate::allocator::BufferAllocator;
use crate::error::BloomError;
use crate::image::{Image, ImageDesc};
use crate::kernel::{PassInputs, PassKernel, PassKind, PassParams};
use crate::options::{BloomOptions, BloomSettings};
use crate::pyramid::{self, Pyramid};

/// What one successful [`BloomProcessor::process`] call did.
#[derive(Debug, Clone, PartialEq)]
pub struct BloomReport {
    /// Settings actually used, after clamping.
    pub settings: BloomSettings,
    /// Achieved pyramid depth (1 means level 0 only).
    pub depth: usize,
    /// Shape of every pyramid level, level 0 first.
    pub levels: Vec<ImageDesc>,
}

impl BloomReport {
    /// Number of kernel passes issued: one prefilter, one downsample and one
    /// upsample per extra level, one composite.
    #[must_use]
    pub fn pass_count(&self) -> usize {
        2 * self.depth
    }
}

/// Runs the bloom effect over a source image into a destination image.
///
/// Owns its allocator and kernel. `process` takes `&mut self`, so two
/// invocations can never overlap on the same kernel or pool.
pub struct BloomProcessor<A, K> {
    allocator: A,
    kernel: K,
}

impl<A, K> BloomProcessor<A, K>
where
    A: BufferAllocator,
    K: PassKernel<Image = A::Buffer>,
{
    /// Create a processor from an allocator and a kernel.
    #[must_use]
    pub const fn new(allocator: A, kernel: K) -> Self {
        Self { allocator, kernel }
    }

    /// The buffer allocator.
    #[must_use]
    pub const fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Mutable access to the buffer allocator (e.g. per-frame pool upkeep).
    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }

    /// The filtering kernel.
    #[must_use]
    pub const fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Mutable access to the filtering kernel (e.g. to set its program).
    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    /// Split the processor back into its allocator and kernel.
    #[must_use]
    pub fn into_parts(self) -> (A, K) {
        (self.allocator, self.kernel)
    }

    /// Release the kernel's program objects.
    pub fn teardown(&mut self) {
        self.kernel.teardown();
    }

    /// Apply bloom to `source`, writing the result into `destination`.
    ///
    /// Every transient buffer acquired during the call is released before it
    /// returns, on success and on failure alike.
    ///
    /// # Errors
    ///
    /// - [`BloomError::InvalidConfig`] / [`BloomError::KernelUnavailable`]
    ///   before any buffer is acquired, including when `destination`
    ///   aliases `source`.
    /// - [`BloomError::AllocationFailure`] when the pool runs dry.
    /// - [`BloomError::InvariantViolation`] when the allocator reports a
    ///   release it could not match during this call.
    /// - Any error reported by the kernel while applying a pass.
    pub fn process(
        &mut self,
        source: &K::Image,
        destination: &K::Image,
        options: &BloomOptions,
    ) -> Result<BloomReport, BloomError> {
        let settings = options.validated()?;
        if !self.kernel.is_configured() {
            return Err(BloomError::InvalidConfig(
                "kernel program is not set".to_owned(),
            ));
        }
        if source.aliases(destination) {
            return Err(BloomError::InvalidConfig(
                "destination aliases source".to_owned(),
            ));
        }
        self.kernel.prepare()?;

        let result = match (
            self.run(source, destination, settings),
            self.allocator.take_release_fault(),
        ) {
            (Ok(_), Some(fault)) => Err(fault),
            (result, _) => result,
        };
        if result.is_ok() {
            self.kernel.flush();
        } else {
            self.kernel.discard();
        }
        result
    }

    /// Like [`process`](Self::process), but logs a failure and returns
    /// `None` so the host can show the unprocessed source for this frame.
    pub fn process_or_skip(
        &mut self,
        source: &K::Image,
        destination: &K::Image,
        options: &BloomOptions,
    ) -> Option<BloomReport> {
        match self.process(source, destination, options) {
            Ok(report) => Some(report),
            Err(e) => {
                log::warn!("bloom skipped for this frame: {e}");
                None
            }
        }
    }

    fn run(
        &mut self,
        source: &K::Image,
        destination: &K::Image,
        settings: BloomSettings,
    ) -> Result<BloomReport, BloomError> {
        let kernel = &mut self.kernel;
        let mut levels = Pyramid::new(&mut self.allocator, settings.iterations);

        let base = levels.push(source.desc())?;
        kernel.apply(
            PassKind::Prefilter,
            PassInputs::single(source),
            PassParams {
                threshold: Some(settings.threshold),
            },
            levels.level(base)?,
        )?;

        let depth = pyramid::build(&mut levels, kernel, settings.iterations)?;
        let shapes = levels.descs();
        pyramid::collapse(&mut levels, kernel, depth)?;

        kernel.apply(
            PassKind::Composite,
            PassInputs::pair(levels.level(base)?, source),
            PassParams::default(),
            destination,
        )?;
        levels.release_level(base)?;

        Ok(BloomReport {
            settings,
            depth,
            levels: shapes,
        })
    }
}
