//! Downsample/upsample pyramid over transient buffers.
//!
//! Level 0 holds the prefiltered full-resolution image. Each next level is
//! the floor-halved size of the previous one, and the chain stops before a
//! level would drop below 2 pixels in either dimension.
//!
//! All buffers live in a [`Pyramid`], which returns whatever it still holds
//! to the allocator when dropped. Early returns through `?` therefore never
//! leak a buffer.

use crate::allocator::BufferAllocator;
use crate::error::BloomError;
use crate::image::{Image, ImageDesc};
use crate::kernel::{PassInputs, PassKernel, PassKind, PassParams};

/// Upper bound on pyramid depth (and on the `iterations` setting).
pub const MAX_ITERATIONS: u32 = 16;

/// Depth the builder reaches for a `width`x`height` source and the given
/// iteration cap, without touching any buffer.
///
/// `iterations` is clamped to `1..=MAX_ITERATIONS` first, so the result is
/// always at least 1.
#[must_use]
pub fn pyramid_depth(width: u32, height: u32, iterations: u32) -> usize {
    let iterations = iterations.clamp(1, MAX_ITERATIONS) as usize;
    let mut desc = ImageDesc::new(width, height, wgpu::TextureFormat::R8Unorm);
    let mut level = 1;
    while level < iterations {
        desc = desc.halved();
        if !desc.is_downsample_level() {
            break;
        }
        level += 1;
    }
    level
}

/// Ordered pyramid levels borrowed from an allocator.
///
/// Slots are cleared as the collapser consumes them, so a level is released
/// exactly once: either explicitly or by `Drop`.
pub(crate) struct Pyramid<'a, A: BufferAllocator> {
    allocator: &'a mut A,
    levels: Vec<Option<A::Buffer>>,
}

impl<'a, A: BufferAllocator> Pyramid<'a, A> {
    pub(crate) fn new(allocator: &'a mut A, capacity: u32) -> Self {
        Self {
            allocator,
            levels: Vec::with_capacity(capacity as usize),
        }
    }

    /// Number of levels created so far, released ones included.
    pub(crate) fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Acquire a buffer and append it as the next level. Returns its index.
    pub(crate) fn push(&mut self, desc: ImageDesc) -> Result<usize, BloomError> {
        if self.levels.len() >= MAX_ITERATIONS as usize {
            return Err(invariant(format!(
                "pyramid already holds {MAX_ITERATIONS} levels"
            )));
        }
        let buffer = self.allocator.acquire(desc)?;
        self.levels.push(Some(buffer));
        Ok(self.levels.len() - 1)
    }

    /// Borrow a live level.
    pub(crate) fn level(&self, index: usize) -> Result<&A::Buffer, BloomError> {
        match self.levels.get(index) {
            Some(Some(buffer)) => Ok(buffer),
            Some(None) => Err(invariant(format!(
                "pyramid level {index} was already released"
            ))),
            None => Err(invariant(format!(
                "pyramid level {index} out of range (depth {})",
                self.levels.len()
            ))),
        }
    }

    /// Shapes of all levels, in index order. Released levels are skipped.
    pub(crate) fn descs(&self) -> Vec<ImageDesc> {
        self.levels.iter().flatten().map(Image::desc).collect()
    }

    /// Clear a slot and hand its buffer back to the allocator.
    pub(crate) fn release_level(&mut self, index: usize) -> Result<(), BloomError> {
        let buffer = self
            .levels
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| invariant(format!("cannot release pyramid level {index}")))?;
        self.allocator.release(buffer);
        Ok(())
    }
}

impl<A: BufferAllocator> Drop for Pyramid<'_, A> {
    fn drop(&mut self) {
        for buffer in self.levels.drain(..).flatten() {
            self.allocator.release(buffer);
        }
    }
}

fn invariant(msg: String) -> BloomError {
    debug_assert!(false, "{msg}");
    log::error!("{msg}");
    BloomError::InvariantViolation(msg)
}

/// Extend a pyramid holding only level 0 with downsampled levels.
///
/// Returns the achieved depth: `iterations` if every halving stayed at 2x2
/// or above, otherwise the index of the first level that would have been too
/// small. The level-0 buffer is never touched.
pub(crate) fn build<A, K>(
    pyramid: &mut Pyramid<'_, A>,
    kernel: &mut K,
    iterations: u32,
) -> Result<usize, BloomError>
where
    A: BufferAllocator,
    K: PassKernel<Image = A::Buffer>,
{
    if pyramid.depth() != 1 {
        return Err(invariant(format!(
            "downsample chain must start from level 0 alone, found {} levels",
            pyramid.depth()
        )));
    }

    let iterations = iterations as usize;
    let mut desc = pyramid.level(0)?.desc();
    let mut level = 1;
    while level < iterations {
        desc = desc.halved();
        if !desc.is_downsample_level() {
            break;
        }
        let index = pyramid.push(desc)?;
        kernel.apply(
            PassKind::Downsample,
            PassInputs::single(pyramid.level(index - 1)?),
            PassParams::default(),
            pyramid.level(index)?,
        )?;
        level += 1;
    }

    log::debug!(
        "bloom pyramid depth {level} (requested {iterations}) from {}",
        pyramid.level(0)?.desc()
    );
    Ok(level)
}

/// Fold the pyramid back into level 0.
///
/// The deepest level is the initial source. Walking down from `depth - 2`,
/// each stored level is combined in place with the current source, the
/// current source is released, and the stored level becomes the new source.
/// On return only level 0 is still held.
pub(crate) fn collapse<A, K>(
    pyramid: &mut Pyramid<'_, A>,
    kernel: &mut K,
    depth: usize,
) -> Result<(), BloomError>
where
    A: BufferAllocator,
    K: PassKernel<Image = A::Buffer>,
{
    if depth != pyramid.depth() {
        return Err(invariant(format!(
            "collapse depth {depth} does not match pyramid depth {}",
            pyramid.depth()
        )));
    }

    let Some(start) = depth.checked_sub(2) else {
        return Ok(());
    };

    for index in (0..=start).rev() {
        let current = pyramid.level(index + 1)?;
        let target = pyramid.level(index)?;
        kernel.apply(
            PassKind::Upsample,
            PassInputs::pair(current, target),
            PassParams::default(),
            target,
        )?;
        pyramid.release_level(index + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_stops_before_two_pixels() {
        assert_eq!(pyramid_depth(512, 512, 4), 4);
        assert_eq!(pyramid_depth(3, 3, 5), 1);
        assert_eq!(pyramid_depth(4, 4, 16), 2);
        assert_eq!(pyramid_depth(16, 16, 10), 4);
        assert_eq!(pyramid_depth(1920, 1080, 16), 10);
    }

    #[test]
    fn depth_uses_smaller_dimension() {
        assert_eq!(pyramid_depth(1024, 5, 16), 2);
        assert_eq!(pyramid_depth(5, 1024, 16), 2);
    }

    #[test]
    fn depth_clamps_iterations() {
        assert_eq!(pyramid_depth(512, 512, 0), 1);
        assert_eq!(pyramid_depth(1 << 20, 1 << 20, 40), 16);
        assert_eq!(pyramid_depth(1, 1, 1), 1);
    }

    #[test]
    fn depth_matches_halving_count_for_all_iterations() {
        for iterations in 1..=MAX_ITERATIONS {
            for (w, h) in [(1, 1), (2, 2), (3, 7), (64, 48), (1000, 3), (4096, 4096)] {
                let mut halvings = 0usize;
                let (mut cw, mut ch) = (w, h);
                while cw / 2 >= 2 && ch / 2 >= 2 {
                    cw /= 2;
                    ch /= 2;
                    halvings += 1;
                }
                let expected = (halvings + 1).min(iterations as usize);
                assert_eq!(
                    pyramid_depth(w, h, iterations),
                    expected,
                    "{w}x{h} at {iterations} iterations"
                );
            }
        }
    }
}
