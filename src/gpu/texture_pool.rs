//! Reusable pool of transient render textures.
//!
//! Released textures go to an idle list and are handed out again to the next
//! acquire with the same width, height, and format. Idle textures that sit
//! unused for [`IDLE_FRAMES_BEFORE_EVICT`] frames are dropped by
//! [`TexturePool::end_frame`].

use rustc_hash::FxHashMap;

use super::texture::{GpuImage, Origin};
use crate::allocator::BufferAllocator;
use crate::error::BloomError;
use crate::image::ImageDesc;

/// Frames an idle texture survives before [`TexturePool::end_frame`] drops
/// it.
pub const IDLE_FRAMES_BEFORE_EVICT: u32 = 3;

struct Idle<T> {
    id: u64,
    desc: ImageDesc,
    payload: T,
    idle_frames: u32,
}

/// Bookkeeping shared by the GPU pool and its tests: ids, budget, and the
/// idle list. `T` is the backing storage (a `wgpu::Texture` in production).
pub(crate) struct PoolState<T> {
    idle: Vec<Idle<T>>,
    outstanding: FxHashMap<u64, ImageDesc>,
    next_id: u64,
    budget: Option<u64>,
    fault: Option<String>,
}

impl<T> PoolState<T> {
    pub(crate) fn new(budget: Option<u64>) -> Self {
        Self {
            idle: Vec::new(),
            outstanding: FxHashMap::default(),
            next_id: 1,
            budget,
            fault: None,
        }
    }

    /// Bytes held by outstanding and idle entries.
    pub(crate) fn bytes_in_use(&self) -> u64 {
        let outstanding: u64 = self.outstanding.values().map(|d| d.byte_size()).sum();
        let idle: u64 = self.idle.iter().map(|e| e.desc.byte_size()).sum();
        outstanding + idle
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    pub(crate) fn idle(&self) -> usize {
        self.idle.len()
    }

    /// Hand out an idle entry with a matching shape, or create one.
    ///
    /// Idle entries of other shapes are evicted when creating a new entry
    /// would exceed the budget.
    pub(crate) fn acquire_with(
        &mut self,
        desc: ImageDesc,
        create: impl FnOnce(ImageDesc) -> T,
    ) -> Result<(u64, T), BloomError> {
        if let Some(pos) = self.idle.iter().position(|e| e.desc == desc) {
            let entry = self.idle.swap_remove(pos);
            let _ = self.outstanding.insert(entry.id, desc);
            return Ok((entry.id, entry.payload));
        }

        if let Some(budget) = self.budget {
            let needed = desc.byte_size();
            while self.bytes_in_use() + needed > budget && !self.idle.is_empty() {
                let evicted = self.idle.swap_remove(0);
                log::trace!("texture pool evicting idle {} to fit {desc}", evicted.desc);
            }
            let in_use = self.bytes_in_use();
            if in_use + needed > budget {
                return Err(BloomError::AllocationFailure {
                    desc,
                    budget,
                    in_use,
                });
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        let _ = self.outstanding.insert(id, desc);
        Ok((id, create(desc)))
    }

    /// Return an outstanding entry to the idle list.
    ///
    /// Returns `false` (drops the payload and records a fault) if `id` is not
    /// outstanding.
    pub(crate) fn release(&mut self, id: u64, payload: T) -> bool {
        let Some(desc) = self.outstanding.remove(&id) else {
            self.record_fault(format!("release of texture {id} that is not outstanding"));
            return false;
        };
        self.idle.push(Idle {
            id,
            desc,
            payload,
            idle_frames: 0,
        });
        true
    }

    pub(crate) fn end_frame(&mut self) {
        for entry in &mut self.idle {
            entry.idle_frames += 1;
        }
        self.idle
            .retain(|e| e.idle_frames < IDLE_FRAMES_BEFORE_EVICT);
    }

    pub(crate) fn trim(&mut self) {
        self.idle.clear();
    }

    /// Keep the first unmatched release until it is taken.
    pub(crate) fn record_fault(&mut self, msg: String) {
        log::error!("texture pool: {msg}");
        let _ = self.fault.get_or_insert(msg);
    }

    pub(crate) fn take_fault(&mut self) -> Option<String> {
        self.fault.take()
    }
}

/// [`BufferAllocator`] over `wgpu` textures.
///
/// Textures are created with `RENDER_ATTACHMENT | TEXTURE_BINDING` usage.
pub struct TexturePool {
    device: wgpu::Device,
    state: PoolState<wgpu::Texture>,
}

impl TexturePool {
    /// Create an unbounded pool.
    #[must_use]
    pub fn new(device: wgpu::Device) -> Self {
        Self {
            device,
            state: PoolState::new(None),
        }
    }

    /// Create a pool that fails acquires once outstanding plus idle textures
    /// would exceed `budget_bytes`.
    #[must_use]
    pub fn with_budget(device: wgpu::Device, budget_bytes: u64) -> Self {
        Self {
            device,
            state: PoolState::new(Some(budget_bytes)),
        }
    }

    /// Number of textures currently borrowed.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.state.outstanding()
    }

    /// Number of idle textures kept for reuse.
    #[must_use]
    pub fn pooled(&self) -> usize {
        self.state.idle()
    }

    /// Bytes held by borrowed and idle textures.
    #[must_use]
    pub fn bytes_in_use(&self) -> u64 {
        self.state.bytes_in_use()
    }

    /// Age idle textures by one frame and drop the stale ones.
    pub fn end_frame(&mut self) {
        self.state.end_frame();
    }

    /// Drop every idle texture.
    pub fn trim(&mut self) {
        self.state.trim();
    }
}

impl BufferAllocator for TexturePool {
    type Buffer = GpuImage;

    fn acquire(&mut self, desc: ImageDesc) -> Result<GpuImage, BloomError> {
        let device = &self.device;
        let (id, texture) = self.state.acquire_with(desc, |desc| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Bloom Scratch Texture"),
                size: desc.extent(),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: desc.format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        })?;
        Ok(GpuImage::pooled(id, texture, desc))
    }

    fn release(&mut self, buffer: GpuImage) {
        match buffer.origin {
            Origin::Pooled { id, texture } => {
                let known = self.state.release(id, texture);
                debug_assert!(known, "texture {id} released but not outstanding");
            }
            Origin::External { .. } => {
                debug_assert!(false, "external image released to texture pool");
                self.state
                    .record_fault("release of an image the pool never issued".to_owned());
            }
        }
    }

    fn take_release_fault(&mut self) -> Option<BloomError> {
        self.state.take_fault().map(BloomError::InvariantViolation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(w: u32, h: u32) -> ImageDesc {
        ImageDesc::new(w, h, wgpu::TextureFormat::Rgba8Unorm)
    }

    #[test]
    fn released_entries_are_reused_by_shape() {
        let mut pool = PoolState::<u32>::new(None);
        let mut created = 0;
        let (a, payload) = pool
            .acquire_with(desc(8, 8), |_| {
                created += 1;
                10
            })
            .unwrap();
        assert!(pool.release(a, payload));

        let (b, payload) = pool.acquire_with(desc(8, 8), |_| 20).unwrap();
        assert_eq!(a, b);
        assert_eq!(payload, 10);
        assert_eq!(created, 1);

        let (c, _) = pool.acquire_with(desc(4, 4), |_| 30).unwrap();
        assert_ne!(b, c);
        assert_eq!(pool.outstanding(), 2);
    }

    #[test]
    fn outstanding_ids_are_never_reissued() {
        let mut pool = PoolState::<()>::new(None);
        let (a, ()) = pool.acquire_with(desc(8, 8), |_| ()).unwrap();
        let (b, ()) = pool.acquire_with(desc(8, 8), |_| ()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_release_is_reported() {
        let mut pool = PoolState::<()>::new(None);
        let (a, ()) = pool.acquire_with(desc(2, 2), |_| ()).unwrap();
        assert!(pool.release(a, ()));
        assert!(!pool.release(a, ()));
        assert!(!pool.release(999, ()));
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn unmatched_release_is_kept_until_taken() {
        let mut pool = PoolState::<()>::new(None);
        let (a, ()) = pool.acquire_with(desc(2, 2), |_| ()).unwrap();
        assert!(pool.release(a, ()));
        assert_eq!(pool.take_fault(), None);

        assert!(!pool.release(a, ()));
        assert!(!pool.release(999, ()));
        let fault = pool.take_fault().unwrap();
        assert!(fault.contains(&a.to_string()), "{fault}");
        assert_eq!(pool.take_fault(), None);
    }

    #[test]
    fn budget_evicts_idle_before_failing() {
        // 8x8 RGBA8 = 256 bytes.
        let mut pool = PoolState::<()>::new(Some(512));
        let (a, ()) = pool.acquire_with(desc(8, 8), |_| ()).unwrap();
        let (b, ()) = pool.acquire_with(desc(8, 8), |_| ()).unwrap();
        assert!(pool.release(a, ()));

        // Different shape: the idle 8x8 is evicted to make room.
        let (_, ()) = pool.acquire_with(desc(4, 16), |_| ()).unwrap();
        assert_eq!(pool.idle(), 0);

        let err = pool.acquire_with(desc(8, 8), |_| ()).unwrap_err();
        match err {
            BloomError::AllocationFailure { budget, in_use, .. } => {
                assert_eq!(budget, 512);
                assert_eq!(in_use, 512);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(pool.release(b, ()));
    }

    #[test]
    fn end_frame_drops_stale_idle_entries() {
        let mut pool = PoolState::<()>::new(None);
        let (a, ()) = pool.acquire_with(desc(8, 8), |_| ()).unwrap();
        assert!(pool.release(a, ()));
        for _ in 0..IDLE_FRAMES_BEFORE_EVICT - 1 {
            pool.end_frame();
            assert_eq!(pool.idle(), 1);
        }
        pool.end_frame();
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.bytes_in_use(), 0);
    }

    #[test]
    fn trim_keeps_outstanding_entries() {
        let mut pool = PoolState::<()>::new(None);
        let (a, ()) = pool.acquire_with(desc(8, 8), |_| ()).unwrap();
        let (_, ()) = pool.acquire_with(desc(8, 8), |_| ()).unwrap();
        assert!(pool.release(a, ()));
        pool.trim();
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.outstanding(), 1);
        assert_eq!(pool.bytes_in_use(), 256);
    }
}
