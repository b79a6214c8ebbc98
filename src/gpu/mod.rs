//! wgpu backend: texture pool allocator and render-pipeline kernel.
//!
//! ```ignore
//! let pool = TexturePool::new(device.clone());
//! let kernel = GpuBloomKernel::new(device, queue, Some(KernelSource::builtin()));
//! let mut bloom = BloomProcessor::new(pool, kernel);
//! bloom.process(&GpuImage::from_texture(&hdr), &GpuImage::from_texture(&out), &options)?;
//! ```

/// Fullscreen bloom program and the [`PassKernel`](crate::kernel::PassKernel)
/// that runs it.
pub mod kernel;
/// Shared wgpu boilerplate helpers for screen-space pipelines.
pub mod pipeline_helpers;
/// wgpu device and queue initialization.
pub mod render_context;
/// WGSL shader composition with `#import` support via naga-oil.
pub mod shader_composer;
/// Texture-backed images and host render targets.
pub mod texture;
/// Reusable transient texture pool.
pub mod texture_pool;

pub use kernel::{GpuBloomKernel, KernelSource};
pub use render_context::{RenderContext, RenderContextError};
pub use texture::{GpuImage, RenderTarget};
pub use texture_pool::TexturePool;
