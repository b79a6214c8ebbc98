//! Texture-backed images for the wgpu backend.

use crate::image::{Image, ImageDesc};

pub(crate) enum Origin {
    /// Owned by the host (frame source, swapchain, render target).
    External { texture: wgpu::Texture },
    /// Borrowed from a [`TexturePool`](super::texture_pool::TexturePool).
    Pooled { id: u64, texture: wgpu::Texture },
}

/// A 2D texture view with known shape, usable as a bloom input or output.
///
/// Host textures are wrapped with [`GpuImage::from_texture`]; pyramid levels
/// come from a [`TexturePool`](super::texture_pool::TexturePool) and must be
/// handed back to it.
pub struct GpuImage {
    view: wgpu::TextureView,
    desc: ImageDesc,
    pub(crate) origin: Origin,
}

impl GpuImage {
    /// Wrap a host-owned texture.
    ///
    /// Sources need `TEXTURE_BINDING` usage; destinations need
    /// `RENDER_ATTACHMENT`.
    #[must_use]
    pub fn from_texture(texture: &wgpu::Texture) -> Self {
        let desc = ImageDesc::new(texture.width(), texture.height(), texture.format());
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            view,
            desc,
            origin: Origin::External {
                texture: texture.clone(),
            },
        }
    }

    pub(crate) fn pooled(id: u64, texture: wgpu::Texture, desc: ImageDesc) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            view,
            desc,
            origin: Origin::Pooled { id, texture },
        }
    }

    /// The texture view bound by kernels.
    #[must_use]
    pub const fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Pool id, if this image was borrowed from a pool.
    #[must_use]
    pub const fn pool_id(&self) -> Option<u64> {
        match &self.origin {
            Origin::External { .. } => None,
            Origin::Pooled { id, .. } => Some(*id),
        }
    }

    /// The backing texture.
    #[must_use]
    pub const fn texture(&self) -> &wgpu::Texture {
        match &self.origin {
            Origin::External { texture } | Origin::Pooled { texture, .. } => texture,
        }
    }
}

impl Image for GpuImage {
    fn desc(&self) -> ImageDesc {
        self.desc
    }

    fn aliases(&self, other: &Self) -> bool {
        self.texture() == other.texture()
    }
}

/// A host-side render-target texture and its default view.
///
/// Created with `RENDER_ATTACHMENT | TEXTURE_BINDING | COPY_SRC | COPY_DST`
/// usage, so it can be filled from the CPU, used as a bloom source or
/// destination, and read back.
pub struct RenderTarget {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// A default full-texture view.
    pub view: wgpu::TextureView,
}

impl RenderTarget {
    /// Create a new render-target texture with the given shape.
    #[must_use]
    pub fn new(device: &wgpu::Device, desc: ImageDesc, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: desc.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Wrap this target as a bloom image.
    #[must_use]
    pub fn image(&self) -> GpuImage {
        GpuImage::from_texture(&self.texture)
    }
}
