//! Image descriptors shared by allocators, kernels, and the pyramid.

/// Width, height, and pixel format of an image buffer.
///
/// Two buffers with equal descriptors are interchangeable from the pool's
/// point of view; identity lives in the handle, never in the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format of the backing storage.
    pub format: wgpu::TextureFormat,
}

impl ImageDesc {
    /// Create a descriptor.
    #[must_use]
    pub const fn new(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Descriptor of the next pyramid level: both dimensions floor-halved,
    /// format unchanged.
    #[must_use]
    pub const fn halved(self) -> Self {
        Self {
            width: self.width / 2,
            height: self.height / 2,
            format: self.format,
        }
    }

    /// Whether this descriptor may hold a pyramid level below level 0.
    #[must_use]
    pub const fn is_downsample_level(self) -> bool {
        self.width >= 2 && self.height >= 2
    }

    /// Size of the backing storage in bytes.
    ///
    /// Formats without a fixed block size (depth/stencil combos) count as
    /// 4 bytes per pixel.
    #[must_use]
    pub fn byte_size(self) -> u64 {
        let bytes_per_pixel = self.format.block_copy_size(None).unwrap_or(4);
        u64::from(self.width) * u64::from(self.height) * u64::from(bytes_per_pixel)
    }

    /// `wgpu` extent for texture creation.
    #[must_use]
    pub const fn extent(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

impl std::fmt::Display for ImageDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} {:?}", self.width, self.height, self.format)
    }
}

/// Anything the bloom core can hand to a kernel as an input or output.
pub trait Image {
    /// Shape of this image.
    fn desc(&self) -> ImageDesc;

    /// Whether `self` and `other` share backing storage.
    ///
    /// A pass can never read and write the same storage, so the processor
    /// rejects a destination that aliases the source.
    fn aliases(&self, _other: &Self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halving_floors_odd_dimensions() {
        let desc = ImageDesc::new(7, 5, wgpu::TextureFormat::Rgba16Float);
        let half = desc.halved();
        assert_eq!((half.width, half.height), (3, 2));
        assert_eq!(half.format, desc.format);
        assert!(half.is_downsample_level());
        assert!(!half.halved().is_downsample_level());
    }

    #[test]
    fn byte_size_uses_format_block_size() {
        let hdr = ImageDesc::new(4, 2, wgpu::TextureFormat::Rgba16Float);
        assert_eq!(hdr.byte_size(), 4 * 2 * 8);
        let ldr = ImageDesc::new(4, 2, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(ldr.byte_size(), 4 * 2 * 4);
    }
}
