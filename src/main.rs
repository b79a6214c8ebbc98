//! Headless bloom demo.
//!
//! Renders a synthetic HDR frame (dark gradient with a few bright spots),
//! runs it through the bloom processor on the GPU, reads the result back,
//! and logs how much energy the glow added.
//!
//! Usage: `viso-bloom [options.toml] [WIDTHxHEIGHT]`

use std::path::Path;
use std::process::ExitCode;

use half::f16;
use viso_bloom::gpu::{GpuBloomKernel, KernelSource, RenderContext, RenderTarget, TexturePool};
use viso_bloom::{BloomOptions, BloomProcessor, ImageDesc};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const BYTES_PER_PIXEL: u32 = 8;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut options = BloomOptions {
        iterations: 6,
        ..BloomOptions::default()
    };
    let mut size = (512u32, 512u32);
    for arg in std::env::args().skip(1) {
        if let Some(parsed) = parse_size(&arg) {
            size = parsed;
        } else {
            options = BloomOptions::load(Path::new(&arg))?;
        }
    }
    log::info!(
        "bloom demo: {}x{}, iterations {}, threshold {}",
        size.0,
        size.1,
        options.iterations,
        options.threshold
    );

    let context = pollster::block_on(RenderContext::headless())?;
    let desc = ImageDesc::new(size.0, size.1, FORMAT);
    let source = RenderTarget::new(&context.device, desc, "Demo Source");
    let destination = RenderTarget::new(&context.device, desc, "Demo Destination");
    upload(&context, &source, &synthetic_frame(size.0, size.1));

    let mut bloom = BloomProcessor::new(
        TexturePool::new(context.device.clone()),
        GpuBloomKernel::new(
            context.device.clone(),
            context.queue.clone(),
            Some(KernelSource::builtin()),
        ),
    );
    let report = bloom.process(&source.image(), &destination.image(), &options)?;
    bloom.allocator_mut().end_frame();
    log::info!(
        "pyramid depth {} ({} passes), smallest level {}",
        report.depth,
        report.pass_count(),
        report
            .levels
            .last()
            .map_or_else(|| "-".to_owned(), ToString::to_string)
    );

    let before = luminance_sum(&read_back(&context, &source)?);
    let after = luminance_sum(&read_back(&context, &destination)?);
    log::info!(
        "luminance before {before:.1}, after {after:.1} (+{:.1}%)",
        if before > 0.0 {
            (after - before) / before * 100.0
        } else {
            0.0
        }
    );

    bloom.teardown();
    Ok(())
}

fn parse_size(arg: &str) -> Option<(u32, u32)> {
    let (w, h) = arg.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

/// Dark diagonal gradient with three spots well above the default threshold.
fn synthetic_frame(width: u32, height: u32) -> Vec<[f32; 4]> {
    let spots = [(0.25f32, 0.3f32, 6.0f32), (0.7, 0.6, 3.0), (0.5, 0.85, 9.0)];
    let radius = 0.02 * width.min(height) as f32;
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let base = 0.1 * (x + y) as f32 / (width + height) as f32;
            let mut color = [base, base, base * 1.5, 1.0];
            for (sx, sy, intensity) in spots {
                let dx = x as f32 - sx * width as f32;
                let dy = y as f32 - sy * height as f32;
                if dx * dx + dy * dy < radius * radius {
                    color = [intensity, intensity * 0.8, intensity * 0.5, 1.0];
                }
            }
            pixels.push(color);
        }
    }
    pixels
}

fn upload(context: &RenderContext, target: &RenderTarget, pixels: &[[f32; 4]]) {
    let bytes: Vec<u8> = pixels
        .iter()
        .flatten()
        .flat_map(|&c| f16::from_f32(c).to_le_bytes())
        .collect();
    let size = target.texture.size();
    context.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &target.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &bytes,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.width * BYTES_PER_PIXEL),
            rows_per_image: Some(size.height),
        },
        size,
    );
}

/// Copy a texture into a mappable buffer and decode it to f32 RGBA.
fn read_back(
    context: &RenderContext,
    target: &RenderTarget,
) -> Result<Vec<[f32; 4]>, Box<dyn std::error::Error>> {
    let size = target.texture.size();
    let unpadded = size.width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Demo Readback"),
        size: u64::from(padded) * u64::from(size.height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = context.create_encoder();
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &target.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(size.height),
            },
        },
        size,
    );
    context.submit(encoder);

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = context.device.poll(wgpu::PollType::Wait)?;
    rx.recv()??;

    let data = slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((size.width * size.height) as usize);
    for row in data.chunks_exact(padded as usize) {
        for px in row[..unpadded as usize].chunks_exact(BYTES_PER_PIXEL as usize) {
            let channel = |i: usize| f16::from_le_bytes([px[2 * i], px[2 * i + 1]]).to_f32();
            pixels.push([channel(0), channel(1), channel(2), channel(3)]);
        }
    }
    drop(data);
    buffer.unmap();
    Ok(pixels)
}

fn luminance_sum(pixels: &[[f32; 4]]) -> f64 {
    pixels
        .iter()
        .map(|p| f64::from(0.2126 * p[0] + 0.7152 * p[1] + 0.0722 * p[2]))
        .sum()
}
