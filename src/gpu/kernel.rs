//! wgpu implementation of the bloom pass kernel.
//!
//! One WGSL program provides every pass as a fragment entry point. Pipelines
//! are created on demand per (pass, target format) and cached. All passes of
//! one `process` call are recorded into a single command encoder, submitted
//! by [`PassKernel::flush`].

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use super::pipeline_helpers::{self, ScreenPipelineDesc};
use super::shader_composer::ShaderComposer;
use super::texture::GpuImage;
use crate::error::BloomError;
use crate::image::Image;
use crate::kernel::{LazyProgram, PassInputs, PassKernel, PassKind, PassParams};

/// Vertex entry point every program must export.
pub const VERTEX_ENTRY: &str = "vs_main";

/// Fragment entry point a program must export for `kind`.
#[must_use]
pub const fn fragment_entry(kind: PassKind) -> &'static str {
    match kind {
        PassKind::Prefilter => "fs_prefilter",
        PassKind::Downsample => "fs_downsample",
        PassKind::Upsample => "fs_upsample",
        PassKind::Composite => "fs_composite",
    }
}

/// Threshold uniform, must match `BloomParams` in the WGSL program.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct BloomParams {
    threshold: f32,
    _pad: [f32; 3],
}

/// Identifier of the filtering program: WGSL source plus the file path used
/// in composer diagnostics.
///
/// The source may `#import viso::fullscreen::{FullscreenOutput,
/// fullscreen_vertex}` and must export [`VERTEX_ENTRY`] and one fragment
/// entry point per pass (see [`fragment_entry`]). Bindings in group 0:
/// primary texture (0), filtering sampler (1), secondary texture (2),
/// `BloomParams` uniform (3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSource {
    source: Cow<'static, str>,
    file_path: String,
}

impl KernelSource {
    /// The box-filter bloom program shipped with the crate.
    #[must_use]
    pub fn builtin() -> Self {
        Self::wgsl(
            include_str!("../../assets/shaders/bloom.wgsl"),
            "bloom.wgsl",
        )
    }

    /// A host-provided WGSL program.
    #[must_use]
    pub fn wgsl(source: impl Into<Cow<'static, str>>, file_path: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            file_path: file_path.into(),
        }
    }

    /// File path reported in diagnostics.
    #[must_use]
    pub fn file_path(&self) -> &str {
        &self.file_path
    }
}

/// Compose and validate a program without a GPU device.
///
/// # Errors
///
/// A human-readable reason when composition or validation fails, or an entry
/// point is missing.
pub fn compile_program(source: &KernelSource) -> Result<naga::Module, String> {
    let mut composer =
        ShaderComposer::new().map_err(|e| format!("shared shader modules: {e}"))?;
    let module = composer
        .compose_naga(&source.source, &source.file_path)
        .map_err(|e| format!("{}: {e}", source.file_path))?;

    let _ = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| format!("{}: validation failed: {e}", source.file_path))?;

    let required = std::iter::once(VERTEX_ENTRY).chain(PassKind::ALL.map(fragment_entry));
    for name in required {
        if !module.entry_points.iter().any(|ep| ep.name == name) {
            return Err(format!(
                "{}: missing entry point `{name}`",
                source.file_path
            ));
        }
    }
    Ok(module)
}

/// GPU objects built from one [`KernelSource`].
struct BloomProgram {
    shader: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    params_buffer: wgpu::Buffer,
    pipelines: FxHashMap<(PassKind, wgpu::TextureFormat), wgpu::RenderPipeline>,
}

impl BloomProgram {
    fn build(device: &wgpu::Device, source: &KernelSource) -> Result<Self, String> {
        let module = compile_program(source)?;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Bloom Shader"),
            source: wgpu::ShaderSource::Naga(Cow::Owned(module)),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Bloom Layout"),
                entries: &[
                    pipeline_helpers::texture_2d(0),
                    pipeline_helpers::filtering_sampler(1),
                    pipeline_helpers::texture_2d(2),
                    pipeline_helpers::uniform_buffer(3),
                ],
            });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Bloom Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Bloom Params Buffer"),
            size: size_of::<BloomParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            shader,
            bind_group_layout,
            pipeline_layout,
            sampler: pipeline_helpers::linear_sampler(device, "Bloom Sampler"),
            params_buffer,
            pipelines: FxHashMap::default(),
        })
    }

    fn pipeline(
        &mut self,
        device: &wgpu::Device,
        kind: PassKind,
        format: wgpu::TextureFormat,
    ) -> &wgpu::RenderPipeline {
        let Self {
            shader,
            pipeline_layout,
            pipelines,
            ..
        } = self;
        pipelines.entry((kind, format)).or_insert_with(|| {
            log::debug!("creating {} pipeline for {format:?}", kind.label());
            let blend = match kind {
                PassKind::Upsample => Some(pipeline_helpers::ADDITIVE_BLEND),
                _ => None,
            };
            pipeline_helpers::create_screen_space_pipeline(
                device,
                shader,
                pipeline_layout,
                &ScreenPipelineDesc {
                    label: kind.label(),
                    vertex_entry: VERTEX_ENTRY,
                    fragment_entry: fragment_entry(kind),
                    format,
                    blend,
                },
            )
        })
    }
}

/// [`PassKernel`] that renders each pass with a fullscreen triangle.
pub struct GpuBloomKernel {
    device: wgpu::Device,
    queue: wgpu::Queue,
    source: Option<KernelSource>,
    program: LazyProgram<BloomProgram>,
    encoder: Option<wgpu::CommandEncoder>,
    threshold: Option<f32>,
}

impl GpuBloomKernel {
    /// Create a kernel. Nothing is compiled until the first
    /// [`prepare`](PassKernel::prepare).
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, source: Option<KernelSource>) -> Self {
        Self {
            device,
            queue,
            source,
            program: LazyProgram::new(),
            encoder: None,
            threshold: None,
        }
    }

    /// Set the program identifier.
    ///
    /// Has no effect on a program that is already built or failed; call
    /// [`teardown`](PassKernel::teardown) first to rebuild from a new source.
    pub fn set_source(&mut self, source: KernelSource) {
        self.source = Some(source);
    }
}

impl PassKernel for GpuBloomKernel {
    type Image = GpuImage;

    fn is_configured(&self) -> bool {
        self.source.is_some()
    }

    fn prepare(&mut self) -> Result<(), BloomError> {
        let Some(source) = &self.source else {
            return Err(BloomError::InvalidConfig(
                "kernel program is not set".to_owned(),
            ));
        };
        let device = &self.device;
        let _ = self
            .program
            .get_or_build(|| BloomProgram::build(device, source))?;
        Ok(())
    }

    fn apply(
        &mut self,
        kind: PassKind,
        inputs: PassInputs<'_, GpuImage>,
        params: PassParams,
        destination: &GpuImage,
    ) -> Result<(), BloomError> {
        if inputs.len() != kind.input_count() {
            return Err(BloomError::InvariantViolation(format!(
                "{} expects {} inputs, got {}",
                kind.label(),
                kind.input_count(),
                inputs.len()
            )));
        }

        let program = self.program.get_mut()?;
        if let Some(threshold) = params.threshold {
            if self.threshold != Some(threshold) {
                let uniform = BloomParams {
                    threshold,
                    _pad: [0.0; 3],
                };
                self.queue.write_buffer(
                    &program.params_buffer,
                    0,
                    bytemuck::cast_slice(&[uniform]),
                );
                self.threshold = Some(threshold);
            }
        }

        // Upsample combines into its own destination through additive
        // blending, so the destination is never bound as a texture.
        let secondary = match (kind, inputs.secondary) {
            (PassKind::Composite, Some(secondary)) => secondary,
            _ => inputs.primary,
        };
        if inputs.primary.aliases(destination) || secondary.aliases(destination) {
            return Err(BloomError::InvalidConfig(format!(
                "{} destination aliases a sampled input",
                kind.label()
            )));
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kind.label()),
            layout: &program.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(inputs.primary.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&program.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(secondary.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: program.params_buffer.as_entire_binding(),
                },
            ],
        });
        let pipeline = program.pipeline(&self.device, kind, destination.desc().format);

        let load = match kind {
            PassKind::Upsample => wgpu::LoadOp::Load,
            _ => wgpu::LoadOp::Clear(wgpu::Color::BLACK),
        };
        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Bloom Encoder"),
            })
        });
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(kind.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: destination.view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }

    fn flush(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            let _ = self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn discard(&mut self) {
        self.encoder = None;
    }

    fn teardown(&mut self) {
        self.encoder = None;
        self.threshold = None;
        self.program.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_uniform_matches_wgsl_layout() {
        // `BloomParams` in bloom.wgsl: threshold plus three f32 pads.
        assert_eq!(size_of::<BloomParams>(), 16);
    }

    #[test]
    fn builtin_program_composes_and_validates() {
        let module = compile_program(&KernelSource::builtin()).unwrap();
        for kind in PassKind::ALL {
            assert!(module
                .entry_points
                .iter()
                .any(|ep| ep.name == fragment_entry(kind)));
        }
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let source = KernelSource::wgsl(
            r"
#import viso::fullscreen::{FullscreenOutput, fullscreen_vertex}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> FullscreenOutput {
    return fullscreen_vertex(vertex_index);
}

@fragment
fn fs_prefilter(input: FullscreenOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(input.uv, 0.0, 1.0);
}
",
            "partial.wgsl",
        );
        let reason = compile_program(&source).unwrap_err();
        assert!(reason.contains("fs_downsample"), "{reason}");
    }

    #[test]
    fn syntax_errors_name_the_file() {
        let source = KernelSource::wgsl("fn broken( {", "broken.wgsl");
        let reason = compile_program(&source).unwrap_err();
        assert!(reason.starts_with("broken.wgsl"), "{reason}");
    }
}
