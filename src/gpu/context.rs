use std::cell::Cell;

use wgpu::util::DeviceExt as _;

use crate::{
    foundation::error::{BlarpError, BlarpResult},
    gpu::shaders,
};

/// Full-screen quad as a 4-vertex triangle strip over NDC `[-1, 1]^2`.
const QUAD_VERTICES: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]];

pub(crate) struct ShaderProgram {
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) bind_group_layout: wgpu::BindGroupLayout,
}

/// Process-wide objects shared by every effect call.
pub(crate) struct Programs {
    pub(crate) blur: ShaderProgram,
    pub(crate) sharpen: ShaderProgram,
    pub(crate) quad: wgpu::Buffer,
    pub(crate) sampler: wgpu::Sampler,
}

/// Owner of the headless GPU device and the two compiled blarp programs.
///
/// Create one per run with [`GraphicsContext::initialize`], hand it by reference to
/// [`EffectEngine`](crate::EffectEngine), and call [`GraphicsContext::release`] when done.
/// The context is not `Sync`: it must stay on the thread that renders.
pub struct GraphicsContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    programs: Option<Programs>,
    live_targets: Cell<usize>,
}

impl GraphicsContext {
    #[tracing::instrument]
    pub fn initialize() -> BlarpResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                BlarpError::gpu("no gpu adapter available")
            }
            other => BlarpError::gpu(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let downlevel = adapter.get_downlevel_capabilities();
        if downlevel.shader_model == wgpu::ShaderModel::Sm2 {
            return Err(BlarpError::gpu(
                "gpu adapter only supports shader model 2; shader model 4 or newer is required",
            ));
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("blarp_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| BlarpError::gpu(format!("wgpu request_device failed: {e:?}")))?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let blur = build_program(&device, "blarp_blur", shaders::BLUR_WGSL);
        let sharpen = build_program(&device, "blarp_sharpen", shaders::SHARPEN_WGSL);
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(BlarpError::gpu(format!("shader compilation failed: {err}")));
        }

        let quad_bytes: Vec<u8> = QUAD_VERTICES
            .iter()
            .flatten()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("blarp_quad"),
            contents: &quad_bytes,
            usage: wgpu::BufferUsages::VERTEX,
        });

        // Edge samples wrap around to the opposite side.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("blarp_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let adapter_info = adapter.get_info();
        tracing::info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "gpu context ready"
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
            programs: Some(Programs {
                blur,
                sharpen,
                quad,
                sampler,
            }),
            live_targets: Cell::new(0),
        })
    }

    /// Release the quad geometry, both pipelines and the sampler.
    ///
    /// Idempotent. Effect calls made afterwards fail with a gpu error.
    pub fn release(&mut self) {
        if let Some(programs) = self.programs.take() {
            programs.quad.destroy();
            drop(programs);
            tracing::debug!(live_targets = self.live_targets.get(), "gpu context released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.programs.is_none()
    }

    /// Number of per-call render targets currently allocated.
    pub fn live_targets(&self) -> usize {
        self.live_targets.get()
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub(crate) fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub(crate) fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub(crate) fn programs(&self) -> BlarpResult<&Programs> {
        self.programs
            .as_ref()
            .ok_or_else(|| BlarpError::gpu("graphics context has been released"))
    }

    pub(crate) fn note_target_created(&self) {
        self.live_targets.set(self.live_targets.get() + 1);
    }

    pub(crate) fn note_target_destroyed(&self) {
        self.live_targets.set(self.live_targets.get().saturating_sub(1));
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("adapter", &self.adapter_info.name)
            .field("released", &self.is_released())
            .field("live_targets", &self.live_targets.get())
            .finish()
    }
}

fn build_program(device: &wgpu::Device, label: &'static str, fragment: &str) -> ShaderProgram {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shaders::program_source(fragment).into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(shaders::UNIFORM_BYTES),
                },
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: 8,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 0,
                    shader_location: 0,
                }],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: wgpu::TextureFormat::Rgba8Unorm,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    ShaderProgram {
        pipeline,
        bind_group_layout,
    }
}
