use image::RgbImage;
use wgpu::util::DeviceExt as _;

use crate::{
    effect::{
        BlarpBackend, RgbaReadback,
        plan::{BlurDirection, PassPlan, PassState, PassTrace, SHARPEN_STRENGTH, Slot},
        rgb_to_rgba8, validate_source,
    },
    foundation::error::{BlarpError, BlarpResult},
    gpu::{
        context::{GraphicsContext, Programs, ShaderProgram},
        shaders,
    },
};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Runs the ping-pong blur/sharpen graph on a [`GraphicsContext`].
///
/// Every call allocates its own pair of render targets and releases them before returning,
/// whether the call succeeds or not. Only the context's programs outlive a call.
pub struct EffectEngine<'ctx> {
    ctx: &'ctx GraphicsContext,
    last_trace: Option<PassTrace>,
    #[cfg(test)]
    fail_after_passes: bool,
}

impl<'ctx> EffectEngine<'ctx> {
    pub fn new(ctx: &'ctx GraphicsContext) -> Self {
        Self {
            ctx,
            last_trace: None,
            #[cfg(test)]
            fail_after_passes: false,
        }
    }

    pub fn context(&self) -> &'ctx GraphicsContext {
        self.ctx
    }

    #[cfg(test)]
    fn forced_failure(&self) -> BlarpResult<()> {
        if self.fail_after_passes {
            return Err(BlarpError::gpu(format!(
                "forced failure with {} live targets",
                self.ctx.live_targets()
            )));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn forced_failure(&self) -> BlarpResult<()> {
        Ok(())
    }

    fn run_plan(
        &self,
        programs: &Programs,
        image: &RgbImage,
        plan: &PassPlan,
    ) -> BlarpResult<RgbaReadback> {
        let device = self.ctx.device();
        let queue = self.ctx.queue();
        let (width, height) = image.dimensions();

        let targets = PingPong {
            a: RenderTarget::new(self.ctx, width, height, "blarp_target_a"),
            b: RenderTarget::new(self.ctx, width, height, "blarp_target_b"),
        };

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &targets.a.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgb_to_rgba8(image.as_raw()),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            extent(width, height),
        );

        let resolution = [width as f32, height as f32];
        let blur_h = PassBinding::new(
            self.ctx,
            programs,
            &programs.blur,
            targets.get(PassState::Blur(BlurDirection::Horizontal).read()),
            [
                resolution[0],
                resolution[1],
                BlurDirection::Horizontal.vector()[0],
                BlurDirection::Horizontal.vector()[1],
            ],
        );
        let blur_v = PassBinding::new(
            self.ctx,
            programs,
            &programs.blur,
            targets.get(PassState::Blur(BlurDirection::Vertical).read()),
            [
                resolution[0],
                resolution[1],
                BlurDirection::Vertical.vector()[0],
                BlurDirection::Vertical.vector()[1],
            ],
        );
        let sharpen = PassBinding::new(
            self.ctx,
            programs,
            &programs.sharpen,
            targets.get(PassState::Sharpen.read()),
            [resolution[0], resolution[1], SHARPEN_STRENGTH, 0.0],
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("blarp_passes"),
        });

        for step in plan.steps() {
            let (program, binding) = match step.state {
                PassState::Blur(BlurDirection::Horizontal) => (&programs.blur, &blur_h),
                PassState::Blur(BlurDirection::Vertical) => (&programs.blur, &blur_v),
                PassState::Sharpen => (&programs.sharpen, &sharpen),
            };
            let target = targets.get(step.write);

            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blarp_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_pipeline(&program.pipeline);
            rp.set_bind_group(0, &binding.bind_group, &[]);
            rp.set_vertex_buffer(0, programs.quad.slice(..));
            rp.draw(0..4, 0..1);
        }

        self.forced_failure()?;

        let bytes_per_row = align_to(
            width
                .checked_mul(4)
                .ok_or_else(|| BlarpError::validation("render target width overflow"))?,
            wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
        );
        let readback = OwnedBuffer(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("blarp_readback"),
            size: u64::from(bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &targets.get(plan.final_slot()).texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback.0,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            extent(width, height),
        );
        queue.submit(Some(encoder.finish()));

        let slice = readback.0.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| BlarpError::gpu(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| BlarpError::gpu("readback channel closed"))?
            .map_err(|e| BlarpError::gpu(format!("readback map failed: {e:?}")))?;

        let data = slice.get_mapped_range().to_vec();
        readback.0.unmap();

        Ok(RgbaReadback {
            width,
            height,
            bytes_per_row,
            data,
        })
    }
}

impl BlarpBackend for EffectEngine<'_> {
    #[tracing::instrument(skip(self, image), fields(w = image.width(), h = image.height()))]
    fn render(&mut self, image: &RgbImage, iterations: u32) -> BlarpResult<RgbaReadback> {
        validate_source(image)?;
        let programs = self.ctx.programs()?;
        let plan = PassPlan::new(iterations);

        if plan.is_empty() {
            self.last_trace = Some(PassTrace {
                steps: Vec::new(),
                read_back_from: Slot::A,
            });
            return Ok(RgbaReadback::from_rgb_image(image));
        }

        let device = self.ctx.device();
        let max_dim = device.limits().max_texture_dimension_2d;
        let (width, height) = image.dimensions();
        if width > max_dim || height > max_dim {
            return Err(BlarpError::validation(format!(
                "image {width}x{height} exceeds the gpu texture limit of {max_dim}"
            )));
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = self.run_plan(programs, image, &plan);
        let validation = pollster::block_on(device.pop_error_scope());
        let oom = pollster::block_on(device.pop_error_scope());

        if let Some(err) = oom {
            return Err(BlarpError::gpu(format!("out of gpu memory: {err}")));
        }
        if let Some(err) = validation {
            return Err(BlarpError::gpu(format!("gpu pass failed: {err}")));
        }
        let readback = result?;

        self.last_trace = Some(PassTrace {
            steps: plan.steps().collect(),
            read_back_from: plan.final_slot(),
        });
        Ok(readback)
    }

    fn last_trace(&self) -> Option<&PassTrace> {
        self.last_trace.as_ref()
    }
}

/// A texture bound as the color output of one pass. Destroyed on drop.
struct RenderTarget<'ctx> {
    ctx: &'ctx GraphicsContext,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl<'ctx> RenderTarget<'ctx> {
    fn new(ctx: &'ctx GraphicsContext, width: u32, height: u32, label: &'static str) -> Self {
        let texture = ctx.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        ctx.note_target_created();
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { ctx, texture, view }
    }
}

impl Drop for RenderTarget<'_> {
    fn drop(&mut self) {
        self.texture.destroy();
        self.ctx.note_target_destroyed();
    }
}

struct PingPong<'ctx> {
    a: RenderTarget<'ctx>,
    b: RenderTarget<'ctx>,
}

impl<'ctx> PingPong<'ctx> {
    fn get(&self, slot: Slot) -> &RenderTarget<'ctx> {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }
}

/// Uniforms plus the bind group sampling one target with one program.
struct PassBinding {
    _uniforms: OwnedBuffer,
    bind_group: wgpu::BindGroup,
}

impl PassBinding {
    fn new(
        ctx: &GraphicsContext,
        programs: &Programs,
        program: &ShaderProgram,
        source: &RenderTarget<'_>,
        params: [f32; 4],
    ) -> Self {
        let device = ctx.device();
        let uniforms = OwnedBuffer(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("blarp_pass_params"),
            contents: &shaders::uniform_bytes(params),
            usage: wgpu::BufferUsages::UNIFORM,
        }));
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blarp_pass_bg"),
            layout: &program.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&programs.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniforms.0.as_entire_binding(),
                },
            ],
        });
        Self {
            _uniforms: uniforms,
            bind_group,
        }
    }
}

struct OwnedBuffer(wgpu::Buffer);

impl Drop for OwnedBuffer {
    fn drop(&mut self) {
        self.0.destroy();
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn context() -> Option<GraphicsContext> {
        match GraphicsContext::initialize() {
            Ok(ctx) => Some(ctx),
            Err(e) if e.to_string().contains("no gpu adapter available") => None,
            Err(e) => panic!("gpu init failed: {e}"),
        }
    }

    #[test]
    fn align_to_rounds_up_to_copy_alignment() {
        assert_eq!(align_to(4, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
    }

    #[test]
    fn failure_after_allocation_frees_both_targets() {
        let Some(ctx) = context() else { return };
        let mut engine = EffectEngine::new(&ctx);
        engine.fail_after_passes = true;

        let img = RgbImage::from_pixel(6, 4, Rgb([10, 20, 30]));
        let err = engine.apply(&img, 3).unwrap_err();
        assert!(err.to_string().contains("with 2 live targets"), "{err}");
        assert_eq!(ctx.live_targets(), 0);
        assert!(engine.last_trace().is_none());

        engine.fail_after_passes = false;
        assert_eq!(engine.apply(&img, 3).unwrap().dimensions(), (6, 4));
        assert_eq!(ctx.live_targets(), 0);
    }
}
