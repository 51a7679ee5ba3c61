use crate::error::{DitherError, DitherResult};
use crate::processor::ProcessedFrame;
use image::RgbaImage;

/// Pixel format of the output target the presentation pipeline renders into
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const PRESENT_SHADER: &str = r#"
struct VertexOutput {
  @builtin(position) position: vec4<f32>,
  @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOutput {
  var positions = array<vec2<f32>, 3>(
    vec2<f32>(-1.0, -1.0),
    vec2<f32>( 3.0, -1.0),
    vec2<f32>(-1.0,  3.0),
  );
  var uvs = array<vec2<f32>, 3>(
    vec2<f32>(0.0,  1.0),
    vec2<f32>(2.0,  1.0),
    vec2<f32>(0.0, -1.0),
  );
  var out: VertexOutput;
  out.position = vec4<f32>(positions[vi], 0.0, 1.0);
  out.uv = uvs[vi];
  return out;
}

@group(0) @binding(0) var t_frame: texture_2d<f32>;
@group(0) @binding(1) var s_frame: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
  return textureSample(t_frame, s_frame, in.uv);
}
"#;

struct GpuTexture {
    width: u32,
    height: u32,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl GpuTexture {
    fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

struct Readback {
    buffer: wgpu::Buffer,
    bytes_per_row: u32,
}

/// GPU presentation path.
///
/// Owns the device, the full-screen-triangle pipeline and every texture it
/// renders with. All of it is released by [`AcceleratedBackend::release`],
/// which also runs on drop.
pub struct AcceleratedBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    clear: wgpu::Color,

    source: Option<GpuTexture>,
    output: Option<GpuTexture>,
    readback: Option<Readback>,
    released: bool,
}

impl AcceleratedBackend {
    /// Acquire an adapter and device, then build the presentation pipeline.
    ///
    /// Any missing piece (no backend API, no adapter, device refused) is an
    /// error; callers treat it as "use the software surface".
    pub fn probe(clear_color: [u8; 4]) -> DitherResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            },
        ))
        .map_err(|e| DitherError::backend(format!("no compatible adapter: {e}")))?;

        let info = adapter.get_info();
        log::debug!("gpu adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("dither_device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| DitherError::backend(format!("request_device failed: {e}")))?;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("dither_present_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("dither_present_bgl"),
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
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("dither_present_shader"),
            source: wgpu::ShaderSource::Wgsl(PRESENT_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("dither_present_pl"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("dither_present_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: OUTPUT_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let [r, g, b, a] = clear_color;
        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            sampler,
            clear: wgpu::Color {
                r: r as f64 / 255.0,
                g: g as f64 / 255.0,
                b: b as f64 / 255.0,
                a: a as f64 / 255.0,
            },
            source: None,
            output: None,
            readback: None,
            released: false,
        })
    }

    fn check_size(&self, width: u32, height: u32) -> DitherResult<()> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(DitherError::backend(format!(
                "{width}x{height} exceeds the maximum texture size {max}"
            )));
        }
        Ok(())
    }

    fn create_texture(
        &self,
        label: &str,
        width: u32,
        height: u32,
        usage: wgpu::TextureUsages,
    ) -> GpuTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OUTPUT_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuTexture {
            width,
            height,
            texture,
            view,
        }
    }

    /// Run `f` inside validation + out-of-memory error scopes and turn any
    /// captured GPU error into a `DitherError`
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> DitherResult<T>) -> DitherResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = f(self);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        if let Some(err) = validation.or(oom) {
            return Err(DitherError::backend(err.to_string()));
        }
        result
    }

    /// Size the output target. A zero-sized target is dropped, not allocated.
    pub fn resize_output(&mut self, width: u32, height: u32) -> DitherResult<()> {
        if self.released {
            return Err(DitherError::backend("accelerated backend already released"));
        }
        if self.output.as_ref().is_some_and(|o| o.matches(width, height)) {
            return Ok(());
        }
        if let Some(old) = self.output.take() {
            old.texture.destroy();
        }
        if let Some(old) = self.readback.take() {
            old.buffer.destroy();
        }
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.check_size(width, height)?;

        self.scoped(|this| {
            let output = this.create_texture(
                "dither_output",
                width,
                height,
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
            );

            let bytes_per_row = align_to(width * 4, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
            let buffer = this.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("dither_readback"),
                size: bytes_per_row as u64 * height as u64,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            this.output = Some(output);
            this.readback = Some(Readback {
                buffer,
                bytes_per_row,
            });
            Ok(())
        })?;
        log::debug!("accelerated output target resized to {width}x{height}");
        Ok(())
    }

    /// Re-create the frame texture when the processed frame changes size
    fn ensure_source_texture(&mut self, width: u32, height: u32) -> DitherResult<()> {
        if self.source.as_ref().is_some_and(|s| s.matches(width, height)) {
            return Ok(());
        }
        if let Some(old) = self.source.take() {
            old.texture.destroy();
        }
        self.check_size(width, height)?;

        let source = self.create_texture(
            "dither_frame",
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        self.source = Some(source);
        log::debug!("accelerated frame texture reallocated at {width}x{height}");
        Ok(())
    }

    /// Upload the frame and draw it over the whole output target
    pub fn present(&mut self, frame: &ProcessedFrame) -> DitherResult<()> {
        if self.released {
            return Err(DitherError::backend("accelerated backend already released"));
        }
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Ok(());
        }
        if self.output.is_none() {
            self.resize_output(width, height)?;
        }

        self.scoped(|this| {
            this.ensure_source_texture(width, height)?;
            let (Some(source), Some(output)) = (this.source.as_ref(), this.output.as_ref()) else {
                return Err(DitherError::backend("accelerated textures not allocated"));
            };

            this.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &source.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                frame.image.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );

            let bind_group = this.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("dither_present_bg"),
                layout: &this.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&source.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&this.sampler),
                    },
                ],
            });

            let mut encoder = this
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("dither_present_encoder"),
                });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("dither_present_rp"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &output.view,
                        resolve_target: None,
                        depth_slice: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(this.clear),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(&this.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
            this.queue.submit(Some(encoder.finish()));
            Ok(())
        })
    }

    /// Copy the output target back to the CPU
    pub fn read_output(&mut self) -> DitherResult<Option<RgbaImage>> {
        if self.released {
            return Ok(None);
        }
        let (Some(output), Some(readback)) = (self.output.as_ref(), self.readback.as_ref()) else {
            return Ok(None);
        };
        let (width, height) = (output.width, output.height);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("dither_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &output.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(readback.bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = readback.buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| DitherError::backend(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| DitherError::backend("readback channel closed"))?
            .map_err(|e| DitherError::backend(format!("readback map failed: {e:?}")))?;

        let mapped = slice.get_mapped_range();
        let row_bytes = width as usize * 4;
        let padded = readback.bytes_per_row as usize;
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * padded;
            data.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        drop(mapped);
        readback.buffer.unmap();

        RgbaImage::from_raw(width, height, data)
            .map(Some)
            .ok_or_else(|| DitherError::backend("readback size mismatch"))
    }

    pub fn output_dimensions(&self) -> Option<(u32, u32)> {
        self.output.as_ref().map(|o| (o.width, o.height))
    }

    /// Destroy textures and buffers and tear down the device. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(source) = self.source.take() {
            source.texture.destroy();
        }
        if let Some(output) = self.output.take() {
            output.texture.destroy();
        }
        if let Some(readback) = self.readback.take() {
            readback.buffer.destroy();
        }
        self.device.destroy();
        log::debug!("accelerated backend released");
    }
}

impl Drop for AcceleratedBackend {
    fn drop(&mut self) {
        self.release();
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}
