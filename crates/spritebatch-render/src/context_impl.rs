//! Implementation of RenderContext for GraphicsContext.
//!
//! Recorded command lists are replayed into a single `wgpu::CommandEncoder`
//! per submission, and fences are emulated with submission indices.

use crate::context::GraphicsContext;
use spritebatch_core::profiling::profile_function;
use spritebatch_test_utils::{
    BindGroupDesc, BindingResource, CommandList, DeviceError, FenceState, GpuBindGroup,
    GpuBindGroupLayout, GpuBuffer, GpuCommand, GpuFence, GpuRenderPipeline, GpuSampler,
    GpuShaderModule, GpuTexture, GpuTextureView, RenderContext, RenderPipelineDesc,
};
use std::time::Duration;

impl RenderContext for GraphicsContext {
    fn create_buffer(&self, desc: &wgpu::BufferDescriptor) -> GpuBuffer {
        GpuBuffer::from_wgpu(self.device.create_buffer(desc))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer.as_wgpu(), offset, data);
    }

    fn create_texture(&self, desc: &wgpu::TextureDescriptor) -> GpuTexture {
        GpuTexture::from_wgpu(self.device.create_texture(desc))
    }

    fn write_texture(&self, texture: &GpuTexture, data: &[u8], bytes_per_row: u32) {
        let (width, height) = texture.size();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: texture.as_wgpu(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn create_texture_view(&self, texture: &GpuTexture) -> GpuTextureView {
        GpuTextureView::from_wgpu(
            texture
                .as_wgpu()
                .create_view(&wgpu::TextureViewDescriptor::default()),
        )
    }

    fn create_sampler(&self, desc: &wgpu::SamplerDescriptor) -> GpuSampler {
        GpuSampler::from_wgpu(self.device.create_sampler(desc))
    }

    fn create_shader_module(&self, desc: &wgpu::ShaderModuleDescriptor) -> GpuShaderModule {
        GpuShaderModule::from_wgpu(self.device.create_shader_module(desc.clone()))
    }

    fn create_bind_group_layout(&self, desc: &wgpu::BindGroupLayoutDescriptor) -> GpuBindGroupLayout {
        GpuBindGroupLayout::from_wgpu(self.device.create_bind_group_layout(desc))
    }

    fn create_bind_group(&self, desc: &BindGroupDesc) -> GpuBindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = desc
            .entries
            .iter()
            .map(|entry| wgpu::BindGroupEntry {
                binding: entry.binding,
                resource: match &entry.resource {
                    BindingResource::Buffer(buffer) => buffer.as_wgpu().as_entire_binding(),
                    BindingResource::Sampler(sampler) => {
                        wgpu::BindingResource::Sampler(sampler.as_wgpu())
                    }
                    BindingResource::TextureView(view) => {
                        wgpu::BindingResource::TextureView(view.as_wgpu())
                    }
                },
            })
            .collect();

        GpuBindGroup::from_wgpu(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: desc.label,
            layout: desc.layout.as_wgpu(),
            entries: &entries,
        }))
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> GpuRenderPipeline {
        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = desc
            .bind_group_layouts
            .iter()
            .map(|layout| layout.as_wgpu())
            .collect();

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: desc.label,
                bind_group_layouts: &bind_group_layouts,
                push_constant_ranges: &[],
            });

        let module = desc.shader.as_wgpu();
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: desc.label,
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some(desc.vertex_entry),
                    buffers: desc.vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(desc.fragment_entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: desc.target_format,
                        blend: desc.blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: desc.topology,
                    cull_mode: None,
                    unclipped_depth: desc.unclipped_depth,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        GpuRenderPipeline::from_wgpu(pipeline)
    }

    fn supports_unclipped_depth(&self) -> bool {
        self.device
            .features()
            .contains(wgpu::Features::DEPTH_CLIP_CONTROL)
    }

    fn create_fence(&self) -> GpuFence {
        GpuFence::new()
    }

    fn submit(&self, commands: &CommandList, fence: &GpuFence) {
        profile_function!();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sprite_frame_encoder"),
            });

        let mut pass: Option<wgpu::RenderPass<'static>> = None;
        for command in commands.commands() {
            match command {
                GpuCommand::CopyBufferToBuffer {
                    source,
                    source_offset,
                    destination,
                    destination_offset,
                    size,
                } if pass.is_none() => encoder.copy_buffer_to_buffer(
                    source.as_wgpu(),
                    *source_offset,
                    destination.as_wgpu(),
                    *destination_offset,
                    *size,
                ),
                GpuCommand::BeginRenderPass {
                    target,
                    clear_color,
                } if pass.is_none() => {
                    let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("sprite_pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: target.as_wgpu(),
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(*clear_color),
                                store: wgpu::StoreOp::Store,
                            },
                            depth_slice: None,
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    pass = Some(render_pass.forget_lifetime());
                }
                GpuCommand::EndRenderPass => pass = None,
                command => match pass.as_mut() {
                    Some(render_pass) => record_pass_command(render_pass, command),
                    None => tracing::warn!("Dropping {:?} recorded outside a render pass", command),
                },
            }
        }
        drop(pass);

        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        fence.mark_submitted(Some(submission));
    }

    fn wait_fence(&self, fence: &GpuFence, timeout: Option<Duration>) -> Result<(), DeviceError> {
        profile_function!();

        let submission_index = match fence.state() {
            FenceState::Signaled => return Ok(()),
            FenceState::Unsignaled => return Err(DeviceError::FenceNotSubmitted),
            FenceState::Submitted(index) => index,
        };

        match self.device.poll(wgpu::PollType::Wait {
            submission_index,
            timeout,
        }) {
            Ok(_) => {
                fence.signal();
                Ok(())
            }
            Err(wgpu::PollError::Timeout) => {
                Err(DeviceError::FenceTimeout(timeout.unwrap_or_default()))
            }
            Err(e) => Err(DeviceError::Lost(e.to_string())),
        }
    }

    fn reset_fence(&self, fence: &GpuFence) {
        fence.reset();
    }
}

fn record_pass_command(pass: &mut wgpu::RenderPass<'_>, command: &GpuCommand) {
    match command {
        GpuCommand::SetPipeline(pipeline) => pass.set_pipeline(pipeline.as_wgpu()),
        GpuCommand::SetVertexBuffer { slot, buffer } => {
            pass.set_vertex_buffer(*slot, buffer.as_wgpu().slice(..))
        }
        GpuCommand::SetIndexBuffer { buffer, format } => {
            pass.set_index_buffer(buffer.as_wgpu().slice(..), *format)
        }
        GpuCommand::SetBindGroup { index, bind_group } => {
            pass.set_bind_group(*index, bind_group.as_wgpu(), &[])
        }
        GpuCommand::DrawIndexed {
            indices,
            base_vertex,
            instances,
        } => pass.draw_indexed(indices.clone(), *base_vertex, instances.clone()),
        GpuCommand::CopyBufferToBuffer { .. } | GpuCommand::BeginRenderPass { .. } => {
            tracing::warn!("Dropping {:?} recorded inside a render pass", command)
        }
        GpuCommand::EndRenderPass => {}
    }
}
