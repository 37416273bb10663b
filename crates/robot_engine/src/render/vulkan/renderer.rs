//! Frame orchestration
//!
//! One `draw_frame` call runs the whole per-tick protocol: acquire an image,
//! re-record the per-object secondary buffers and the acquired image's
//! primary buffer, push the camera matrices through the staged upload path,
//! submit, wait the frame fence, and present. Surface staleness detected at
//! any point marks the swapchain for recreation before the next acquire.
//!
//! A single fence serializes frame N+1's recording against frame N's GPU
//! completion. That caps throughput but keeps command buffer reuse trivially
//! safe, and it is the protocol this engine is specified to have.

use ash::vk;
use nalgebra::Matrix4;

use crate::config::ShaderConfig;
use crate::render::camera::{Camera, CameraUbo};
use crate::render::vertex::Vertex;
use crate::render::vulkan::buffer::{IndexBuffer, UniformBuffer, Uploader, VertexBuffer};
use crate::render::vulkan::commands::CommandPool;
use crate::render::vulkan::context::{VulkanContext, VulkanError, VulkanResult};
use crate::render::vulkan::descriptor::{DescriptorPool, DescriptorSetLayout};
use crate::render::vulkan::framebuffer::{find_depth_format, DepthBuffer, Framebuffer};
use crate::render::vulkan::registry::{GameObject, Mesh, ObjectRegistry, MAX_MESHES};
use crate::render::vulkan::render_pass::RenderPass;
use crate::render::vulkan::shader::GraphicsPipeline;
use crate::render::vulkan::swapchain::Swapchain;
use crate::render::vulkan::sync::FrameSync;
use crate::render::vulkan::texture::Texture;
use crate::assets::TextureData;
use crate::window::Window;

/// Per-wait fence timeout, matching the original engine's 100ms slices.
const FENCE_TIMEOUT_NS: u64 = 100_000_000;
/// Bounded retry budget for transient fence timeouts.
const FENCE_MAX_WAITS: u32 = 100;

/// Background clear color.
const CLEAR_COLOR: [f32; 4] = [0.9, 1.0, 0.8, 1.0];

/// The Vulkan renderer: owns every GPU resource and runs the frame loop.
///
/// Field order is drop order; everything GPU-side is released before the
/// context tears down the device.
pub struct VulkanRenderer {
    frame_sync: FrameSync,
    uniform_buffer: UniformBuffer<CameraUbo>,
    primary_buffers: Vec<vk::CommandBuffer>,
    framebuffers: Vec<Framebuffer>,
    depth_buffer: DepthBuffer,
    pipeline: GraphicsPipeline,
    descriptor_pool: DescriptorPool,
    descriptor_layout: DescriptorSetLayout,
    render_pass: RenderPass,
    swapchain: Swapchain,
    command_pool: CommandPool,
    context: VulkanContext,

    shaders: ShaderConfig,
    depth_format: vk::Format,
    swapchain_stale: bool,
}

impl VulkanRenderer {
    /// Bring up the full rendering stack for `window`.
    pub fn new(window: &mut Window, shaders: ShaderConfig) -> VulkanResult<Self> {
        let title = window.title().to_string();
        let context = VulkanContext::new(window, &title)?;
        let device = context.device.device.clone();

        let (width, height) = window.framebuffer_size();
        let swapchain = Swapchain::new(
            &context.instance.instance,
            device.clone(),
            &context.physical,
            context.surface,
            &context.surface_loader,
            vk::Extent2D { width, height },
            vk::SwapchainKHR::null(),
        )?;

        let depth_format = find_depth_format(&context.instance.instance, context.physical.device)?;
        let render_pass = RenderPass::new(device.clone(), swapchain.format().format, depth_format)?;

        let descriptor_layout = DescriptorSetLayout::new(device.clone())?;
        let descriptor_pool = DescriptorPool::new(device.clone(), MAX_MESHES as u32)?;

        let pipeline = GraphicsPipeline::new(
            device.clone(),
            render_pass.handle(),
            descriptor_layout.handle(),
            swapchain.extent(),
            &shaders.vertex_path,
            &shaders.fragment_path,
        )?;

        let command_pool = CommandPool::new(device.clone(), context.physical.graphics_family)?;

        let depth_buffer = DepthBuffer::new(
            device.clone(),
            &context.physical.memory_properties,
            depth_format,
            swapchain.extent(),
        )?;

        let framebuffers = Self::build_framebuffers(
            &device,
            &render_pass,
            &swapchain,
            &depth_buffer,
        )?;

        let primary_buffers = command_pool.allocate_primary(swapchain.image_count() as u32)?;

        let uploader = Uploader::new(
            device.clone(),
            context.physical.memory_properties,
            command_pool.handle(),
            context.device.graphics_queue,
        );
        let uniform_buffer = UniformBuffer::new(&uploader)?;

        let frame_sync = FrameSync::new(device)?;

        Ok(Self {
            frame_sync,
            uniform_buffer,
            primary_buffers,
            framebuffers,
            depth_buffer,
            pipeline,
            descriptor_pool,
            descriptor_layout,
            render_pass,
            swapchain,
            command_pool,
            context,
            shaders,
            depth_format,
            swapchain_stale: false,
        })
    }

    fn build_framebuffers(
        device: &ash::Device,
        render_pass: &RenderPass,
        swapchain: &Swapchain,
        depth_buffer: &DepthBuffer,
    ) -> VulkanResult<Vec<Framebuffer>> {
        swapchain
            .image_views()
            .iter()
            .map(|&view| {
                Framebuffer::new(
                    device.clone(),
                    render_pass.handle(),
                    &[view, depth_buffer.image_view()],
                    swapchain.extent(),
                )
            })
            .collect()
    }

    /// Staged-upload context over the renderer's pool and graphics queue.
    pub fn uploader(&self) -> Uploader {
        Uploader::new(
            self.context.device.device.clone(),
            self.context.physical.memory_properties,
            self.command_pool.handle(),
            self.context.device.graphics_queue,
        )
    }

    /// Command pool secondary buffers are allocated from.
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    /// Upload mesh data and build its descriptor set.
    pub fn build_mesh(
        &self,
        vertices: &[Vertex],
        indices: &[u32],
        texture: &TextureData,
    ) -> VulkanResult<Mesh> {
        let uploader = self.uploader();

        let vertex_buffer = VertexBuffer::new(&uploader, vertices)?;
        let index_buffer = IndexBuffer::new(&uploader, indices)?;
        let gpu_texture =
            Texture::from_rgba(&uploader, texture.width, texture.height, &texture.pixels)?;

        let descriptor_set = self.descriptor_pool.allocate_set(
            &self.descriptor_layout,
            self.uniform_buffer.handle(),
            self.uniform_buffer.range(),
            &gpu_texture,
        )?;

        Ok(Mesh::new(vertex_buffer, index_buffer, gpu_texture, descriptor_set))
    }

    /// Note that the presentation surface no longer matches the window.
    /// Recreation happens before the next frame's acquire.
    pub fn mark_surface_stale(&mut self) {
        self.swapchain_stale = true;
    }

    /// Block until the device is idle. Called before teardown and by the
    /// host when it needs a hard frame boundary.
    pub fn wait_idle(&self) {
        unsafe {
            let _ = self.context.device.device.device_wait_idle();
        }
    }

    /// Run one frame of the acquire/record/update/submit/wait/present
    /// protocol. Stale-surface conditions are absorbed here; any error
    /// returned is fatal-tier.
    pub fn draw_frame(
        &mut self,
        registry: &ObjectRegistry,
        camera: &Camera,
        window: &Window,
    ) -> VulkanResult<()> {
        let device = self.context.device.device.clone();

        if self.swapchain_stale {
            self.recreate_swapchain(window)?;
            if self.swapchain_stale {
                // Still minimized; try again next tick.
                return Ok(());
            }
        }

        // 1. Acquire, with an effectively unbounded wait.
        let acquire = unsafe {
            self.swapchain.loader().acquire_next_image(
                self.swapchain.handle(),
                u64::MAX,
                self.frame_sync.image_available.handle(),
                vk::Fence::null(),
            )
        };
        let image_index = match acquire {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    self.swapchain_stale = true;
                }
                index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.swapchain_stale = true;
                self.recreate_swapchain(window)?;
                return Ok(());
            }
            Err(e) => return Err(VulkanError::Api(e)),
        };

        // 2. Record: per-object secondaries, then the acquired primary.
        let extent = self.swapchain.extent();
        let aspect = extent.width as f32 / extent.height as f32;
        let ubo = CameraUbo::new(camera, aspect);
        let view_proj: Matrix4<f32> =
            Matrix4::from(ubo.proj) * Matrix4::from(ubo.view);

        let framebuffer = self.framebuffers[image_index as usize].handle();
        for (object, mesh) in registry.drawable_objects() {
            if object.visible {
                self.record_secondary(&device, object, mesh, framebuffer, &view_proj)?;
            }
        }
        self.record_primary(
            &device,
            image_index as usize,
            &registry.visible_command_buffers(),
        )?;

        // 3. Update the uniform buffer through the staged path.
        self.uniform_buffer.update(&self.uploader(), &ubo)?;

        // 4. Submit, signaling the render-finished semaphore and the fence.
        let wait_semaphores = [self.frame_sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.primary_buffers[image_index as usize]];
        let signal_semaphores = [self.frame_sync.render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            device
                .queue_submit(
                    self.context.device.graphics_queue,
                    &[submit_info.build()],
                    self.frame_sync.in_flight.handle(),
                )
                .map_err(VulkanError::Api)?;
        }

        // 5. Wait for the frame fence so the buffers are reusable next tick.
        self.frame_sync
            .in_flight
            .wait_retrying(FENCE_TIMEOUT_NS, FENCE_MAX_WAITS)?;
        self.frame_sync.in_flight.reset()?;

        // 6. Present, waiting on render-finished.
        let swapchains = [self.swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let present = unsafe {
            self.swapchain
                .loader()
                .queue_present(self.context.device.present_queue, &present_info)
        };
        match present {
            Ok(suboptimal) => {
                if suboptimal {
                    self.swapchain_stale = true;
                }
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => self.swapchain_stale = true,
            Err(e) => return Err(VulkanError::Api(e)),
        }

        Ok(())
    }

    /// Record one object's secondary command buffer: bind pipeline, mesh
    /// buffers, and descriptor set, push the MVP, draw indexed.
    fn record_secondary(
        &self,
        device: &ash::Device,
        object: &GameObject,
        mesh: &Mesh,
        framebuffer: vk::Framebuffer,
        view_proj: &Matrix4<f32>,
    ) -> VulkanResult<()> {
        let buffer = object.command_buffer;

        let inheritance = vk::CommandBufferInheritanceInfo::builder()
            .render_pass(self.render_pass.handle())
            .subpass(0)
            .framebuffer(framebuffer);

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE)
            .inheritance_info(&inheritance);

        unsafe {
            device
                .begin_command_buffer(buffer, &begin_info)
                .map_err(VulkanError::Api)?;

            device.cmd_bind_pipeline(
                buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.handle(),
            );

            device.cmd_bind_vertex_buffers(buffer, 0, &[mesh.vertex_buffer.handle()], &[0]);
            device.cmd_bind_index_buffer(
                buffer,
                mesh.index_buffer.handle(),
                0,
                vk::IndexType::UINT32,
            );
            device.cmd_bind_descriptor_sets(
                buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout(),
                0,
                &[mesh.descriptor_set],
                &[],
            );

            let mvp: [[f32; 4]; 4] = (view_proj * object.model_matrix()).into();
            device.cmd_push_constants(
                buffer,
                self.pipeline.layout(),
                vk::ShaderStageFlags::VERTEX,
                0,
                bytemuck::bytes_of(&mvp),
            );

            device.cmd_draw_indexed(buffer, mesh.index_count(), 1, 0, 0, 0);

            device.end_command_buffer(buffer).map_err(VulkanError::Api)?;
        }

        Ok(())
    }

    /// Record the primary buffer for the acquired image: begin the render
    /// pass and execute every visible secondary.
    fn record_primary(
        &self,
        device: &ash::Device,
        image_index: usize,
        secondaries: &[vk::CommandBuffer],
    ) -> VulkanResult<()> {
        let buffer = self.primary_buffers[image_index];

        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            device
                .begin_command_buffer(buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass.handle())
            .framebuffer(self.framebuffers[image_index].handle())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.swapchain.extent(),
            })
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(
                buffer,
                &render_pass_begin,
                vk::SubpassContents::SECONDARY_COMMAND_BUFFERS,
            );

            if !secondaries.is_empty() {
                device.cmd_execute_commands(buffer, secondaries);
            }

            device.cmd_end_render_pass(buffer);
            device.end_command_buffer(buffer).map_err(VulkanError::Api)?;
        }

        Ok(())
    }

    /// Tear down and rebuild everything that depends on the surface.
    ///
    /// The new swapchain is created while the old one still exists (handed
    /// over via `old_swapchain`), then the dependents are rebuilt in strict
    /// order: render pass, pipeline, depth buffer, framebuffers, primary
    /// command buffers. A zero-sized window leaves everything untouched.
    fn recreate_swapchain(&mut self, window: &Window) -> VulkanResult<()> {
        let (width, height) = window.framebuffer_size();
        if width == 0 || height == 0 {
            log::debug!("swapchain recreation deferred: window is minimized");
            return Ok(());
        }

        log::info!("recreating swapchain at {width}x{height}");
        let device = self.context.device.device.clone();
        unsafe {
            device.device_wait_idle().map_err(VulkanError::Api)?;
        }

        let new_swapchain = Swapchain::new(
            &self.context.instance.instance,
            device.clone(),
            &self.context.physical,
            self.context.surface,
            &self.context.surface_loader,
            vk::Extent2D { width, height },
            self.swapchain.handle(),
        )?;
        // Old swapchain is destroyed only now, after its replacement exists.
        self.swapchain = new_swapchain;

        self.render_pass = RenderPass::new(
            device.clone(),
            self.swapchain.format().format,
            self.depth_format,
        )?;

        self.pipeline = GraphicsPipeline::new(
            device.clone(),
            self.render_pass.handle(),
            self.descriptor_layout.handle(),
            self.swapchain.extent(),
            &self.shaders.vertex_path,
            &self.shaders.fragment_path,
        )?;

        self.depth_buffer = DepthBuffer::new(
            device.clone(),
            &self.context.physical.memory_properties,
            self.depth_format,
            self.swapchain.extent(),
        )?;

        self.framebuffers = Self::build_framebuffers(
            &device,
            &self.render_pass,
            &self.swapchain,
            &self.depth_buffer,
        )?;

        self.command_pool.free(&self.primary_buffers);
        self.primary_buffers = self
            .command_pool
            .allocate_primary(self.swapchain.image_count() as u32)?;

        self.swapchain_stale = false;
        Ok(())
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        // Nothing GPU-side may be torn down mid-frame.
        self.wait_idle();
    }
}
