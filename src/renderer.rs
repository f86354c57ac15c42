// =============================================================================
// RENDERER - Owns every Vulkan resource needed to draw the textured quad
// =============================================================================
//
// FRAME FLOW:
// 1. Wait for this frame slot's fence
// 2. Acquire swapchain image (recreate on out-of-date)
// 3. Wait for whichever frame last used that image
// 4. Update uniforms, record commands
// 5. Submit, present, advance the frame slot
//
// =============================================================================

use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::MemoryLocation;
use std::path::PathBuf;
use std::sync::Arc;
use winit::window::Window;

use crate::backend::buffer::Buffer;
use crate::backend::command::Commands;
use crate::backend::descriptor::Descriptors;
use crate::backend::image::{Image, Texture};
use crate::backend::sync::{self, FrameSync};
use crate::backend::{pipeline, shader, Swapchain, VulkanDevice};
use crate::config::Config;
use crate::geometry::{self, UniformBufferObject, QUAD_INDICES, QUAD_VERTICES};
use crate::math::{self, Camera};

const TEXTURE_SIZE: u32 = 256;
const TEXTURE_CELLS: u32 = 8;

/// Outcome of a call to [`Renderer::draw`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Nothing drawn: minimized, or the swapchain was rebuilt
    Skipped,
}

/// Settings the renderer keeps from the config
struct RenderSettings {
    present_mode: vk::PresentModeKHR,
    clear_color: [f32; 4],
    frames_in_flight: usize,
    rotation_speed: f32,
    vertex_shader: PathBuf,
    fragment_shader: PathBuf,
}

/// IMPORTANT: Field order matters for Drop! Wrappers declared later are
/// dropped later; `device` holds the last reference to the Vulkan device.
pub struct Renderer {
    settings: RenderSettings,
    camera: Camera,

    // Per-frame resources
    frame_sync: Vec<FrameSync>,
    /// Fence of the frame currently using each swapchain image
    images_in_flight: Vec<vk::Fence>,
    current_frame: usize,
    command_buffers: Vec<vk::CommandBuffer>,
    uniform_buffers: Vec<Buffer>,

    // Pipeline
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    descriptors: Descriptors,

    // Scene
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    texture: Texture,

    // Swapchain-sized resources
    framebuffers: Vec<vk::Framebuffer>,
    depth: Image,
    swapchain: Swapchain,

    /// Set when the window is resized or the swapchain reports out-of-date
    needs_recreate: bool,

    commands: Commands,
    device: Arc<VulkanDevice>,
}

impl Renderer {
    /// Initialize all Vulkan resources for `window`.
    ///
    /// The window must outlive the renderer.
    pub fn new(window: &Window, config: &Config) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        let settings = RenderSettings {
            present_mode: config.present_mode(),
            clear_color: config.graphics.clear_color,
            frames_in_flight: config.graphics.max_frames_in_flight.max(1),
            rotation_speed: config.graphics.rotation_speed.to_radians(),
            vertex_shader: config.shaders.vertex.clone(),
            fragment_shader: config.shaders.fragment.clone(),
        };

        // Validation layers only in debug builds
        let enable_validation = cfg!(debug_assertions) && config.debug.validation_layers;
        let device = VulkanDevice::new(&config.window.title, enable_validation, window)?;

        let size = window.inner_size();
        let swapchain = Swapchain::new(
            device.clone(),
            size.width.max(1),
            size.height.max(1),
            settings.present_mode,
            vk::SwapchainKHR::null(),
        )?;
        let depth = Image::depth(&device, swapchain.extent)?;

        let render_pass = pipeline::create_render_pass(&device, swapchain.format, depth.format)?;
        let framebuffers = pipeline::create_framebuffers(
            &device,
            &swapchain.image_views,
            depth.view,
            render_pass,
            swapchain.extent,
        )?;

        let commands = Commands::new(device.clone())?;

        let vertex_buffer = Buffer::device_local(
            &device,
            &commands,
            "quad vertices",
            vk::BufferUsageFlags::VERTEX_BUFFER,
            &QUAD_VERTICES,
        )?;
        let index_buffer = Buffer::device_local(
            &device,
            &commands,
            "quad indices",
            vk::BufferUsageFlags::INDEX_BUFFER,
            &QUAD_INDICES,
        )?;

        let pixels = geometry::checkerboard(
            TEXTURE_SIZE,
            TEXTURE_CELLS,
            [255, 255, 255, 255],
            [40, 40, 40, 255],
        );
        let texture = Texture::from_rgba8(
            &device,
            &commands,
            TEXTURE_SIZE,
            TEXTURE_SIZE,
            &pixels,
            config.graphics.max_anisotropy,
        )?;

        let frames = settings.frames_in_flight;
        let uniform_buffers = (0..frames)
            .map(|i| {
                Buffer::new(
                    &device,
                    &format!("uniforms {}", i),
                    std::mem::size_of::<UniformBufferObject>() as vk::DeviceSize,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    MemoryLocation::CpuToGpu,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let descriptors = Descriptors::new(device.clone(), frames)?;
        descriptors.write(&uniform_buffers, &texture);

        let pipeline_layout = pipeline::create_pipeline_layout(&device, descriptors.layout)?;
        let pipeline = build_pipeline(&device, render_pass, pipeline_layout, &settings)?;

        let command_buffers = commands.allocate(frames as u32)?;
        let frame_sync = (0..frames)
            .map(|_| FrameSync::new(&device))
            .collect::<Result<Vec<_>>>()?;
        let images_in_flight = vec![vk::Fence::null(); swapchain.images.len()];

        log::info!("Vulkan initialized successfully!");

        Ok(Self {
            settings,
            camera: Camera::default(),
            frame_sync,
            images_in_flight,
            current_frame: 0,
            command_buffers,
            uniform_buffers,
            pipeline,
            pipeline_layout,
            render_pass,
            descriptors,
            vertex_buffer,
            index_buffer,
            texture,
            framebuffers,
            depth,
            swapchain,
            needs_recreate: false,
            commands,
            device,
        })
    }

    pub fn device(&self) -> &Arc<VulkanDevice> {
        &self.device
    }

    /// Request swapchain recreation before the next frame
    pub fn resize(&mut self) {
        self.needs_recreate = true;
    }

    /// Rebuild the swapchain and everything sized to it
    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        self.device.wait_idle()?;

        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.device.destroy_framebuffer(framebuffer, None);
            }
        }
        self.framebuffers.clear();

        // The old swapchain is retired by the new one, then dropped
        let swapchain = Swapchain::new(
            self.device.clone(),
            width,
            height,
            self.settings.present_mode,
            self.swapchain.swapchain,
        )?;
        let format_changed = swapchain.format != self.swapchain.format;
        self.swapchain = swapchain;

        self.depth = Image::depth(&self.device, self.swapchain.extent)?;

        if format_changed {
            log::info!("Surface format changed, rebuilding render pass");
            let render_pass =
                pipeline::create_render_pass(&self.device, self.swapchain.format, self.depth.format)?;
            let pipeline =
                build_pipeline(&self.device, render_pass, self.pipeline_layout, &self.settings);
            let pipeline = match pipeline {
                Ok(pipeline) => pipeline,
                Err(e) => {
                    unsafe { self.device.device.destroy_render_pass(render_pass, None) };
                    return Err(e);
                }
            };
            unsafe {
                self.device.device.destroy_pipeline(self.pipeline, None);
                self.device.device.destroy_render_pass(self.render_pass, None);
            }
            self.render_pass = render_pass;
            self.pipeline = pipeline;
        }

        self.framebuffers = pipeline::create_framebuffers(
            &self.device,
            &self.swapchain.image_views,
            self.depth.view,
            self.render_pass,
            self.swapchain.extent,
        )?;
        self.images_in_flight = vec![vk::Fence::null(); self.swapchain.images.len()];
        self.needs_recreate = false;

        Ok(())
    }

    /// Reload SPIR-V from disk and rebuild the pipeline. On failure the old
    /// pipeline stays in place.
    pub fn reload_shaders(&mut self) -> Result<()> {
        self.device.wait_idle()?;

        let pipeline = build_pipeline(
            &self.device,
            self.render_pass,
            self.pipeline_layout,
            &self.settings,
        )
        .context("Shader reload failed, keeping previous pipeline")?;

        unsafe { self.device.device.destroy_pipeline(self.pipeline, None) };
        self.pipeline = pipeline;
        log::info!("Shaders reloaded");
        Ok(())
    }

    /// Draw one frame. `elapsed` is the animation time in seconds and
    /// `window_size` the current inner size of the window.
    pub fn draw(&mut self, elapsed: f32, window_size: (u32, u32)) -> Result<FrameStatus> {
        let (width, height) = window_size;
        if width == 0 || height == 0 {
            return Ok(FrameStatus::Skipped);
        }

        if self.needs_recreate {
            self.recreate_swapchain(width, height)?;
        }

        let device = &self.device.device;
        let sync = &self.frame_sync[self.current_frame];

        unsafe { device.wait_for_fences(&[sync.in_flight_fence], true, u64::MAX) }?;

        let Some((image_index, suboptimal)) =
            self.swapchain.acquire_next_image(u64::MAX, sync.image_available)?
        else {
            self.recreate_swapchain(width, height)?;
            return Ok(FrameStatus::Skipped);
        };
        if suboptimal {
            self.needs_recreate = true;
        }

        // A previous frame may still be rendering into this image
        let image_fence = self.images_in_flight[image_index as usize];
        if image_fence != vk::Fence::null() && image_fence != sync.in_flight_fence {
            unsafe { device.wait_for_fences(&[image_fence], true, u64::MAX) }?;
        }
        self.images_in_flight[image_index as usize] = sync.in_flight_fence;

        // Only reset once work is guaranteed to be submitted
        unsafe { device.reset_fences(&[sync.in_flight_fence]) }?;

        let ubo = self.uniforms(elapsed);
        self.uniform_buffers[self.current_frame].write(std::slice::from_ref(&ubo))?;

        let cmd = self.command_buffers[self.current_frame];
        self.record(cmd, image_index)?;

        let sync = &self.frame_sync[self.current_frame];
        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished];
        let command_buffers = [cmd];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.device.queue_submit(
                self.device.graphics_queue.queue,
                &[submit_info.build()],
                sync.in_flight_fence,
            )
        }
        .context("Failed to submit draw command buffer")?;

        let recreate = self.swapchain.present(
            self.device.present_queue.queue,
            image_index,
            &signal_semaphores,
        )?;
        if recreate {
            self.needs_recreate = true;
        }

        self.current_frame = sync::next_frame(self.current_frame, self.settings.frames_in_flight);

        Ok(FrameStatus::Presented)
    }

    fn uniforms(&self, elapsed: f32) -> UniformBufferObject {
        UniformBufferObject {
            model: math::rotation_z(elapsed * self.settings.rotation_speed),
            view: self.camera.view(),
            proj: self.camera.projection(self.swapchain.aspect_ratio()),
        }
    }

    fn record(&self, cmd: vk::CommandBuffer, image_index: u32) -> Result<()> {
        let device = &self.device.device;
        let extent = self.swapchain.extent;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.settings.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass)
            .framebuffer(self.framebuffers[image_index as usize])
            .render_area(pipeline::scissor(extent))
            .clear_values(&clear_values);

        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            device.begin_command_buffer(cmd, &vk::CommandBufferBeginInfo::builder())?;

            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
            device.cmd_set_viewport(cmd, 0, &[pipeline::viewport(extent)]);
            device.cmd_set_scissor(cmd, 0, &[pipeline::scissor(extent)]);
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
            device.cmd_bind_index_buffer(cmd, self.index_buffer.buffer, 0, vk::IndexType::UINT16);
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[self.descriptors.sets[self.current_frame]],
                &[],
            );
            device.cmd_draw_indexed(cmd, QUAD_INDICES.len() as u32, 1, 0, 0, 0);
            device.cmd_end_render_pass(cmd);

            device.end_command_buffer(cmd)?;
        }

        Ok(())
    }
}

fn build_pipeline(
    device: &VulkanDevice,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    settings: &RenderSettings,
) -> Result<vk::Pipeline> {
    let vert = shader::load_shader_module(device, &settings.vertex_shader)?;
    let frag = match shader::load_shader_module(device, &settings.fragment_shader) {
        Ok(frag) => frag,
        Err(e) => {
            unsafe { device.device.destroy_shader_module(vert, None) };
            return Err(e);
        }
    };

    let pipeline = pipeline::create_graphics_pipeline(device, render_pass, layout, vert, frag);

    // Modules are only needed while the pipeline is created
    unsafe {
        device.device.destroy_shader_module(vert, None);
        device.device.destroy_shader_module(frag, None);
    }

    pipeline
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        let _ = self.device.wait_idle();

        unsafe {
            for sync in &self.frame_sync {
                sync.destroy(&self.device.device);
            }
            for &framebuffer in &self.framebuffers {
                self.device.device.destroy_framebuffer(framebuffer, None);
            }
            self.device.device.destroy_pipeline(self.pipeline, None);
            self.device
                .device
                .destroy_pipeline_layout(self.pipeline_layout, None);
            self.device.device.destroy_render_pass(self.render_pass, None);
        }

        // Buffers, images, descriptors, swapchain and the command pool drop with their fields
        log::info!("Cleanup complete");
    }
}
