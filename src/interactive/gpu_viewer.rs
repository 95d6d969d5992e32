//! Interactive compositor preview using wgpu + winit

use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use super::camera::{SyntheticCamera, checkerboard};
use crate::backend::{GraphicsBackend, TextureId, UniformLocation};
use crate::config::CompositorConfig;
use crate::coords::{Rotation, RotationConfig};
use crate::error::GpuError;
use crate::filter::{DrawHook, FilterControl, TwoInputFilter};
use crate::gpu::{COMPOSITE_PROGRAM, CompositePipeline, GpuContext};
use crate::source::{PixelSource, SharedFrame};

const PRIMARY_UNIT: u32 = 0;
const PRIMARY_UNIFORM: &str = "inputImageTexture";

const OVERLAY_COLORS: [(u8, u8, u8); 4] = [(255, 64, 64), (64, 255, 128), (64, 128, 255), (255, 220, 64)];

/// Configuration for the preview window
#[derive(Clone)]
pub struct ViewerConfig {
    /// Synthetic camera resolution
    pub frame_size: (u32, u32),
    /// Checkerboard cell size of the generated overlay
    pub overlay_cell: u32,
    pub compositor: CompositorConfig,
    pub title: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            frame_size: (640, 480),
            overlay_cell: 32,
            compositor: CompositorConfig::default(),
            title: "Two-Input Compositor (ESC to exit)".to_string(),
        }
    }
}

fn next_rotation(rotation: Rotation) -> Rotation {
    match rotation {
        Rotation::Normal => Rotation::Rotation90,
        Rotation::Rotation90 => Rotation::Rotation180,
        Rotation::Rotation180 => Rotation::Rotation270,
        Rotation::Rotation270 => Rotation::Normal,
    }
}

/// Limit a requested frame size to what the device can hold in one texture
pub(crate) fn clamp_frame_size((width, height): (u32, u32), max_dimension: u32) -> (u32, u32) {
    let max_dimension = max_dimension.max(1);
    (width.clamp(1, max_dimension), height.clamp(1, max_dimension))
}

struct ViewerState {
    config: ViewerConfig,
    gpu_ctx: GpuContext,
    pipeline: CompositePipeline,
    filter: TwoInputFilter,
    control: FilterControl,

    camera: SyntheticCamera,
    frame: SharedFrame,
    primary: TextureId,
    primary_uniform: Option<UniformLocation>,

    camera_paused: bool,
    overlay_color: usize,
}

impl ViewerState {
    fn new(window: Arc<Window>, mut config: ViewerConfig) -> Result<Self, GpuError> {
        let gpu_ctx = GpuContext::new(window)?;

        let max_dimension = gpu_ctx.device.limits().max_texture_dimension_2d;
        let frame_size = clamp_frame_size(config.frame_size, max_dimension);
        if frame_size != config.frame_size {
            log::warn!(
                "Frame size {:?} exceeds device limit {}, using {:?}",
                config.frame_size,
                max_dimension,
                frame_size
            );
            config.frame_size = frame_size;
        }

        let mut pipeline = CompositePipeline::new(&gpu_ctx);
        let mut filter = TwoInputFilter::new(config.compositor.clone());
        let control = filter.control();

        let (width, height) = config.frame_size;
        let camera = SyntheticCamera::new(width, height);
        let frame = SharedFrame::new();
        let source: Arc<dyn PixelSource> = Arc::new(frame.clone());
        filter.set_pixel_source(Some(source));

        // Overlay assigned before init is uploaded during on_init
        control.set_image(checkerboard(width, height, config.overlay_cell, OVERLAY_COLORS[0], 200));

        let mut backend = pipeline.backend(&gpu_ctx);
        let primary = backend.create_texture();
        let primary_uniform = backend.uniform_location(COMPOSITE_PROGRAM, PRIMARY_UNIFORM);
        if let Err(e) = filter.on_init(&mut backend, COMPOSITE_PROGRAM) {
            log::error!("Filter init failed: {}", e);
        }

        Ok(Self {
            config,
            gpu_ctx,
            pipeline,
            filter,
            control,
            camera,
            frame,
            primary,
            primary_uniform,
            camera_paused: false,
            overlay_color: 0,
        })
    }

    fn cycle_overlay(&mut self) {
        self.overlay_color = (self.overlay_color + 1) % OVERLAY_COLORS.len();
        let (width, height) = self.config.frame_size;
        let image = checkerboard(width, height, self.config.overlay_cell, OVERLAY_COLORS[self.overlay_color], 200);
        self.control.set_image(image);
    }

    fn update_and_render(&mut self) {
        let (width, height) = self.camera.size();
        let pixels = if self.camera_paused {
            None
        } else {
            let pixels = self.camera.next_frame();
            self.frame.publish(width, height, pixels.clone());
            Some(pixels)
        };

        {
            let mut backend = self.pipeline.backend(&self.gpu_ctx);
            if let Some(pixels) = &pixels {
                backend.upload_texture(PRIMARY_UNIT, self.primary, width, height, bytemuck::cast_slice(&pixels[..]));
            }
            backend.bind_texture(PRIMARY_UNIT, Some(self.primary));
            if let Some(location) = self.primary_uniform {
                backend.set_uniform_i32(location, PRIMARY_UNIT as i32);
            }

            match self.filter.prepare_frame(&mut backend, Some(self.primary)) {
                Ok(report) if report.refreshed => {
                    log::debug!("Secondary texture refreshed (frame {})", self.filter.stats().frames);
                }
                Ok(_) => {}
                Err(e) => log::error!("Frame preparation failed: {}", e),
            }
        }

        match self.pipeline.render(&self.gpu_ctx) {
            Ok(()) => {}
            Err(GpuError::Frame(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.gpu_ctx.reconfigure();
            }
            Err(e) => log::error!("Render error: {}", e),
        }
    }

    fn shutdown(&mut self) {
        let mut backend = self.pipeline.backend(&self.gpu_ctx);
        self.filter.on_destroy(&mut backend);
        backend.delete_texture(self.primary);
        self.control.dispose_image();
    }
}

/// Application handler for winit event loop
struct ViewerApp {
    config: ViewerConfig,
    state: Option<ViewerState>,
}

impl ViewerApp {
    fn new(config: ViewerConfig) -> Self {
        Self { config, state: None }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let (width, height) = self.config.frame_size;
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(width as f64, height as f64));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match ViewerState::new(window, self.config.clone()) {
            Ok(state) => {
                println!("=== Two-Input Compositor Preview ===");
                println!("Controls:");
                println!("  R   - Cycle overlay rotation");
                println!("  H/V - Toggle horizontal/vertical flip");
                println!("  O   - Assign a new overlay image");
                println!("  D   - Dispose the overlay image");
                println!("  P   - Pause/resume the camera feed");
                println!("  ESC - Exit");
                println!();

                self.state = Some(state);
            }
            Err(e) => {
                log::error!("Failed to create viewer state: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let state = match &mut self.state {
            Some(s) => s,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                state.gpu_ctx.resize((size.width, size.height));
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    physical_key: PhysicalKey::Code(key),
                    state: ElementState::Pressed,
                    ..
                },
                ..
            } => match key {
                KeyCode::Escape => event_loop.exit(),

                KeyCode::KeyR => {
                    let current = state.control.rotation();
                    let rotation = RotationConfig {
                        rotation: next_rotation(current.rotation),
                        ..current
                    };
                    state.control.set_rotation(rotation);
                    println!("Rotation: {}°", rotation.rotation.degrees());
                }
                KeyCode::KeyH => {
                    let current = state.control.rotation();
                    state.control.set_rotation(RotationConfig {
                        flip_horizontal: !current.flip_horizontal,
                        ..current
                    });
                    println!("Flip horizontal: {}", !current.flip_horizontal);
                }
                KeyCode::KeyV => {
                    let current = state.control.rotation();
                    state.control.set_rotation(RotationConfig {
                        flip_vertical: !current.flip_vertical,
                        ..current
                    });
                    println!("Flip vertical: {}", !current.flip_vertical);
                }

                KeyCode::KeyO => {
                    state.cycle_overlay();
                    println!("Overlay assigned");
                }
                KeyCode::KeyD => {
                    state.control.dispose_image();
                    println!("Overlay disposed");
                }

                KeyCode::KeyP => {
                    state.camera_paused = !state.camera_paused;
                    if state.camera_paused {
                        state.frame.clear();
                        println!("Camera paused");
                    } else {
                        println!("Camera resumed");
                    }
                }

                _ => {}
            },

            WindowEvent::RedrawRequested => {
                state.update_and_render();
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.gpu_ctx.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            let stats = state.filter.stats();
            state.shutdown();
            log::info!(
                "Viewer closed: {} frames, {} refreshes, {} overlay uploads",
                stats.frames,
                stats.refreshes,
                stats.image_uploads
            );
        }
    }
}

/// Run the preview window until it is closed
pub fn run_gpu_viewer(config: ViewerConfig) -> Result<(), GpuError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
