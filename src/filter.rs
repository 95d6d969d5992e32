//! Two-input filter: per-frame orchestration of the secondary input
//!
//! [`TwoInputFilter`] runs once before every draw call of the shared
//! pipeline. It binds the secondary texture to its fixed unit, advances the
//! zoom animation, refreshes the texture from the live pixel source when the
//! animation wraps, and uploads the scaled texture coordinates.
//!
//! Other threads never touch GPU state. They go through a [`FilterControl`],
//! which only records the requested overlay image and rotation; the render
//! thread swaps that state in at the start of the next frame. Repeated
//! requests before a frame is drawn are resolved last-write-wins.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{AttributeLocation, GraphicsBackend, ProgramId, TextureId, UniformLocation};
use crate::config::CompositorConfig;
use crate::coords::{self, RotationConfig, TexCoords};
use crate::error::FilterError;
use crate::scale::ScaleController;
use crate::source::{OverlayImage, PixelSource};
use crate::texture::SecondaryTexture;

/// Lifecycle of a filter instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    Uninitialized,
    /// Shader locations resolved, no frame drawn yet
    Ready,
    Active,
    /// Terminal
    Destroyed,
}

/// Drawing hook capabilities shared by compositor variants
pub trait DrawHook {
    /// Resolve shader locations for `program`. Called once, on the render thread.
    fn on_init(&mut self, backend: &mut dyn GraphicsBackend, program: ProgramId) -> Result<(), FilterError>;

    /// Upload per-frame state immediately before the draw call.
    /// `primary` is the texture currently feeding the primary input.
    fn prepare_frame(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        primary: Option<TextureId>,
    ) -> Result<FrameReport, FilterError>;

    /// Release GPU resources. Idempotent.
    fn on_destroy(&mut self, backend: &mut dyn GraphicsBackend);
}

/// What happened during one `prepare_frame`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub scale: f32,
    /// The secondary texture was re-uploaded from the pixel source
    pub refreshed: bool,
    /// A newly assigned overlay image was uploaded
    pub image_uploaded: bool,
}

/// Cumulative counters since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u64,
    pub refreshes: u64,
    pub image_uploads: u64,
}

#[derive(Debug)]
struct ControlState {
    image: Option<OverlayImage>,
    image_dirty: bool,
    rotation: RotationConfig,
    rotation_dirty: bool,
}

/// Thread-safe handle for changing overlay and rotation from any thread.
///
/// Requests are recorded only; GPU work happens on the render thread during
/// the next [`DrawHook::prepare_frame`].
#[derive(Debug, Clone)]
pub struct FilterControl {
    state: Arc<Mutex<ControlState>>,
}

impl FilterControl {
    fn new(rotation: RotationConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(ControlState {
                image: None,
                image_dirty: false,
                rotation,
                rotation_dirty: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Assign (or clear with `None`) the overlay image.
    ///
    /// An already disposed image is refused and the current assignment is kept.
    pub fn set_image(&self, image: Option<OverlayImage>) {
        if let Some(image) = &image {
            if image.is_disposed() {
                log::debug!("Refusing disposed overlay image");
                return;
            }
        }
        let mut state = self.lock();
        state.image = image;
        state.image_dirty = true;
    }

    /// Most recently assigned overlay image.
    ///
    /// A pending image disposed before the render thread applied it is
    /// replaced by the overlay actually in use once the next frame runs.
    pub fn image(&self) -> Option<OverlayImage> {
        self.lock().image.clone()
    }

    /// Dispose the assigned overlay image and clear the assignment
    pub fn dispose_image(&self) {
        let mut state = self.lock();
        if let Some(image) = state.image.take() {
            image.dispose();
            state.image_dirty = true;
        }
    }

    pub fn set_rotation(&self, rotation: RotationConfig) {
        let mut state = self.lock();
        state.rotation = rotation;
        state.rotation_dirty = true;
    }

    /// Most recently requested rotation
    pub fn rotation(&self) -> RotationConfig {
        self.lock().rotation
    }

    /// Point the assignment back at `applied` if `rejected` is still the
    /// latest request
    fn restore_image(&self, rejected: &OverlayImage, applied: Option<OverlayImage>) {
        let mut state = self.lock();
        let still_latest = state.image.as_ref().is_some_and(|image| image.same_image(rejected));
        if still_latest && !state.image_dirty {
            state.image = applied;
        }
    }

    /// Take whatever changed since the last call
    fn take_pending(&self) -> (Option<Option<OverlayImage>>, Option<RotationConfig>) {
        let mut state = self.lock();
        let image = if std::mem::take(&mut state.image_dirty) {
            Some(state.image.clone())
        } else {
            None
        };
        let rotation = if std::mem::take(&mut state.rotation_dirty) {
            Some(state.rotation)
        } else {
            None
        };
        (image, rotation)
    }
}

/// Compositor that blends a primary frame with a secondary texture
#[derive(Debug)]
pub struct TwoInputFilter {
    config: CompositorConfig,
    state: FilterState,
    control: FilterControl,

    // Render-thread copies of the control state
    overlay: Option<OverlayImage>,
    rotation: RotationConfig,

    coord_attribute: Option<AttributeLocation>,
    texture_uniform: Option<UniformLocation>,

    secondary: SecondaryTexture,
    scale: ScaleController,
    pixel_source: Option<Arc<dyn PixelSource>>,
    coords: TexCoords,
    stats: FrameStats,
}

impl Default for TwoInputFilter {
    fn default() -> Self {
        Self::new(CompositorConfig::default())
    }
}

impl TwoInputFilter {
    pub fn new(config: CompositorConfig) -> Self {
        let rotation = config.rotation;
        Self {
            state: FilterState::Uninitialized,
            control: FilterControl::new(rotation),
            overlay: None,
            rotation,
            coord_attribute: None,
            texture_uniform: None,
            secondary: SecondaryTexture::new(config.texture_unit),
            scale: ScaleController::new(config.scale_step, config.scale_floor),
            pixel_source: None,
            coords: coords::map_config(rotation, 1.0),
            stats: FrameStats::default(),
            config,
        }
    }

    /// Handle for other threads
    pub fn control(&self) -> FilterControl {
        self.control.clone()
    }

    pub fn set_image(&self, image: Option<OverlayImage>) {
        self.control.set_image(image);
    }

    pub fn image(&self) -> Option<OverlayImage> {
        self.control.image()
    }

    pub fn dispose_image(&self) {
        self.control.dispose_image();
    }

    pub fn set_rotation(&self, rotation: RotationConfig) {
        self.control.set_rotation(rotation);
    }

    /// Source used when the zoom cycle triggers a refresh
    pub fn set_pixel_source(&mut self, source: Option<Arc<dyn PixelSource>>) {
        self.pixel_source = source;
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Rotation currently applied by the render thread
    pub fn applied_rotation(&self) -> RotationConfig {
        self.rotation
    }

    pub fn scale(&self) -> f32 {
        self.scale.current()
    }

    /// Coordinates uploaded with the last frame
    pub fn coords(&self) -> TexCoords {
        self.coords
    }

    pub fn secondary_texture(&self) -> Option<TextureId> {
        self.secondary.id()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// True when a shader location is missing and the secondary input can't show
    pub fn is_degraded(&self) -> bool {
        self.coord_attribute.is_none() || self.texture_uniform.is_none()
    }

    /// Swap in pending control state. Returns true if an overlay was uploaded.
    fn apply_pending(&mut self, backend: &mut dyn GraphicsBackend) -> bool {
        let (image, rotation) = self.control.take_pending();

        if let Some(rotation) = rotation {
            log::debug!("Applying rotation {:?}", rotation);
            self.rotation = rotation;
        }

        match image {
            None => false,
            Some(None) => {
                self.overlay = None;
                false
            }
            Some(Some(image)) => {
                // Disposed between assignment and this frame: keep what we had
                if image.is_disposed() {
                    log::debug!("Pending overlay disposed before upload, ignoring");
                    self.control.restore_image(&image, self.overlay.clone());
                    return false;
                }
                let uploaded = self.secondary.upload_image(backend, &image);
                self.overlay = Some(image);
                uploaded
            }
        }
    }

    fn refresh_from_source(&mut self, backend: &mut dyn GraphicsBackend, primary: Option<TextureId>) -> bool {
        let overlay_active = self.overlay.as_ref().is_some_and(|image| !image.is_disposed());
        if !overlay_active || primary.is_none() {
            return false;
        }
        let Some(source) = self.pixel_source.as_deref() else {
            return false;
        };
        self.secondary.refresh(backend, source)
    }
}

impl DrawHook for TwoInputFilter {
    fn on_init(&mut self, backend: &mut dyn GraphicsBackend, program: ProgramId) -> Result<(), FilterError> {
        match self.state {
            FilterState::Uninitialized => {}
            FilterState::Destroyed => return Err(FilterError::Destroyed),
            FilterState::Ready | FilterState::Active => return Err(FilterError::AlreadyInitialized),
        }

        self.coord_attribute = backend.attribute_location(program, &self.config.coord_attribute);
        self.texture_uniform = backend.uniform_location(program, &self.config.texture_uniform);

        match self.coord_attribute {
            Some(location) => backend.enable_vertex_attribute(location),
            None => log::error!(
                "Attribute '{}' not found in program {:?}; secondary input disabled",
                self.config.coord_attribute,
                program
            ),
        }
        if self.texture_uniform.is_none() {
            log::error!(
                "Uniform '{}' not found in program {:?}; secondary input disabled",
                self.config.texture_uniform,
                program
            );
        }

        self.state = FilterState::Ready;
        if self.apply_pending(backend) {
            self.stats.image_uploads += 1;
        }
        log::info!("Two-input filter ready (program {:?})", program);
        Ok(())
    }

    fn prepare_frame(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        primary: Option<TextureId>,
    ) -> Result<FrameReport, FilterError> {
        match self.state {
            FilterState::Uninitialized => return Err(FilterError::NotInitialized),
            FilterState::Destroyed => return Err(FilterError::Destroyed),
            FilterState::Ready | FilterState::Active => {}
        }
        self.state = FilterState::Active;

        let image_uploaded = self.apply_pending(backend);

        // Without both locations the secondary input must not be visible:
        // keep the unit empty so the sampler sees nothing
        let degraded = self.is_degraded();
        let unit = self.secondary.unit();
        if let Some(location) = self.coord_attribute {
            backend.enable_vertex_attribute(location);
        }
        if degraded {
            backend.bind_texture(unit, None);
        } else {
            backend.bind_texture(unit, self.secondary.id());
            if let Some(location) = self.texture_uniform {
                backend.set_uniform_i32(location, unit as i32);
            }
        }

        let tick = self.scale.tick();
        let refreshed = tick.refresh && self.refresh_from_source(backend, primary);
        if degraded && refreshed {
            // Uploading leaves the texture bound
            backend.bind_texture(unit, None);
        }

        self.coords = coords::map_config(self.rotation, tick.scale);
        if let Some(location) = self.coord_attribute {
            backend.set_vertex_attribute(location, 2, self.coords.as_slice());
        }

        self.stats.frames += 1;
        if refreshed {
            self.stats.refreshes += 1;
        }
        if image_uploaded {
            self.stats.image_uploads += 1;
        }

        Ok(FrameReport {
            scale: tick.scale,
            refreshed,
            image_uploaded,
        })
    }

    fn on_destroy(&mut self, backend: &mut dyn GraphicsBackend) {
        if self.state == FilterState::Destroyed {
            return;
        }
        self.secondary.release(backend);
        self.state = FilterState::Destroyed;
        log::info!(
            "Two-input filter destroyed after {} frames ({} refreshes)",
            self.stats.frames,
            self.stats.refreshes
        );
    }
}
