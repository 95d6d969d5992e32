//! Secondary texture ownership
//!
//! [`TextureHandle`] pairs every allocation with exactly one release: it is
//! not `Clone`, and [`TextureHandle::release`] consumes it.
//! [`SecondaryTexture`] owns at most one handle and is the only code path
//! that writes secondary texture contents.

use crate::backend::{GraphicsBackend, TextureId};
use crate::source::{OverlayImage, PixelSource};

/// Owned backend texture
#[derive(Debug)]
pub struct TextureHandle {
    id: TextureId,
    released: bool,
}

impl TextureHandle {
    pub fn allocate(backend: &mut dyn GraphicsBackend) -> Self {
        let id = backend.create_texture();
        log::debug!("Allocated texture {:?}", id);
        Self { id, released: false }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    /// Delete the backend texture
    pub fn release(mut self, backend: &mut dyn GraphicsBackend) {
        backend.delete_texture(self.id);
        self.released = true;
        log::debug!("Released texture {:?}", self.id);
    }
}

impl Drop for TextureHandle {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("Texture {:?} dropped without release, GPU memory leaked", self.id);
        }
    }
}

/// Manager for the secondary input texture
#[derive(Debug)]
pub struct SecondaryTexture {
    handle: Option<TextureHandle>,
    unit: u32,
}

impl SecondaryTexture {
    pub fn new(unit: u32) -> Self {
        Self { handle: None, unit }
    }

    /// Texture unit the secondary input is always bound to
    pub fn unit(&self) -> u32 {
        self.unit
    }

    pub fn id(&self) -> Option<TextureId> {
        self.handle.as_ref().map(TextureHandle::id)
    }

    pub fn is_allocated(&self) -> bool {
        self.handle.is_some()
    }

    /// Allocate the texture if it doesn't exist yet
    pub fn ensure_allocated(&mut self, backend: &mut dyn GraphicsBackend) -> TextureId {
        self.handle
            .get_or_insert_with(|| TextureHandle::allocate(backend))
            .id()
    }

    /// Re-upload the texture from `source`.
    ///
    /// Returns false without touching the GPU when the source isn't ready.
    pub fn refresh(&mut self, backend: &mut dyn GraphicsBackend, source: &dyn PixelSource) -> bool {
        let (width, height) = source.image_size();
        if width == 0 || height == 0 {
            log::trace!("Pixel source not ready ({}x{})", width, height);
            return false;
        }
        let Some(pixels) = source.pixel_buffer() else {
            log::trace!("Pixel source has no buffer");
            return false;
        };

        let texels = width as usize * height as usize;
        if pixels.len() < texels {
            log::warn!(
                "Pixel buffer holds {} texels, {}x{} needs {}; skipping refresh",
                pixels.len(),
                width,
                height,
                texels
            );
            return false;
        }

        let id = self.ensure_allocated(backend);
        backend.upload_texture(self.unit, id, width, height, bytemuck::cast_slice(&pixels[..texels]));
        log::debug!("Refreshed secondary texture {:?} from {}x{} source", id, width, height);
        true
    }

    /// Upload a still image into the managed texture
    pub fn upload_image(&mut self, backend: &mut dyn GraphicsBackend, image: &OverlayImage) -> bool {
        let (width, height) = image.size();
        if width == 0 || height == 0 {
            return false;
        }
        let Some(pixels) = image.pixels() else {
            log::debug!("Overlay image was disposed, skipping upload");
            return false;
        };

        let id = self.ensure_allocated(backend);
        backend.upload_texture(self.unit, id, width, height, bytemuck::cast_slice(&pixels[..]));
        log::debug!("Uploaded {}x{} overlay into texture {:?}", width, height, id);
        true
    }

    /// Delete the texture if allocated. Safe to call repeatedly.
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(handle) = self.handle.take() {
            handle.release(backend);
        }
    }
}
