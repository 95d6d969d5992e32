//! Pixel sources and caller-owned overlay images

use std::sync::{Arc, Mutex, MutexGuard};

/// Packed pixels, one RGBA8 texel per `u32` in memory order
pub type PixelBuffer = Arc<[u32]>;

/// Provider of the current frame used to refresh the secondary texture.
///
/// Zero dimensions or a missing buffer mean "not ready yet"; the compositor
/// polls again on the next refresh.
pub trait PixelSource: Send + Sync + std::fmt::Debug {
    fn image_size(&self) -> (u32, u32);
    fn pixel_buffer(&self) -> Option<PixelBuffer>;
}

#[derive(Debug, Default)]
struct FrameSlot {
    size: (u32, u32),
    pixels: Option<PixelBuffer>,
}

/// Latest-frame mailbox shared between a producer (camera, decoder)
/// and the render thread.
#[derive(Debug, Clone, Default)]
pub struct SharedFrame {
    slot: Arc<Mutex<FrameSlot>>,
}

impl SharedFrame {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrameSlot> {
        // A panicked producer leaves a complete frame behind; keep using it
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish a new frame, replacing the previous one
    pub fn publish(&self, width: u32, height: u32, pixels: PixelBuffer) {
        let mut slot = self.lock();
        slot.size = (width, height);
        slot.pixels = Some(pixels);
    }

    /// Drop the current frame; the source reports "not ready" until the next publish
    pub fn clear(&self) {
        let mut slot = self.lock();
        slot.size = (0, 0);
        slot.pixels = None;
    }
}

impl PixelSource for SharedFrame {
    fn image_size(&self) -> (u32, u32) {
        self.lock().size
    }

    fn pixel_buffer(&self) -> Option<PixelBuffer> {
        self.lock().pixels.clone()
    }
}

#[derive(Debug)]
struct ImageInner {
    width: u32,
    height: u32,
    pixels: Mutex<Option<PixelBuffer>>,
}

/// Still image assigned as the secondary input.
///
/// Clones share the same pixels and the same disposal state. The caller owns
/// disposal: the compositor never disposes an image on its own, it only
/// refuses to use one that has been disposed.
#[derive(Debug, Clone)]
pub struct OverlayImage {
    inner: Arc<ImageInner>,
}

impl OverlayImage {
    /// Wrap packed RGBA8 pixels. Returns `None` if the buffer doesn't hold
    /// exactly `width * height` texels.
    pub fn from_pixels(width: u32, height: u32, pixels: impl Into<PixelBuffer>) -> Option<Self> {
        let pixels = pixels.into();
        if pixels.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            inner: Arc::new(ImageInner {
                width,
                height,
                pixels: Mutex::new(Some(pixels)),
            }),
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.inner.width, self.inner.height)
    }

    /// Pixels, or `None` once disposed
    pub fn pixels(&self) -> Option<PixelBuffer> {
        self.inner
            .pixels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner
            .pixels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }

    /// Release the pixel memory. Every clone observes the disposal.
    pub fn dispose(&self) {
        self.inner
            .pixels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }

    /// Whether two handles refer to the same image
    pub fn same_image(&self, other: &OverlayImage) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
