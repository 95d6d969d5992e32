//! Two-input texture compositor
//!
//! Blends a primary frame with a secondary texture that periodically
//! refreshes from a live pixel source while zooming in between refreshes.

pub mod backend;
pub mod config;
pub mod coords;
pub mod error;
pub mod filter;
pub mod gpu;
pub mod interactive;
pub mod scale;
pub mod source;
pub mod texture;

#[cfg(test)]
mod tests;

// Re-export public API
pub use backend::{AttributeLocation, GraphicsBackend, ProgramId, TextureId, UniformLocation};
pub use config::CompositorConfig;
pub use coords::{Rotation, RotationConfig, TexCoords, map, rotation_coords, scale_about_center};
pub use error::{FilterError, GpuError};
pub use filter::{DrawHook, FilterControl, FilterState, FrameReport, FrameStats, TwoInputFilter};
pub use scale::{ScaleController, ScaleTick};
pub use source::{OverlayImage, PixelBuffer, PixelSource, SharedFrame};
pub use texture::{SecondaryTexture, TextureHandle};
