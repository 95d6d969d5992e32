//! Compositor configuration

use crate::coords::{Rotation, RotationConfig};
use crate::scale::{DEFAULT_SCALE_FLOOR, DEFAULT_SCALE_STEP};

/// Attribute carrying the secondary texture coordinates
pub const SECONDARY_COORD_ATTRIBUTE: &str = "inputTextureCoordinate2";
/// Sampler uniform for the secondary texture
pub const SECONDARY_TEXTURE_UNIFORM: &str = "inputImageTexture2";
/// Unit the secondary texture is bound to, distinct from the primary's unit 0
pub const SECONDARY_TEXTURE_UNIT: u32 = 3;

/// Configuration for a [`crate::TwoInputFilter`]
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// Scale decrement per frame
    pub scale_step: f32,
    /// Scale below which the texture refreshes and the zoom restarts
    pub scale_floor: f32,
    pub texture_unit: u32,
    pub coord_attribute: String,
    pub texture_uniform: String,
    /// Rotation applied to the secondary quad before scaling
    pub rotation: RotationConfig,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            scale_step: DEFAULT_SCALE_STEP,
            scale_floor: DEFAULT_SCALE_FLOOR,
            texture_unit: SECONDARY_TEXTURE_UNIT,
            coord_attribute: SECONDARY_COORD_ATTRIBUTE.to_string(),
            texture_uniform: SECONDARY_TEXTURE_UNIFORM.to_string(),
            rotation: RotationConfig::new(Rotation::Rotation90, false, false),
        }
    }
}
