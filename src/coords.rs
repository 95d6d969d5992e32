//! Texture coordinate mapping for the secondary input
//!
//! Produces the 4-vertex UV quad (triangle-strip order: bottom-left,
//! bottom-right, top-left, top-right) for a rotation/flip combination and
//! shrinks it toward its centre by a scale factor.

/// Fixed rotation applied to the sampled image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Normal,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl Rotation {
    /// Parse a rotation from degrees. Only multiples of 90 in [0, 270] are valid.
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Normal),
            90 => Some(Rotation::Rotation90),
            180 => Some(Rotation::Rotation180),
            270 => Some(Rotation::Rotation270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Normal => 0,
            Rotation::Rotation90 => 90,
            Rotation::Rotation180 => 180,
            Rotation::Rotation270 => 270,
        }
    }
}

/// Rotation plus independent flip flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotationConfig {
    pub rotation: Rotation,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl RotationConfig {
    pub fn new(rotation: Rotation, flip_horizontal: bool, flip_vertical: bool) -> Self {
        Self {
            rotation,
            flip_horizontal,
            flip_vertical,
        }
    }
}

/// 8 floats = 4 vertices × (u, v)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexCoords(pub [f32; 8]);

impl TexCoords {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Raw bytes in native byte order, ready for a vertex buffer
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.0)
    }

    /// Centroid of the four vertices
    pub fn center(&self) -> (f32, f32) {
        let c = &self.0;
        (
            (c[0] + c[2] + c[4] + c[6]) / 4.0,
            (c[1] + c[3] + c[5] + c[7]) / 4.0,
        )
    }
}

const TEXTURE_NO_ROTATION: [f32; 8] = [0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];
const TEXTURE_ROTATED_90: [f32; 8] = [1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
const TEXTURE_ROTATED_180: [f32; 8] = [1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
const TEXTURE_ROTATED_270: [f32; 8] = [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0];

#[inline]
fn flip(value: f32) -> f32 {
    1.0 - value
}

/// Unscaled quad for a rotation/flip combination
pub fn rotation_coords(rotation: Rotation, flip_horizontal: bool, flip_vertical: bool) -> TexCoords {
    let mut coords = match rotation {
        Rotation::Normal => TEXTURE_NO_ROTATION,
        Rotation::Rotation90 => TEXTURE_ROTATED_90,
        Rotation::Rotation180 => TEXTURE_ROTATED_180,
        Rotation::Rotation270 => TEXTURE_ROTATED_270,
    };

    for vertex in coords.chunks_exact_mut(2) {
        if flip_horizontal {
            vertex[0] = flip(vertex[0]);
        }
        if flip_vertical {
            vertex[1] = flip(vertex[1]);
        }
    }

    TexCoords(coords)
}

/// Interpolate every vertex toward the quad centroid by `scale`.
///
/// `scale == 1.0` returns the input unchanged; smaller values shrink the
/// sampled region symmetrically, so the overlay appears zoomed in.
pub fn scale_about_center(coords: TexCoords, scale: f32) -> TexCoords {
    if scale == 1.0 {
        return coords;
    }

    let (cx, cy) = coords.center();
    let mut out = coords.0;
    for vertex in out.chunks_exact_mut(2) {
        vertex[0] = cx + (vertex[0] - cx) * scale;
        vertex[1] = cy + (vertex[1] - cy) * scale;
    }
    TexCoords(out)
}

/// Full mapping: base quad for rotation/flip, then scaled about its centre
pub fn map(rotation: Rotation, flip_horizontal: bool, flip_vertical: bool, scale: f32) -> TexCoords {
    scale_about_center(rotation_coords(rotation, flip_horizontal, flip_vertical), scale)
}

/// Convenience wrapper taking a [`RotationConfig`]
pub fn map_config(config: RotationConfig, scale: f32) -> TexCoords {
    map(config.rotation, config.flip_horizontal, config.flip_vertical, scale)
}
