//! Synthetic frame generators standing in for a camera and a still image

use rayon::prelude::*;

use crate::source::{OverlayImage, PixelBuffer};

#[inline]
fn pack_rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    u32::from_ne_bytes([r, g, b, a])
}

/// Animated test pattern: diagonal colour sweep with a moving bright bar
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    frame_index: u64,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            frame_index: 0,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Render the next frame
    pub fn next_frame(&mut self) -> PixelBuffer {
        let (width, height) = (self.width as usize, self.height as usize);
        let phase = (self.frame_index % 256) as usize;
        let bar_x = (self.frame_index as usize * 3) % width;
        self.frame_index += 1;

        let mut pixels = vec![0u32; width * height];
        pixels
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                let g = (y * 255 / height) as u8;
                for (x, texel) in row.iter_mut().enumerate() {
                    let r = ((x * 255 / width + phase) % 256) as u8;
                    let b = ((x + y + phase) % 256) as u8;
                    *texel = if x.abs_diff(bar_x) < 4 {
                        pack_rgba(255, 255, 255, 255)
                    } else {
                        pack_rgba(r, g, b, 255)
                    };
                }
            });

        pixels.into()
    }
}

/// Checkerboard overlay; `alpha` applies to the coloured cells only
pub fn checkerboard(width: u32, height: u32, cell: u32, color: (u8, u8, u8), alpha: u8) -> Option<OverlayImage> {
    let cell = cell.max(1) as usize;
    let (w, h) = (width as usize, height as usize);

    let pixels: Vec<u32> = (0..w * h)
        .into_par_iter()
        .map(|i| {
            let (x, y) = (i % w, i / w);
            if (x / cell + y / cell) % 2 == 0 {
                pack_rgba(color.0, color.1, color.2, alpha)
            } else {
                pack_rgba(0, 0, 0, 0)
            }
        })
        .collect();

    OverlayImage::from_pixels(width, height, pixels)
}
