//! Sawtooth scale animation driving the secondary texture refresh cycle

/// Amount subtracted from the scale every frame
pub const DEFAULT_SCALE_STEP: f32 = 0.04;
/// Lowest scale a consumer may observe
pub const DEFAULT_SCALE_FLOOR: f32 = 0.1;

/// Result of advancing the controller by one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleTick {
    pub scale: f32,
    /// True on the frame the scale wrapped back to 1.0
    pub refresh: bool,
}

/// Per-frame zoom state. Must be ticked exactly once per rendered frame.
#[derive(Debug, Clone)]
pub struct ScaleController {
    scale: f32,
    step: f32,
    floor: f32,
}

impl Default for ScaleController {
    fn default() -> Self {
        Self::new(DEFAULT_SCALE_STEP, DEFAULT_SCALE_FLOOR)
    }
}

impl ScaleController {
    pub fn new(step: f32, floor: f32) -> Self {
        let valid = step > 0.0 && floor > 0.0 && floor < 1.0 && step.is_finite();
        let (step, floor) = if valid {
            (step, floor)
        } else {
            log::warn!(
                "Invalid scale animation (step {}, floor {}), using {} / {}",
                step,
                floor,
                DEFAULT_SCALE_STEP,
                DEFAULT_SCALE_FLOOR
            );
            (DEFAULT_SCALE_STEP, DEFAULT_SCALE_FLOOR)
        };

        Self {
            scale: 1.0,
            step,
            floor,
        }
    }

    /// Advance one frame
    pub fn tick(&mut self) -> ScaleTick {
        self.scale -= self.step;
        if self.scale < self.floor {
            self.scale = 1.0;
            return ScaleTick {
                scale: self.scale,
                refresh: true,
            };
        }
        ScaleTick {
            scale: self.scale,
            refresh: false,
        }
    }

    pub fn current(&self) -> f32 {
        self.scale
    }

    pub fn reset(&mut self) {
        self.scale = 1.0;
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }
}
