//! Interactive preview of the compositor with a synthetic camera feed

pub mod camera;
pub mod gpu_viewer;

pub use camera::{SyntheticCamera, checkerboard};
pub use gpu_viewer::{ViewerConfig, run_gpu_viewer};
