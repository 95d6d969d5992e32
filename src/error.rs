//! Error types

use thiserror::Error;

/// Compositor lifecycle misuse
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    /// A frame was prepared before `on_init`
    #[error("filter used before initialization")]
    NotInitialized,

    /// `on_init` was called on an already initialized filter
    #[error("filter already initialized")]
    AlreadyInitialized,

    /// The filter was used after `on_destroy`
    #[error("filter used after teardown")]
    Destroyed,
}

/// GPU setup and presentation failures
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface frame unavailable: {0}")]
    Frame(#[from] wgpu::SurfaceError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}
