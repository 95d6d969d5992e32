//! wgpu rendering backend
//!
//! Provides the window-bound GPU context and the two-input render pipeline
//! that implements [`crate::GraphicsBackend`].

pub mod context;
pub mod pipelines;

pub use context::GpuContext;
pub use pipelines::{CompositeBackend, CompositePipeline, COMPOSITE_PROGRAM};
