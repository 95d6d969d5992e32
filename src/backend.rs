//! Graphics backend abstraction
//!
//! The compositor never talks to a graphics API directly. Every GPU call it
//! issues goes through [`GraphicsBackend`], which the wgpu pipeline in
//! [`crate::gpu`] implements for real rendering and the test suite implements
//! with a recording fake.
//!
//! All methods must be called from the render thread.

/// Identifies a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Backend texture name. Never zero for a live texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Resolved vertex attribute slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeLocation(pub u32);

/// Resolved uniform slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

pub trait GraphicsBackend {
    /// Look up a named vertex attribute, `None` if the program doesn't declare it
    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeLocation>;

    /// Look up a named uniform, `None` if the program doesn't declare it
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    fn enable_vertex_attribute(&mut self, location: AttributeLocation);

    /// Supply per-vertex data for the next draw only
    fn set_vertex_attribute(&mut self, location: AttributeLocation, components: u32, data: &[f32]);

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32);

    /// Allocate a new, empty 2D texture
    fn create_texture(&mut self) -> TextureId;

    /// Replace the texture contents with tightly packed RGBA8 rows.
    /// `unit` is the slot the texture is bound to while uploading.
    fn upload_texture(&mut self, unit: u32, texture: TextureId, width: u32, height: u32, rgba: &[u8]);

    /// Bind a texture (or nothing) to a texture unit
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    fn delete_texture(&mut self, texture: TextureId);
}
