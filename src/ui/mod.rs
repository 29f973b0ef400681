//! User interface rendering.

pub mod renderer;

pub use renderer::Renderer;
