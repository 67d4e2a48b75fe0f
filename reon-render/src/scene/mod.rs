pub mod camera;
pub mod light;
pub mod renderer_registry;
