pub mod context;
pub mod engine;
pub(crate) mod shaders;
