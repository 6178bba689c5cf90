//! windmill-viewer
//!
//! A small cross-platform 3D scene viewer demo built on wgpu and winit. It
//! sets up a perspective camera with orbit controls, a checker-textured
//! ground plane, a hemisphere and a directional light, then loads an OBJ
//! model together with its MTL material library asynchronously while the
//! scene keeps rendering. Runs natively and in the browser (WASM).
//!
//! High-level modules
//! - `camera`: camera, projection and the orbit controller plus their uniforms
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: meshes, materials and GPU texture wrappers
//! - `pipelines`: render pipeline construction and the light uniforms
//! - `resources`: asset IO and the two-stage MTL-then-OBJ load sequence
//! - `scene`: scene content (ground plane, load stages, asset paths)
//! - `viewer`: the winit application and render loop
//!

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod pipelines;
pub mod resources;
pub mod scene;
pub mod viewer;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use winit::dpi::PhysicalSize;
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;
