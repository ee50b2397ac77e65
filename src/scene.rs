//! Scene state owned by the frame driver.
//!
//! Everything the render loop reads or writes lives in [`SceneState`] so the
//! driver can be exercised without a window or GPU.

use std::sync::Arc;

use crate::utils::camera::{Camera, PointerOffset};
use crate::utils::mesh::{build_icosahedron, MeshGeometry, MeshSizing};

/// Per-frame inputs of the wireframe shader
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderUniformSet {
    pub elapsed_time: f32,
    pub frequency: f32,
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Default for ShaderUniformSet {
    fn default() -> Self {
        Self {
            elapsed_time: 0.0,
            frequency: 0.0,
            red: 0.3,
            green: 0.1,
            blue: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomParams {
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
}

impl Default for BloomParams {
    fn default() -> Self {
        Self {
            threshold: 0.15,
            strength: 0.35,
            radius: 1.0,
        }
    }
}

/// The active mesh plus a generation counter so the renderer knows when
/// to re-upload.
#[derive(Debug, Clone)]
pub struct MeshHandle {
    pub generation: u64,
    pub geometry: Arc<MeshGeometry>,
}

#[derive(Debug)]
pub struct SceneState {
    pub uniforms: ShaderUniformSet,
    pub bloom: BloomParams,
    pub camera: Camera,
    pub pointer: PointerOffset,
    viewport: (f32, f32),
    mesh: MeshHandle,
}

impl SceneState {
    /// Scene sized for the initial viewport
    pub fn new(width: f32, height: f32) -> Self {
        let mut camera = Camera::default();
        camera.set_viewport(width, height);
        camera.look_at_origin();

        let geometry = build_icosahedron(MeshSizing::from_viewport(width, height));
        Self {
            uniforms: ShaderUniformSet::default(),
            bloom: BloomParams::default(),
            camera,
            pointer: PointerOffset::default(),
            viewport: (width, height),
            mesh: MeshHandle {
                generation: 0,
                geometry: Arc::new(geometry),
            },
        }
    }

    pub fn mesh(&self) -> &MeshHandle {
        &self.mesh
    }

    /// Handle a resize event: the mesh is rebuilt and replaces the previous
    /// one. Returns false when the size did not change.
    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        if self.viewport == (width, height) {
            return false;
        }

        self.viewport = (width, height);
        self.camera.set_viewport(width, height);

        let sizing = MeshSizing::from_viewport(width, height);
        log::debug!(
            "Viewport {}x{} -> mesh radius {:.2}, detail {}",
            width,
            height,
            sizing.radius,
            sizing.detail
        );
        self.mesh = MeshHandle {
            generation: self.mesh.generation + 1,
            geometry: Arc::new(build_icosahedron(sizing)),
        };
        true
    }

    /// Pointer position in viewport coordinates (origin top-left)
    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        let (width, height) = self.viewport;
        self.pointer = PointerOffset::from_screen(x, y, width, height);
    }
}
