//! Scene content: the ground plane, the loaded model and the load stages.
//!
//! Asset paths are fixed constants, matching the demo's single data set.

use anyhow::Result;

use crate::{
    data_structures::model::{Material, Model},
    resources::{self, mesh::ParsedMesh},
};

pub const CHECKER_TEXTURE: &str = "checker.png";
pub const WINDMILL_MTL: &str = "windmill/windmill_001.mtl";
pub const WINDMILL_OBJ: &str = "windmill/windmill_001.obj";

/// The MTL material used by the windmill blades. The blades are thin
/// one-sided geometry, so this one material gets a double-sided override
/// after the library is parsed. Specific to this asset, not a policy.
pub const BLADES_MATERIAL: &str = "Material";

pub const PLANE_SIZE: f32 = 40.0;

/// Progress of the model load sequence. Strictly forward; there is no
/// transition back and no cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStage {
    NotStarted,
    LoadingMaterials,
    LoadingGeometry,
    Ready,
}

impl LoadStage {
    pub fn next(self) -> Self {
        match self {
            Self::NotStarted => Self::LoadingMaterials,
            Self::LoadingMaterials => Self::LoadingGeometry,
            Self::LoadingGeometry => Self::Ready,
            Self::Ready => Self::Ready,
        }
    }
}

/// Everything that gets rendered. The windmill slot starts empty and is
/// filled once the background load finishes; rendering tolerates either
/// state, so partial scenes draw correctly while the load is pending.
#[derive(Debug)]
pub struct Scene {
    pub ground: Model,
    pub windmill: Option<Model>,
    pub stage: LoadStage,
}

impl Scene {
    /// Build the static scene content: the checker-textured ground plane.
    pub async fn load(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Self> {
        let checker = resources::texture::load_image(CHECKER_TEXTURE).await?;
        // Nearest-neighbour magnification keeps the checker's texel edges
        // hard when the 2x2 texture stretches over the whole plane.
        let texture = crate::data_structures::texture::Texture::from_image(
            device,
            queue,
            &checker,
            Some(CHECKER_TEXTURE),
            wgpu::FilterMode::Nearest,
        )?;

        let layout = resources::texture::diffuse_layout(device);
        let material = Material::new(device, "checker", texture, true, &layout);
        let mesh = ground_plane(PLANE_SIZE).upload(device);

        Ok(Self {
            ground: Model {
                meshes: vec![mesh],
                materials: vec![material],
            },
            windmill: None,
            stage: LoadStage::NotStarted,
        })
    }

    pub fn attach_windmill(&mut self, model: Model) {
        self.windmill = Some(model);
        self.stage = LoadStage::Ready;
    }

    /// The models to draw this frame, in draw order.
    pub fn models(&self) -> impl Iterator<Item = &Model> {
        std::iter::once(&self.ground).chain(self.windmill.as_ref())
    }
}

/// A `size` x `size` plane in the XZ plane at y = 0, facing up. The texture
/// repeats once per two world units (the checker image is 2x2 texels), so
/// the UVs run from 0 to size / 2 and rely on the sampler's repeat wrapping.
pub fn ground_plane(size: f32) -> ParsedMesh {
    use crate::data_structures::model::ModelVertex;

    let half = size / 2.0;
    let repeats = size / 2.0;
    let up = [0.0, 1.0, 0.0];

    let vertices = vec![
        ModelVertex {
            position: [-half, 0.0, -half],
            tex_coords: [0.0, 0.0],
            normal: up,
        },
        ModelVertex {
            position: [-half, 0.0, half],
            tex_coords: [0.0, repeats],
            normal: up,
        },
        ModelVertex {
            position: [half, 0.0, half],
            tex_coords: [repeats, repeats],
            normal: up,
        },
        ModelVertex {
            position: [half, 0.0, -half],
            tex_coords: [repeats, 0.0],
            normal: up,
        },
    ];

    ParsedMesh {
        name: "ground plane".to_string(),
        vertices,
        indices: vec![0, 1, 2, 0, 2, 3],
        material_id: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_plane_spans_and_repeats() {
        let plane = ground_plane(PLANE_SIZE);
        assert_eq!(plane.vertices.len(), 4);
        assert_eq!(plane.indices.len(), 6);

        for v in &plane.vertices {
            // Flat in XZ, facing up.
            assert_eq!(v.position[1], 0.0);
            assert_eq!(v.normal, [0.0, 1.0, 0.0]);
            assert!(v.position[0].abs() <= PLANE_SIZE / 2.0);
            assert!(v.position[2].abs() <= PLANE_SIZE / 2.0);
        }

        // One checker repeat per two world units.
        let max_u = plane
            .vertices
            .iter()
            .map(|v| v.tex_coords[0])
            .fold(0.0, f32::max);
        assert_eq!(max_u, PLANE_SIZE / 2.0);
    }

    #[test]
    fn load_stages_only_move_forward() {
        let mut stage = LoadStage::NotStarted;
        let expected = [
            LoadStage::LoadingMaterials,
            LoadStage::LoadingGeometry,
            LoadStage::Ready,
        ];
        for want in expected {
            stage = stage.next();
            assert_eq!(stage, want);
        }
        // Terminal state.
        assert_eq!(stage.next(), LoadStage::Ready);
    }
}
