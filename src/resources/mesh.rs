//! Mesh assembly from parsed OBJ data.
//!
//! Kept in two stages: [`build_meshes`] produces CPU-side vertex/index data
//! from `tobj` models, and [`ParsedMesh::upload`] turns that into GPU
//! buffers. The split lets the parsing path run in tests without a device.

use wgpu::util::DeviceExt;

use crate::data_structures::model::{self, ModelVertex};

/// CPU-side mesh data, ready for upload.
#[derive(Clone, Debug)]
pub struct ParsedMesh {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material_id: usize,
}

/// Assemble vertices from the interleaved `tobj` position/texcoord/normal
/// arrays. Texture V coordinates are flipped for the wgpu convention, and
/// missing texcoords or normals default to zero.
pub fn build_meshes(models: &[tobj::Model], file_name: &str) -> Vec<ParsedMesh> {
    models
        .iter()
        .map(|m| {
            let vertices = (0..m.mesh.positions.len() / 3)
                .map(|i| ModelVertex {
                    position: [
                        m.mesh.positions[i * 3],
                        m.mesh.positions[i * 3 + 1],
                        m.mesh.positions[i * 3 + 2],
                    ],
                    tex_coords: [
                        m.mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                        1.0 - m.mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                    ],
                    normal: [
                        m.mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                        m.mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                        m.mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
                    ],
                })
                .collect::<Vec<_>>();

            let name = if m.name.is_empty() {
                file_name.to_string()
            } else {
                m.name.clone()
            };

            ParsedMesh {
                name,
                vertices,
                // The indices cover positions, texels and normals at once
                // because the loader runs with `single_index` set.
                indices: m.mesh.indices.clone(),
                material_id: m.mesh.material_id.unwrap_or(0),
            }
        })
        .collect()
}

impl ParsedMesh {
    pub fn upload(&self, device: &wgpu::Device) -> model::Mesh {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", self.name)),
            contents: bytemuck::cast_slice(&self.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", self.name)),
            contents: bytemuck::cast_slice(&self.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        model::Mesh {
            name: self.name.clone(),
            vertex_buffer,
            index_buffer,
            num_elements: self.indices.len() as u32,
            material: self.material_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_model() -> tobj::Model {
        tobj::Model {
            mesh: tobj::Mesh {
                positions: vec![
                    0.0, 0.0, 0.0, //
                    1.0, 0.0, 0.0, //
                    1.0, 1.0, 0.0, //
                    0.0, 1.0, 0.0,
                ],
                texcoords: vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
                normals: vec![
                    0.0, 0.0, 1.0, //
                    0.0, 0.0, 1.0, //
                    0.0, 0.0, 1.0, //
                    0.0, 0.0, 1.0,
                ],
                indices: vec![0, 1, 2, 0, 2, 3],
                material_id: Some(1),
                ..Default::default()
            },
            name: "quad".to_string(),
        }
    }

    #[test]
    fn vertices_are_assembled_with_flipped_v() {
        let meshes = build_meshes(&[quad_model()], "quad.obj");
        assert_eq!(meshes.len(), 1);

        let mesh = &meshes[0];
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.material_id, 1);
        // V is flipped: tobj 0.0 becomes 1.0.
        assert_eq!(mesh.vertices[0].tex_coords, [0.0, 1.0]);
        assert_eq!(mesh.vertices[2].tex_coords, [1.0, 0.0]);
        assert_eq!(mesh.vertices[1].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn missing_attributes_default_to_zero() {
        let mut model = quad_model();
        model.mesh.texcoords.clear();
        model.mesh.normals.clear();
        model.mesh.material_id = None;

        let meshes = build_meshes(&[model], "quad.obj");
        let mesh = &meshes[0];
        assert_eq!(mesh.vertices[3].tex_coords, [0.0, 1.0]);
        assert_eq!(mesh.vertices[3].normal, [0.0, 0.0, 0.0]);
        assert_eq!(mesh.material_id, 0);
    }
}
