//! Asset loading: the MTL material library and OBJ geometry.
//!
//! Loading is a strictly ordered two-stage sequence, expressed as an await
//! chain rather than nested callbacks:
//!
//! 1. [`load_material_library`] fetches and parses the MTL file and preloads
//!    every texture image it references.
//! 2. [`load_model_obj`] fetches and parses the OBJ file *against* that
//!    library; the borrow makes the ordering a compile-time fact.
//!
//! Between the two stages the caller may override material side modes (see
//! [`MaterialLibrary::set_double_sided`]). GPU upload is a separate final
//! step so both parse stages run without a graphics device.

use std::{
    collections::HashMap,
    io::{BufRead, BufReader, Cursor},
};

use anyhow::{Context as _, Result, ensure};

use crate::{
    data_structures::model,
    data_structures::texture::Texture,
    resources::{
        mesh::{ParsedMesh, build_meshes},
        texture::{load_image, load_string},
    },
};

pub mod mesh;
pub mod texture;

/// A parsed MTL file: raw materials, their name lookup, per-material side
/// overrides, and the preloaded texture images.
#[derive(Debug, Default)]
pub struct MaterialLibrary {
    dir: String,
    materials: Vec<tobj::Material>,
    index: HashMap<String, usize>,
    double_sided: Vec<bool>,
    images: Vec<Option<image::DynamicImage>>,
}

impl MaterialLibrary {
    /// Parse an MTL document. `dir` is the directory of the MTL file
    /// relative to the asset root; texture references resolve against it.
    pub fn from_reader(dir: impl Into<String>, reader: &mut impl BufRead) -> Result<Self> {
        let (materials, index) = tobj::load_mtl_buf(reader)?;
        let double_sided = vec![false; materials.len()];
        let images = Vec::new();
        Ok(Self {
            dir: dir.into(),
            materials,
            index,
            double_sided,
            images,
        })
    }

    /// Fetch and decode every texture the library references. A texture that
    /// fails to load is logged and skipped; its material falls back to a
    /// solid Kd colour on upload.
    pub async fn preload(&mut self) -> Result<()> {
        let mut images = Vec::with_capacity(self.materials.len());
        for m in &self.materials {
            let image = match &m.diffuse_texture {
                Some(file_name) => {
                    let path = self.resolve(file_name);
                    match load_image(&path).await {
                        Ok(img) => Some(img),
                        Err(e) => {
                            log::warn!("skipping texture {path} for material {}: {e}", m.name);
                            None
                        }
                    }
                }
                None => None,
            };
            images.push(image);
        }
        self.images = images;
        Ok(())
    }

    /// Override one named material from single-sided to double-sided.
    ///
    /// MTL has no side-mode flag, so thin geometry whose back faces must
    /// render (the windmill blades) needs this post-parse correction. Only
    /// the named material is touched. Returns whether the name resolved.
    pub fn set_double_sided(&mut self, name: &str) -> bool {
        match self.index.get(name) {
            Some(&id) => {
                self.double_sided[id] = true;
                true
            }
            None => false,
        }
    }

    pub fn is_double_sided(&self, id: usize) -> bool {
        self.double_sided.get(id).copied().unwrap_or(false)
    }

    pub fn material_id(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Upload all materials: preloaded images become sRGB textures, the rest
    /// get a 1x1 texture in the material's Kd colour.
    pub fn upload(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
    ) -> Result<Vec<model::Material>> {
        self.materials
            .iter()
            .enumerate()
            .map(|(id, m)| {
                let diffuse_texture = match self.images.get(id).and_then(|i| i.as_ref()) {
                    Some(img) => {
                        Texture::from_image(device, queue, img, Some(&m.name), wgpu::FilterMode::Linear)?
                    }
                    None => Texture::from_color(device, queue, m.diffuse.unwrap_or([0.8; 3])),
                };
                Ok(model::Material::new(
                    device,
                    &m.name,
                    diffuse_texture,
                    self.double_sided[id],
                    layout,
                ))
            })
            .collect()
    }

    fn resolve(&self, file_name: &str) -> String {
        if self.dir.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.dir, file_name)
        }
    }
}

/// Stage one: fetch, parse and preload a material library.
pub async fn load_material_library(file_name: &str) -> Result<MaterialLibrary> {
    let mtl_text = load_string(file_name)
        .await
        .with_context(|| format!("loading material library {file_name}"))?;
    let dir = file_name.rsplit_once('/').map(|(d, _)| d).unwrap_or("");

    let mut library =
        MaterialLibrary::from_reader(dir, &mut BufReader::new(Cursor::new(mtl_text)))?;
    library.preload().await?;
    Ok(library)
}

/// CPU-side model, ready for [`upload`](ParsedModel::upload).
#[derive(Clone, Debug)]
pub struct ParsedModel {
    pub meshes: Vec<ParsedMesh>,
}

impl ParsedModel {
    pub fn upload(
        &self,
        library: &MaterialLibrary,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<model::Model> {
        ensure!(!library.is_empty(), "model has no materials to draw with");
        let layout = texture::diffuse_layout(device);
        let materials = library.upload(device, queue, &layout)?;
        let meshes = self.meshes.iter().map(|m| m.upload(device)).collect();
        Ok(model::Model { meshes, materials })
    }
}

/// Stage two: fetch and parse geometry against a finished material library.
pub async fn load_model_obj(file_name: &str, library: &MaterialLibrary) -> Result<ParsedModel> {
    let obj_text = load_string(file_name)
        .await
        .with_context(|| format!("loading geometry {file_name}"))?;
    load_model_obj_buf(
        &mut BufReader::new(Cursor::new(obj_text)),
        file_name,
        library,
    )
    .await
}

/// Parse OBJ geometry from a reader. The material loader callback hands the
/// already-loaded library to `tobj`, so mesh material ids line up with the
/// library's indices.
pub async fn load_model_obj_buf(
    reader: &mut impl BufRead,
    file_name: &str,
    library: &MaterialLibrary,
) -> Result<ParsedModel> {
    let (models, _materials) = tobj::load_obj_buf_async(
        reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_p| {
            let materials = library.materials.clone();
            let index = library.index.clone();
            async move { Ok((materials, index)) }
        },
    )
    .await?;

    Ok(ParsedModel {
        meshes: build_meshes(&models, file_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MTL: &str = "\
newmtl Material
Kd 0.80 0.80 0.80
newmtl windmill
Kd 0.60 0.50 0.40
";

    const OBJ: &str = "\
mtllib windmill_001.mtl
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
usemtl windmill
f 1 2 3
usemtl Material
f 1 3 4
";

    fn library() -> MaterialLibrary {
        MaterialLibrary::from_reader("", &mut Cursor::new(MTL)).unwrap()
    }

    #[test]
    fn override_touches_only_the_named_material() {
        let mut lib = library();
        assert_eq!(lib.len(), 2);

        assert!(lib.set_double_sided("Material"));

        let blades = lib.material_id("Material").unwrap();
        let body = lib.material_id("windmill").unwrap();
        assert!(lib.is_double_sided(blades));
        // Every other material keeps its parsed default.
        assert!(!lib.is_double_sided(body));
    }

    #[test]
    fn override_of_unknown_material_is_reported() {
        let mut lib = library();
        assert!(!lib.set_double_sided("no_such_material"));
        assert!(!lib.is_double_sided(0));
        assert!(!lib.is_double_sided(1));
    }

    #[test]
    fn out_of_range_side_query_is_single_sided() {
        let lib = library();
        assert!(!lib.is_double_sided(99));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn geometry_resolves_against_the_loaded_library() {
        let lib = library();
        let parsed = load_model_obj_buf(&mut Cursor::new(OBJ), "windmill_001.obj", &lib)
            .await
            .unwrap();

        // Two material groups, each resolved to an id the library handed out.
        assert_eq!(parsed.meshes.len(), 2);
        for mesh in &parsed.meshes {
            assert!(mesh.material_id < lib.len());
        }
        let by_material: Vec<usize> = parsed.meshes.iter().map(|m| m.material_id).collect();
        assert!(by_material.contains(&lib.material_id("Material").unwrap()));
        assert!(by_material.contains(&lib.material_id("windmill").unwrap()));
    }
}
