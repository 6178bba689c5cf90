//! End-to-end checks of the shipped assets against the loader pipeline:
//! the material library parses, the double-sided override lands on the
//! blades material and nothing else, and the geometry only references
//! materials the library actually defines.

use image::GenericImageView;
use windmill_viewer::{resources, scene};

#[tokio::test]
async fn material_library_loads_and_override_targets_the_blades() {
    let mut library = resources::load_material_library(scene::WINDMILL_MTL)
        .await
        .expect("shipped MTL should parse");

    assert_eq!(library.len(), 2);
    let blades = library
        .material_id(scene::BLADES_MATERIAL)
        .expect("blades material present");
    let body = library.material_id("windmill").expect("body material present");

    assert!(library.set_double_sided(scene::BLADES_MATERIAL));
    assert!(library.is_double_sided(blades));
    assert!(!library.is_double_sided(body));
}

#[tokio::test]
async fn geometry_references_only_known_materials() {
    let library = resources::load_material_library(scene::WINDMILL_MTL)
        .await
        .expect("shipped MTL should parse");
    let parsed = resources::load_model_obj(scene::WINDMILL_OBJ, &library)
        .await
        .expect("shipped OBJ should parse");

    assert!(!parsed.meshes.is_empty());
    let blades = library.material_id(scene::BLADES_MATERIAL).unwrap();
    let body = library.material_id("windmill").unwrap();

    let mut seen = [false; 2];
    for mesh in &parsed.meshes {
        assert!(mesh.material_id < library.len(), "mesh {} references a material the library does not define", mesh.name);
        assert!(!mesh.vertices.is_empty());
        assert_eq!(mesh.indices.len() % 3, 0, "faces should be triangulated");
        seen[0] |= mesh.material_id == blades;
        seen[1] |= mesh.material_id == body;
    }
    assert!(seen[0], "no mesh uses the blades material");
    assert!(seen[1], "no mesh uses the body material");
}

#[tokio::test]
async fn checker_texture_decodes() {
    let img = resources::texture::load_image(scene::CHECKER_TEXTURE)
        .await
        .expect("shipped checker texture should decode");
    // A tiny pattern by design: nearest-filter magnification does the rest.
    assert_eq!(img.dimensions(), (2, 2));
}
