//! Materials and the node hierarchy.

use std::collections::HashSet;

use anyhow::bail;

use crate::data_structures::{
    instance::Instance,
    mesh::Material,
    scene_graph::SceneNode,
};

/// Deeper hierarchies than this are treated as cyclic.
const MAX_NODE_DEPTH: usize = 256;

pub fn read_materials(gltf: &gltf::Gltf, id: &str) -> Vec<Material> {
    gltf.materials()
        .enumerate()
        .map(|(idx, material)| {
            let pbr = material.pbr_metallic_roughness();
            Material {
                name: material
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{id}#material{idx}")),
                base_color_factor: pbr.base_color_factor(),
                base_color_texture: pbr
                    .base_color_texture()
                    .map(|info| info.texture().source().index()),
                normal_texture: material
                    .normal_texture()
                    .map(|normal| normal.texture().source().index()),
            }
        })
        .collect()
}

/// Root nodes of the default scene, or of every scene when none is marked
/// as default.
///
/// The node graph must be a forest: a node reached a second time, whether as
/// a shared child or as a root of two scenes, fails the asset.
pub fn read_roots(gltf: &gltf::Gltf) -> anyhow::Result<Vec<SceneNode>> {
    let scenes: Vec<gltf::Scene> = match gltf.default_scene() {
        Some(scene) => vec![scene],
        None => gltf.scenes().collect(),
    };
    let mut visited = HashSet::new();
    let mut roots = Vec::new();
    for scene in scenes {
        for node in scene.nodes() {
            roots.push(to_scene_node(node, 0, &mut visited)?);
        }
    }
    Ok(roots)
}

fn to_scene_node(
    node: gltf::Node,
    depth: usize,
    visited: &mut HashSet<usize>,
) -> anyhow::Result<SceneNode> {
    if depth > MAX_NODE_DEPTH {
        bail!("node {} is nested deeper than {MAX_NODE_DEPTH} levels", node.index());
    }
    if !visited.insert(node.index()) {
        bail!("node {} is reachable from more than one parent", node.index());
    }
    let (translation, rotation, scale) = node.transform().decomposed();
    let mut scene_node = SceneNode::new(
        node.index(),
        Instance::from_decomposed(translation, rotation, scale),
    );
    scene_node.name = node.name().map(str::to_string);
    scene_node.model = node.mesh().map(|mesh| mesh.index());
    for child in node.children() {
        scene_node.add_child(to_scene_node(child, depth + 1, visited)?);
    }
    Ok(scene_node)
}
