//! Primitive geometry: plain accessors or compressed payloads.

use anyhow::{Context, bail};

use crate::{
    data_structures::mesh::{Geometry, Model},
    pipeline::{CompressedPrimitive, DecodePipeline, KHR_DRACO_MESH_COMPRESSION, container},
};

/// Extensions that replace a primitive's accessors with a compressed blob.
const PRIMITIVE_COMPRESSION: [&str; 1] = [KHR_DRACO_MESH_COMPRESSION];

/// Read every glTF mesh into a [`Model`], in document order so node mesh
/// indices stay valid.
pub async fn read_models(
    gltf: &gltf::Gltf,
    buffers: &[Vec<u8>],
    pipeline: &DecodePipeline,
) -> anyhow::Result<Vec<Model>> {
    let mut models = Vec::new();
    for mesh in gltf.meshes() {
        let name = mesh
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh{}", mesh.index()));
        let mut meshes = Vec::new();
        for primitive in mesh.primitives() {
            let geometry = read_primitive(gltf, &mesh, &primitive, buffers, pipeline)
                .await
                .with_context(|| format!("primitive {} of {name}", primitive.index()))?;
            meshes.push(geometry.into_mesh(&name, primitive.material().index()));
        }
        models.push(Model { name, meshes });
    }
    Ok(models)
}

async fn read_primitive(
    gltf: &gltf::Gltf,
    mesh: &gltf::Mesh<'_>,
    primitive: &gltf::Primitive<'_>,
    buffers: &[Vec<u8>],
    pipeline: &DecodePipeline,
) -> anyhow::Result<Geometry> {
    let compressed = PRIMITIVE_COMPRESSION
        .iter()
        .find_map(|&name| primitive.extension_value(name).map(|value| (name, value)));

    if let Some((extension, descriptor)) = compressed {
        match pipeline.geometry_decoder(extension) {
            Some(decoder) => {
                let data = compressed_view(gltf, descriptor, buffers)?;
                let compressed = CompressedPrimitive {
                    extension,
                    mesh: mesh.name(),
                    descriptor,
                    data,
                    vertex_count: primitive
                        .get(&gltf::Semantic::Positions)
                        .map(|accessor| accessor.count()),
                    index_count: primitive.indices().map(|accessor| accessor.count()),
                };
                let geometry = decoder
                    .decode(compressed)
                    .await
                    .with_context(|| format!("{extension} decoder failed"))?;
                if geometry.positions.is_empty() {
                    bail!("{extension} decoder returned no positions");
                }
                return Ok(geometry);
            }
            // only reachable when the extension is optional, fall back to the accessors
            None => log::warn!(
                "no decoder for {extension}, reading uncompressed fallback of {:?}",
                mesh.name()
            ),
        }
    }

    read_plain(primitive, buffers)
}

fn compressed_view<'b>(
    gltf: &gltf::Gltf,
    descriptor: &serde_json::Value,
    buffers: &'b [Vec<u8>],
) -> anyhow::Result<&'b [u8]> {
    let index = descriptor
        .get("bufferView")
        .and_then(serde_json::Value::as_u64)
        .context("compressed primitive has no bufferView")? as usize;
    let view = gltf
        .views()
        .nth(index)
        .with_context(|| format!("compressed primitive refers to missing buffer view {index}"))?;
    container::view_bytes(&view, buffers)
}

fn read_plain(primitive: &gltf::Primitive<'_>, buffers: &[Vec<u8>]) -> anyhow::Result<Geometry> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .map(|positions| positions.collect())
        .unwrap_or_default();
    if positions.is_empty() {
        bail!("primitive has no readable POSITION data");
    }

    Ok(Geometry {
        positions,
        normals: reader
            .read_normals()
            .map(|normals| normals.collect())
            .unwrap_or_default(),
        tex_coords: reader
            .read_tex_coords(0)
            .map(|tex_coords| tex_coords.into_f32().collect())
            .unwrap_or_default(),
        tangents: reader
            .read_tangents()
            .map(|tangents| tangents.collect())
            .unwrap_or_default(),
        indices: reader
            .read_indices()
            .map(|indices| indices.into_u32().collect())
            .unwrap_or_default(),
    })
}

/// Total number of primitives, handy for logging.
pub fn primitive_count(models: &[Model]) -> usize {
    models.iter().map(|model| model.meshes.len()).sum()
}

