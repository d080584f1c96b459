//! CPU-side meshes and materials.
//!
//! Vertex data is laid out so a renderer can upload it as-is: [`ModelVertex`]
//! is `Pod`, and [`Mesh::vertex_bytes`] / [`Mesh::index_bytes`] hand out the raw
//! slices.

/// One vertex as consumed by the basic lit pipeline.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

/// Raw attribute streams of one primitive, before they are interleaved.
///
/// Empty vectors mean the attribute is absent. This is also what a
/// [`crate::pipeline::GeometryDecoder`] hands back after decompression.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    /// glTF tangents: xyz plus the bitangent sign in w.
    pub tangents: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
}

impl Geometry {
    /// Interleave the streams into vertices. Attributes shorter than the
    /// position stream are padded with defaults.
    pub fn into_mesh(self, name: &str, material: Option<usize>) -> Mesh {
        let mut vertices: Vec<ModelVertex> = self
            .positions
            .iter()
            .enumerate()
            .map(|(i, position)| ModelVertex {
                position: *position,
                tex_coords: self.tex_coords.get(i).copied().unwrap_or_default(),
                normal: self.normals.get(i).copied().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        let indices = if self.indices.is_empty() {
            (0..vertices.len() as u32).collect()
        } else {
            self.indices
        };

        if self.tangents.len() >= vertices.len() && !vertices.is_empty() {
            for (vertex, tangent) in vertices.iter_mut().zip(self.tangents.iter()) {
                // glTF stores the handedness in w, the bitangent is derived from it
                let tangent: cgmath::Vector4<f32> = (*tangent).into();
                let normal: cgmath::Vector3<f32> = vertex.normal.into();
                vertex.tangent = tangent.truncate().into();
                vertex.bitangent = (normal.cross(tangent.truncate()) * tangent.w).into();
            }
        } else if !self.tex_coords.is_empty() {
            compute_tangents(&mut vertices, &indices);
        }

        Mesh {
            name: name.to_string(),
            vertices,
            indices,
            material,
        }
    }
}

/// Derive per-vertex tangents and bitangents from triangle UV gradients.
///
/// Each triangle contributes the same tangent to its three vertices; the
/// contributions are averaged afterwards. Degenerate UV triangles are skipped.
pub fn compute_tangents(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut triangles_included = vec![0u32; vertices.len()];

    for c in indices.chunks_exact(3) {
        let [i0, i1, i2] = [c[0] as usize, c[1] as usize, c[2] as usize];
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }
        let (v0, v1, v2) = (vertices[i0], vertices[i1], vertices[i2]);

        let pos0: cgmath::Vector3<f32> = v0.position.into();
        let pos1: cgmath::Vector3<f32> = v1.position.into();
        let pos2: cgmath::Vector3<f32> = v2.position.into();

        let uv0: cgmath::Vector2<f32> = v0.tex_coords.into();
        let uv1: cgmath::Vector2<f32> = v1.tex_coords.into();
        let uv2: cgmath::Vector2<f32> = v2.tex_coords.into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        // delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        // delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        // flipped for right-handed normal maps in wgpu's texture space
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * -r;

        for idx in [i0, i1, i2] {
            let vertex = &mut vertices[idx];
            vertex.tangent = (tangent + cgmath::Vector3::from(vertex.tangent)).into();
            vertex.bitangent = (bitangent + cgmath::Vector3::from(vertex.bitangent)).into();
            triangles_included[idx] += 1;
        }
    }

    for (vertex, n) in vertices.iter_mut().zip(triangles_included) {
        if n == 0 {
            continue;
        }
        let denom = 1.0 / n as f32;
        vertex.tangent = (cgmath::Vector3::from(vertex.tangent) * denom).into();
        vertex.bitangent = (cgmath::Vector3::from(vertex.bitangent) * denom).into();
    }
}

/// One drawable primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    /// Index into [`crate::data_structures::scene_graph::SceneFragment::materials`].
    pub material: Option<usize>,
}

impl Mesh {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn num_elements(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// A glTF mesh: a named group of primitives drawn with the same transform.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
    pub name: String,
    pub meshes: Vec<Mesh>,
}

impl Model {
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.vertices.len()).sum()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color_factor: [f32; 4],
    /// Index into the fragment's textures.
    pub base_color_texture: Option<usize>,
    pub normal_texture: Option<usize>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            normal_texture: None,
        }
    }
}
