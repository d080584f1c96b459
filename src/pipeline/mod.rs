//! The decode pipeline: one identifier in, one [`DecodedAsset`] out.
//!
//! Steps, each a potential failure point tagged with its [`Stage`]:
//!
//! 1. fetch the container bytes through the [`Transport`]
//! 2. parse the glTF/GLB container and resolve its buffers
//! 3. hand compressed primitives to the registered [`GeometryDecoder`]s
//! 4. transcode compressed images with the [`TextureTranscoder`], if one was
//!    supplied, and decode plain images to RGBA8
//! 5. read animations, materials and nodes into a [`SceneFragment`]
//!
//! The pipeline never retries; resubmitting the identifier is up to the caller.

use anyhow::Context;
use futures::future::LocalBoxFuture;

use crate::{
    data_structures::{
        mesh::Geometry,
        scene_graph::{DecodedAsset, SceneFragment},
        texture::Texture,
    },
    error::{LoadError, Stage, StageExt},
    transport::{Progress, Transport},
};

pub mod animation;
pub mod assembly;
pub mod container;
pub mod geometry;
pub mod texture;

/// Primitive-level geometry compression the pipeline knows how to route.
pub const KHR_DRACO_MESH_COMPRESSION: &str = "KHR_draco_mesh_compression";
/// Buffer-view level compression; assets requiring it cannot be read.
pub const EXT_MESHOPT_COMPRESSION: &str = "EXT_meshopt_compression";
/// Basis Universal textures in KTX2 containers.
pub const KHR_TEXTURE_BASISU: &str = "KHR_texture_basisu";

/// A compressed primitive as found in the container.
#[derive(Debug)]
pub struct CompressedPrimitive<'a> {
    /// Extension name, e.g. [`KHR_DRACO_MESH_COMPRESSION`].
    pub extension: &'a str,
    pub mesh: Option<&'a str>,
    /// The extension object of the primitive, including its attribute map.
    pub descriptor: &'a serde_json::Value,
    /// Contents of the buffer view the descriptor points at.
    pub data: &'a [u8],
    /// `count` of the POSITION accessor, if declared.
    pub vertex_count: Option<usize>,
    /// `count` of the indices accessor, if declared.
    pub index_count: Option<usize>,
}

/// Decompresses primitives stored with one geometry compression extension.
pub trait GeometryDecoder {
    /// The glTF extension this decoder handles.
    fn extension(&self) -> &str;

    fn decode<'a>(
        &'a self,
        primitive: CompressedPrimitive<'a>,
    ) -> LocalBoxFuture<'a, anyhow::Result<Geometry>>;
}

/// A KTX2 image waiting to be transcoded.
#[derive(Debug)]
pub struct EncodedImage<'a> {
    /// glTF image index.
    pub index: usize,
    pub name: &'a str,
    pub mime_type: Option<&'a str>,
    pub data: &'a [u8],
}

/// The decoding context for compressed textures, usually provided by the
/// renderer since it knows which GPU formats the device supports.
pub trait TextureTranscoder {
    fn transcode<'a>(&'a self, image: EncodedImage<'a>)
    -> LocalBoxFuture<'a, anyhow::Result<Texture>>;
}

pub struct DecodePipeline {
    transport: Box<dyn Transport>,
    geometry_decoders: Vec<Box<dyn GeometryDecoder>>,
    transcoder: Option<Box<dyn TextureTranscoder>>,
}

impl DecodePipeline {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            geometry_decoders: Vec::new(),
            transcoder: None,
        }
    }

    /// Register a decoder. A later decoder for the same extension replaces
    /// the earlier one.
    pub fn with_geometry_decoder(mut self, decoder: impl GeometryDecoder + 'static) -> Self {
        self.geometry_decoders
            .retain(|existing| existing.extension() != decoder.extension());
        self.geometry_decoders.push(Box::new(decoder));
        self
    }

    pub fn with_transcoder(mut self, transcoder: impl TextureTranscoder + 'static) -> Self {
        self.transcoder = Some(Box::new(transcoder));
        self
    }

    pub fn geometry_decoder(&self, extension: &str) -> Option<&dyn GeometryDecoder> {
        self.geometry_decoders
            .iter()
            .find(|decoder| decoder.extension() == extension)
            .map(|decoder| decoder.as_ref())
    }

    pub fn transcoder(&self) -> Option<&dyn TextureTranscoder> {
        self.transcoder.as_deref()
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Run the whole pipeline for `id`. `progress` only sees the container
    /// fetch; external buffers and images are fetched silently.
    pub async fn load(
        &self,
        id: &str,
        progress: &dyn Fn(Progress),
    ) -> Result<DecodedAsset, LoadError> {
        let bytes = self
            .transport
            .fetch(id, progress)
            .await
            .with_context(|| format!("could not fetch {id}"))
            .stage(id, Stage::Transport)?;
        let mut byte_length = bytes.len() as u64;

        let gltf = container::parse(&bytes).stage(id, Stage::Container)?;
        drop(bytes);
        container::check_required_extensions(&gltf, self).stage(id, Stage::Geometry)?;

        let buffers = container::load_buffers(&gltf, id, self.transport()).await?;
        byte_length += buffers.fetched_bytes;

        let models = geometry::read_models(&gltf, &buffers.data, self)
            .await
            .stage(id, Stage::Geometry)?;
        log::debug!(
            "{id}: {} models with {} primitives",
            models.len(),
            geometry::primitive_count(&models)
        );
        let textures = texture::read_textures(&gltf, &buffers.data, id, self).await?;
        byte_length += textures.fetched_bytes;

        let materials = assembly::read_materials(&gltf, id);
        let roots = assembly::read_roots(&gltf).stage(id, Stage::Assembly)?;
        let animations = animation::read_animations(&gltf, &buffers.data);

        Ok(DecodedAsset {
            id: id.to_string(),
            fragment: SceneFragment {
                roots,
                models,
                materials,
                textures: textures.textures,
                animations,
            },
            byte_length,
        })
    }
}
