//! Image resolution, transcoding and decoding.

use anyhow::Context;

use crate::{
    data_structures::texture::{KTX2_MIME_TYPE, Texture, is_ktx2},
    error::{LoadError, Stage, StageExt},
    pipeline::{DecodePipeline, EncodedImage, container},
    transport::{data_uri_mime_type, decode_data_uri, ignore_progress, is_data_uri, resolve_uri},
};

#[derive(Debug, Default)]
pub struct Textures {
    /// Indexed like the glTF `images` array.
    pub textures: Vec<Texture>,
    /// Bytes fetched through the transport for external images.
    pub fetched_bytes: u64,
}

/// Resolve and decode every image of the document.
///
/// KTX2 images go through the pipeline's transcoder when there is one and
/// are passed through untouched otherwise.
pub async fn read_textures(
    gltf: &gltf::Gltf,
    buffers: &[Vec<u8>],
    id: &str,
    pipeline: &DecodePipeline,
) -> Result<Textures, LoadError> {
    let mut textures = Textures::default();
    for image in gltf.images() {
        let index = image.index();
        let name = image
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{id}#image{index}"));

        let (bytes, mime_type) = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let bytes = container::view_bytes(&view, buffers)
                    .with_context(|| format!("image {name}"))
                    .stage(id, Stage::Texture)?;
                (bytes.to_vec(), Some(mime_type.to_string()))
            }
            gltf::image::Source::Uri { uri, mime_type } if is_data_uri(uri) => {
                let bytes = decode_data_uri(uri)
                    .with_context(|| format!("image {name} has a malformed data uri"))
                    .stage(id, Stage::Texture)?;
                let mime_type = mime_type.or_else(|| data_uri_mime_type(uri));
                (bytes, mime_type.map(str::to_string))
            }
            gltf::image::Source::Uri { uri, mime_type } => {
                let path = resolve_uri(id, uri);
                let bytes = pipeline
                    .transport()
                    .fetch(&path, &ignore_progress)
                    .await
                    .with_context(|| format!("could not fetch image {path}"))
                    .stage(id, Stage::Transport)?;
                textures.fetched_bytes += bytes.len() as u64;
                (bytes, mime_type.map(str::to_string))
            }
        };

        let texture = decode_image(index, &name, bytes, mime_type.as_deref(), pipeline)
            .await
            .stage(id, Stage::Texture)?;
        textures.textures.push(texture);
    }
    Ok(textures)
}

async fn decode_image(
    index: usize,
    name: &str,
    bytes: Vec<u8>,
    mime_type: Option<&str>,
    pipeline: &DecodePipeline,
) -> anyhow::Result<Texture> {
    if !is_ktx2(&bytes, mime_type) {
        return Texture::from_bytes(&bytes, name, mime_type);
    }
    match pipeline.transcoder() {
        Some(transcoder) => transcoder
            .transcode(EncodedImage {
                index,
                name,
                mime_type,
                data: &bytes,
            })
            .await
            .with_context(|| format!("could not transcode {name}")),
        None => {
            log::debug!("no transcoder configured, keeping {name} encoded");
            Ok(Texture::encoded(bytes, name, KTX2_MIME_TYPE))
        }
    }
}
