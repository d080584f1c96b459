//! Container parsing and buffer resolution.

use anyhow::{Context, bail};
use gltf::json::validation::{Error as ValidationError, Validate};

use crate::{
    error::{LoadError, Stage, StageExt},
    pipeline::{
        DecodePipeline, EXT_MESHOPT_COMPRESSION, KHR_DRACO_MESH_COMPRESSION, KHR_TEXTURE_BASISU,
    },
    transport::{Transport, decode_data_uri, ignore_progress, is_data_uri, resolve_uri},
};

/// Parse a glTF JSON or binary GLB container.
///
/// The `gltf` crate refuses documents that require extensions it does not
/// implement itself. Those are routed to our own decoders, so validation runs
/// here with unsupported-extension reports filtered out.
pub fn parse(bytes: &[u8]) -> anyhow::Result<gltf::Gltf> {
    let gltf = gltf::Gltf::from_slice_without_validation(bytes)
        .context("not a glTF or GLB container")?;

    let root = gltf.document.as_json();
    let mut errors = Vec::new();
    root.validate(root, gltf::json::Path::new, &mut |path, error| {
        if !matches!(error, ValidationError::Unsupported) {
            errors.push(format!("{}: {}", path(), error));
        }
    });
    if !errors.is_empty() {
        bail!("invalid glTF document: {}", errors.join("; "));
    }
    Ok(gltf)
}

/// Fail early when the asset cannot be read without a geometry decoder we do
/// not have. Missing texture transcoding only degrades the result.
pub fn check_required_extensions(
    gltf: &gltf::Gltf,
    pipeline: &DecodePipeline,
) -> anyhow::Result<()> {
    for extension in gltf.extensions_required() {
        match extension {
            KHR_DRACO_MESH_COMPRESSION if pipeline.geometry_decoder(extension).is_none() => {
                bail!("asset requires {extension} but no geometry decoder is registered")
            }
            EXT_MESHOPT_COMPRESSION => {
                bail!("asset requires {extension}, buffer view compression is not supported")
            }
            KHR_TEXTURE_BASISU if pipeline.transcoder().is_none() => {
                log::warn!(
                    "asset requires {extension} but no transcoder is configured, textures stay encoded"
                );
            }
            _ => (),
        }
    }
    Ok(())
}

/// Resolved buffer contents, indexed like the glTF `buffers` array.
#[derive(Debug, Default)]
pub struct Buffers {
    pub data: Vec<Vec<u8>>,
    /// Bytes fetched through the transport for external buffers.
    pub fetched_bytes: u64,
}

/// Load every buffer of the document: the GLB `BIN` chunk, base64 data URIs,
/// or external files fetched next to the container. External fetches run
/// concurrently.
pub async fn load_buffers(
    gltf: &gltf::Gltf,
    id: &str,
    transport: &dyn Transport,
) -> Result<Buffers, LoadError> {
    let blob = gltf.blob.as_deref();
    let fetches = gltf.buffers().map(|buffer| async move {
        let index = buffer.index();
        let (data, fetched) = match buffer.source() {
            gltf::buffer::Source::Bin => {
                let data = blob
                    .map(<[u8]>::to_vec)
                    .with_context(|| format!("buffer {index} refers to a missing GLB binary chunk"))
                    .stage(id, Stage::Container)?;
                (data, false)
            }
            gltf::buffer::Source::Uri(uri) if is_data_uri(uri) => {
                let data = decode_data_uri(uri)
                    .with_context(|| format!("buffer {index} has a malformed data uri"))
                    .stage(id, Stage::Container)?;
                (data, false)
            }
            gltf::buffer::Source::Uri(uri) => {
                let path = resolve_uri(id, uri);
                let data = transport
                    .fetch(&path, &ignore_progress)
                    .await
                    .with_context(|| format!("could not fetch buffer {path}"))
                    .stage(id, Stage::Transport)?;
                (data, true)
            }
        };
        if data.len() < buffer.length() {
            return Err(LoadError::new(
                id,
                Stage::Container,
                anyhow::anyhow!(
                    "buffer {index} holds {} bytes, document declares {}",
                    data.len(),
                    buffer.length()
                ),
            ));
        }
        Ok::<_, LoadError>((data, fetched))
    });

    let mut buffers = Buffers::default();
    for (data, fetched) in futures::future::try_join_all(fetches).await? {
        if fetched {
            buffers.fetched_bytes += data.len() as u64;
        }
        buffers.data.push(data);
    }
    Ok(buffers)
}

/// Bytes of a buffer view, bounds-checked against the resolved buffer.
pub fn view_bytes<'b>(
    view: &gltf::buffer::View,
    buffers: &'b [Vec<u8>],
) -> anyhow::Result<&'b [u8]> {
    let buffer = buffers
        .get(view.buffer().index())
        .with_context(|| format!("buffer view {} points at a missing buffer", view.index()))?;
    let start = view.offset();
    let end = start + view.length();
    buffer
        .get(start..end)
        .with_context(|| format!("buffer view {} is out of bounds", view.index()))
}
