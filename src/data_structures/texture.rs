//! Decoded texture payloads.
//!
//! A texture ends up in one of three shapes depending on its source format and
//! on whether a transcoder was configured. Plain images (PNG, JPEG, ...) are
//! always decoded to RGBA8. KTX2/Basis images become [`TextureData::Compressed`]
//! when a [`crate::pipeline::TextureTranscoder`] is available and are otherwise
//! kept as [`TextureData::Encoded`] for the renderer to deal with.

use anyhow::Context;
use image::{GenericImageView, ImageFormat};

#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: String,
    pub data: TextureData,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TextureData {
    Rgba8 {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
    /// GPU block-compressed output of a transcoder, one entry per mip level.
    Compressed {
        format: String,
        width: u32,
        height: u32,
        levels: Vec<Vec<u8>>,
    },
    /// Undecoded source bytes.
    Encoded { mime_type: String, bytes: Vec<u8> },
}

const KTX2_MAGIC: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x32, 0x30, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];

pub const KTX2_MIME_TYPE: &str = "image/ktx2";

/// KTX2 containers are what compressed-texture extensions reference.
pub fn is_ktx2(bytes: &[u8], mime_type: Option<&str>) -> bool {
    mime_type == Some(KTX2_MIME_TYPE) || bytes.starts_with(&KTX2_MAGIC)
}

impl Texture {
    /// Decode an ordinary image file to RGBA8.
    ///
    /// `mime_type` is a format hint; when it is missing or unknown the format
    /// is guessed from the bytes.
    pub fn from_bytes(bytes: &[u8], name: &str, mime_type: Option<&str>) -> anyhow::Result<Self> {
        let img = match mime_type.and_then(ImageFormat::from_mime_type) {
            Some(format) => image::load_from_memory_with_format(bytes, format),
            None => image::load_from_memory(bytes),
        }
        .with_context(|| format!("could not decode image {name}"))?;
        Ok(Self::from_image(&img, name))
    }

    pub fn from_image(img: &image::DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        Self {
            name: name.to_string(),
            data: TextureData::Rgba8 {
                width,
                height,
                pixels: img.to_rgba8().into_raw(),
            },
        }
    }

    pub fn encoded(bytes: Vec<u8>, name: &str, mime_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data: TextureData::Encoded {
                mime_type: mime_type.to_string(),
                bytes,
            },
        }
    }

    /// Solid 127/127/255 normal map, i.e. no deformation.
    pub fn default_normal_map(width: u32, height: u32) -> Self {
        let pixels = [127, 127, 255, 255]
            .iter()
            .cycle()
            .take(width as usize * height as usize * 4)
            .copied()
            .collect();
        Self {
            name: String::from("default normal map"),
            data: TextureData::Rgba8 {
                width,
                height,
                pixels,
            },
        }
    }

    pub fn byte_len(&self) -> usize {
        match &self.data {
            TextureData::Rgba8 { pixels, .. } => pixels.len(),
            TextureData::Compressed { levels, .. } => levels.iter().map(Vec::len).sum(),
            TextureData::Encoded { bytes, .. } => bytes.len(),
        }
    }

    pub fn is_decoded(&self) -> bool {
        !matches!(self.data, TextureData::Encoded { .. })
    }
}
