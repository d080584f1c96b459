//! Byte transports the decode pipeline fetches through.
//!
//! On native targets assets are read from an asset directory with `tokio::fs`.
//! On the web they are requested relative to the page origin with `reqwest`.
//! Both report [`Progress`] while bytes arrive; progress is advisory only.

use anyhow::{Context, bail};
use base64::Engine;
use futures::future::LocalBoxFuture;

/// Bytes received so far for one fetch. `total` is `None` when the transport
/// cannot tell the size up front.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl Progress {
    pub fn new(loaded: u64, total: Option<u64>) -> Self {
        Self { loaded, total }
    }

    /// Fraction in `0.0..=1.0`, or `None` if the total is unknown or zero.
    pub fn fraction(&self) -> Option<f32> {
        match self.total {
            Some(total) if total > 0 => Some((self.loaded as f32 / total as f32).min(1.0)),
            _ => None,
        }
    }
}

/// Progress sink for fetches nobody watches, such as external buffers.
pub(crate) fn ignore_progress(_: Progress) {}

/// Something that can turn a resource path into bytes.
///
/// Implementations run on a single thread and may borrow `self` across await
/// points, hence the non-`Send` boxed future.
pub trait Transport {
    fn fetch<'a>(
        &'a self,
        uri: &'a str,
        progress: &'a dyn Fn(Progress),
    ) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>>;
}

/// Resolve `uri` (as written inside a glTF document) against the identifier of
/// the document that references it.
///
/// Absolute URLs and root-relative paths are returned unchanged; everything else
/// is taken relative to the directory part of `base`. `.` and `..` segments are
/// folded; a `..` that climbs above the first segment is kept, and transports
/// reject it.
pub fn resolve_uri(base: &str, uri: &str) -> String {
    if uri.contains("://") || uri.starts_with('/') || uri.starts_with("data:") {
        return uri.to_string();
    }
    let dir = base.rfind('/').map_or("", |idx| &base[..idx]);
    let mut segments: Vec<&str> = Vec::new();
    for segment in dir.split('/').chain(uri.split('/')) {
        match segment {
            "" | "." => (),
            ".." if segments.last().is_some_and(|last| *last != "..") => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    segments.join("/")
}

pub fn is_data_uri(uri: &str) -> bool {
    uri.starts_with("data:")
}

/// Media type declared in a `data:` URI header, if any.
pub fn data_uri_mime_type(uri: &str) -> Option<&str> {
    let header = uri.strip_prefix("data:")?.split(',').next()?;
    let mime = header.split(';').next()?;
    (!mime.is_empty()).then_some(mime)
}

/// Decode a base64 `data:` URI as produced by glTF exporters.
pub fn decode_data_uri(uri: &str) -> anyhow::Result<Vec<u8>> {
    let Some(rest) = uri.strip_prefix("data:") else {
        bail!("not a data uri");
    };
    let (header, payload) = rest
        .split_once(',')
        .context("data uri has no payload separator")?;
    if !header.ends_with(";base64") {
        bail!("only base64 data uris are supported, got `{header}`");
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("invalid base64 payload in data uri")
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::FileTransport;

#[cfg(target_arch = "wasm32")]
pub use web::HttpTransport;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::{Component, Path, PathBuf};

    use anyhow::{Context, bail};
    use futures::{FutureExt, future::LocalBoxFuture};
    use tokio::io::AsyncReadExt;

    use super::{Progress, Transport};

    const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

    /// Reads assets below a root directory.
    #[derive(Clone, Debug)]
    pub struct FileTransport {
        root: PathBuf,
        chunk_size: usize,
    }

    impl FileTransport {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self {
                root: root.into(),
                chunk_size: DEFAULT_CHUNK_SIZE,
            }
        }

        /// Read granularity, which is also the progress reporting granularity.
        pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
            self.chunk_size = chunk_size.max(1);
            self
        }

        pub fn root(&self) -> &Path {
            &self.root
        }

        /// `uri` below the root. Absolute paths and `..` segments are refused
        /// so documents cannot reach files outside the root.
        fn path_for(&self, uri: &str) -> anyhow::Result<PathBuf> {
            let relative = Path::new(uri);
            let inside = relative
                .components()
                .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
            if !inside {
                bail!("{uri} points outside the asset root");
            }
            Ok(self.root.join(relative))
        }

        async fn read(&self, uri: &str, progress: &dyn Fn(Progress)) -> anyhow::Result<Vec<u8>> {
            let path = self.path_for(uri)?;
            let mut file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("could not open {}", path.display()))?;
            let total = file.metadata().await.ok().map(|meta| meta.len());

            let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
            let mut chunk = vec![0u8; self.chunk_size];
            loop {
                let read = file
                    .read(&mut chunk)
                    .await
                    .with_context(|| format!("could not read {}", path.display()))?;
                if read == 0 {
                    break;
                }
                data.extend_from_slice(&chunk[..read]);
                progress(Progress::new(data.len() as u64, total));
            }
            if data.is_empty() {
                progress(Progress::new(0, total));
            }
            Ok(data)
        }
    }

    impl Default for FileTransport {
        fn default() -> Self {
            Self::new(Path::new("./").join("assets"))
        }
    }

    impl Transport for FileTransport {
        fn fetch<'a>(
            &'a self,
            uri: &'a str,
            progress: &'a dyn Fn(Progress),
        ) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>> {
            self.read(uri, progress).boxed_local()
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod web {
    use anyhow::{Context, anyhow};
    use futures::{FutureExt, future::LocalBoxFuture};

    use super::{Progress, Transport};

    /// Requests assets relative to a base URL.
    #[derive(Clone, Debug)]
    pub struct HttpTransport {
        base: reqwest::Url,
    }

    impl HttpTransport {
        pub fn new(base: reqwest::Url) -> Self {
            Self { base }
        }

        /// Base the transport on `<page origin>/assets/`.
        pub fn from_origin() -> anyhow::Result<Self> {
            let window = web_sys::window().context("no window available")?;
            let origin = window
                .location()
                .origin()
                .map_err(|err| anyhow!("could not read page origin: {err:?}"))?;
            let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
            Ok(Self::new(base))
        }

        pub fn parse(base: &str) -> anyhow::Result<Self> {
            let base = if base.ends_with('/') {
                base.to_string()
            } else {
                format!("{}/", base)
            };
            Ok(Self::new(reqwest::Url::parse(&base)?))
        }

        async fn get(&self, uri: &str, progress: &dyn Fn(Progress)) -> anyhow::Result<Vec<u8>> {
            let url = self
                .base
                .join(uri)
                .with_context(|| format!("invalid asset path {uri}"))?;
            let response = reqwest::get(url.clone())
                .await
                .with_context(|| format!("request to {url} failed"))?
                .error_for_status()?;
            let total = response.content_length();
            progress(Progress::new(0, total));
            let data = response.bytes().await?.to_vec();
            progress(Progress::new(data.len() as u64, total.or(Some(data.len() as u64))));
            Ok(data)
        }
    }

    impl Transport for HttpTransport {
        fn fetch<'a>(
            &'a self,
            uri: &'a str,
            progress: &'a dyn Fn(Progress),
        ) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>> {
            self.get(uri, progress).boxed_local()
        }
    }
}
