//! flow-stream
//!
//! A streaming loader for glTF scenes with native and WASM support. Assets are
//! requested by identifier, admitted into a decode pipeline under a
//! device-dependent concurrency cap, and handed back as renderer-agnostic scene
//! fragments through an observer.
//!
//! High-level modules
//! - `capability`: device classes and the concurrency/pacing profile per class
//! - `config`: environment driven configuration and host probing
//! - `data_structures`: decoded data models (meshes, textures, scene nodes)
//! - `pipeline`: fetch, container parse, geometry and texture decoding
//! - `queue`: the admission queue and its observers
//! - `transport`: file and HTTP byte sources
//!
//! ```ignore
//! flow_stream::logging::init();
//! let config = LoaderConfig::from_env()?;
//! let pipeline = DecodePipeline::new(config.transport()?);
//! let (observer, events) = ChannelObserver::new();
//! let queue = QueueManager::new(pipeline, config.profile()).with_observer(observer);
//! queue.submit_batch(["city/block_a.glb", "city/block_b.glb"]).await;
//! ```

pub mod capability;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod timer;
pub mod transport;

// Re-exports commonly used types for convenience in downstream code.
pub use capability::{CapabilityProfile, DeviceClass};
pub use config::LoaderConfig;
pub use data_structures::scene_graph::{DecodedAsset, SceneFragment, SceneNode};
pub use error::{LoadError, Stage};
pub use pipeline::{DecodePipeline, GeometryDecoder, TextureTranscoder};
pub use queue::{ChannelObserver, LoadEvent, LoadObserver, NoopObserver, QueueManager};
#[cfg(not(target_arch = "wasm32"))]
pub use transport::FileTransport;
#[cfg(target_arch = "wasm32")]
pub use transport::HttpTransport;
pub use transport::{Progress, Transport};
