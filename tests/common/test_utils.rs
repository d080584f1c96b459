#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    io::Cursor,
    rc::Rc,
    time::Duration,
};

use base64::Engine;
use flow_stream::{
    CapabilityProfile, DecodePipeline, DecodedAsset, LoadError, LoadObserver, Progress,
    QueueManager, Stage, Transport,
};
use futures::{FutureExt, future::LocalBoxFuture};
use serde_json::{Value, json};
use tokio::time::Instant;

/// In-memory transport with per-uri virtual delays, failures and a record of
/// how many fetches were running at once.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Rc<MockState>,
}

#[derive(Default)]
struct MockState {
    assets: RefCell<HashMap<String, Vec<u8>>>,
    delays: RefCell<HashMap<String, Duration>>,
    default_delay: Cell<Duration>,
    failing: RefCell<HashSet<String>>,
    active: Cell<usize>,
    max_active: Cell<usize>,
    fetched: RefCell<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(self, uri: &str, bytes: Vec<u8>) -> Self {
        self.insert(uri, bytes);
        self
    }

    pub fn insert(&self, uri: &str, bytes: Vec<u8>) {
        self.state.assets.borrow_mut().insert(uri.to_string(), bytes);
    }

    pub fn with_delay(self, uri: &str, delay: Duration) -> Self {
        self.state.delays.borrow_mut().insert(uri.to_string(), delay);
        self
    }

    pub fn with_default_delay(self, delay: Duration) -> Self {
        self.state.default_delay.set(delay);
        self
    }

    /// Fetches of `uri` fail with a transport error.
    pub fn failing(self, uri: &str) -> Self {
        self.state.failing.borrow_mut().insert(uri.to_string());
        self
    }

    pub fn active(&self) -> usize {
        self.state.active.get()
    }

    pub fn max_active(&self) -> usize {
        self.state.max_active.get()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.state.fetched.borrow().clone()
    }

    async fn get(&self, uri: &str, progress: &dyn Fn(Progress)) -> anyhow::Result<Vec<u8>> {
        let state = &self.state;
        state.fetched.borrow_mut().push(uri.to_string());
        state.active.set(state.active.get() + 1);
        state.max_active.set(state.max_active.get().max(state.active.get()));

        let bytes = state.assets.borrow().get(uri).cloned();
        let total = bytes.as_ref().map(|bytes| bytes.len() as u64);
        progress(Progress::new(0, total));

        let delay = state
            .delays
            .borrow()
            .get(uri)
            .copied()
            .unwrap_or_else(|| state.default_delay.get());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        state.active.set(state.active.get() - 1);

        if state.failing.borrow().contains(uri) {
            anyhow::bail!("connection reset while fetching {uri}");
        }
        let bytes = bytes.ok_or_else(|| anyhow::anyhow!("404 not found: {uri}"))?;
        progress(Progress::new(bytes.len() as u64, total));
        Ok(bytes)
    }
}

impl Transport for MockTransport {
    fn fetch<'a>(
        &'a self,
        uri: &'a str,
        progress: &'a dyn Fn(Progress),
    ) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>> {
        self.get(uri, progress).boxed_local()
    }
}

#[derive(Default)]
pub struct Record {
    pub dispatched: Vec<(String, Instant)>,
    pub progress: Vec<(String, Progress)>,
    pub loaded: Vec<DecodedAsset>,
    pub failed: Vec<LoadError>,
}

/// Observer that keeps everything it is told, with virtual timestamps for
/// dispatches.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    record: Rc<RefCell<Record>>,
}

impl RecordingObserver {
    pub fn dispatched(&self) -> Vec<String> {
        self.record
            .borrow()
            .dispatched
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn dispatch_times(&self) -> Vec<Instant> {
        self.record.borrow().dispatched.iter().map(|(_, at)| *at).collect()
    }

    pub fn loaded(&self) -> Vec<String> {
        self.record
            .borrow()
            .loaded
            .iter()
            .map(|asset| asset.id.clone())
            .collect()
    }

    pub fn failed(&self) -> Vec<(String, Stage)> {
        self.record
            .borrow()
            .failed
            .iter()
            .map(|err| (err.id.clone(), err.stage))
            .collect()
    }

    pub fn progress_for(&self, id: &str) -> Vec<Progress> {
        self.record
            .borrow()
            .progress
            .iter()
            .filter(|(progress_id, _)| progress_id == id)
            .map(|(_, progress)| *progress)
            .collect()
    }

    pub fn settled(&self) -> usize {
        let record = self.record.borrow();
        record.loaded.len() + record.failed.len()
    }
}

impl LoadObserver for RecordingObserver {
    fn on_dispatched(&self, id: &str) {
        self.record
            .borrow_mut()
            .dispatched
            .push((id.to_string(), Instant::now()));
    }

    fn on_progress(&self, id: &str, progress: Progress) {
        self.record
            .borrow_mut()
            .progress
            .push((id.to_string(), progress));
    }

    fn on_loaded(&self, _id: &str, asset: DecodedAsset) {
        self.record.borrow_mut().loaded.push(asset);
    }

    fn on_failed(&self, _id: &str, error: LoadError) {
        self.record.borrow_mut().failed.push(error);
    }
}

/// A queue over `transport` that reports to a fresh recording observer.
pub fn recording_queue(
    transport: MockTransport,
    profile: CapabilityProfile,
) -> (QueueManager, RecordingObserver) {
    let observer = RecordingObserver::default();
    let queue = QueueManager::new(DecodePipeline::new(transport), profile)
        .with_observer(observer.clone());
    (queue, observer)
}

pub const TRIANGLE_POSITIONS: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
pub const KEYFRAME_TIMES: [f32; 2] = [0.0, 1.5];
pub const KEYFRAME_TRANSLATIONS: [[f32; 3]; 2] = [[0.0, 0.0, 0.0], [0.0, 4.0, 0.0]];

/// Layout: positions (36) | indices (6) | padding (2) | keyframe times (8) |
/// keyframe translations (24).
pub const BUFFER_LENGTH: usize = 76;

pub fn triangle_buffer() -> Vec<u8> {
    let mut data = Vec::with_capacity(BUFFER_LENGTH);
    for position in TRIANGLE_POSITIONS {
        data.extend_from_slice(bytemuck::cast_slice(&position));
    }
    data.extend_from_slice(bytemuck::cast_slice(&[0u16, 1, 2]));
    data.extend_from_slice(&[0, 0]);
    data.extend_from_slice(bytemuck::cast_slice(&KEYFRAME_TIMES));
    for translation in KEYFRAME_TRANSLATIONS {
        data.extend_from_slice(bytemuck::cast_slice(&translation));
    }
    data
}

pub fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime_type};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// A one-triangle document with a parent node (translated) and a child node
/// (scaled). `buffer` is the single entry of the `buffers` array.
pub fn triangle_doc(buffer: Value) -> Value {
    json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [
            { "name": "tri", "mesh": 0, "translation": [1.0, 2.0, 3.0], "children": [1] },
            { "name": "child", "scale": [2.0, 2.0, 2.0] }
        ],
        "meshes": [{
            "name": "triangle",
            "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }]
        }],
        "buffers": [buffer],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 },
            { "buffer": 0, "byteOffset": 44, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 52, "byteLength": 24 }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" },
            {
                "bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR",
                "min": [0.0], "max": [1.5]
            },
            { "bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3" }
        ]
    })
}

pub fn embedded_doc() -> Value {
    triangle_doc(json!({
        "byteLength": BUFFER_LENGTH,
        "uri": data_uri("application/octet-stream", &triangle_buffer())
    }))
}

pub fn external_doc(uri: &str) -> Value {
    triangle_doc(json!({ "byteLength": BUFFER_LENGTH, "uri": uri }))
}

pub fn embedded_triangle() -> Vec<u8> {
    to_bytes(&embedded_doc())
}

pub fn to_bytes(doc: &Value) -> Vec<u8> {
    serde_json::to_vec(doc).unwrap()
}

/// Binary container with `doc` as the JSON chunk and `bin` as the BIN chunk.
pub fn glb(doc: &Value, bin: &[u8]) -> Vec<u8> {
    let mut json = serde_json::to_vec(doc).unwrap();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let total = 12 + 8 + json.len() + 8 + bin.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(b"BIN\0");
    out.extend_from_slice(&bin);
    out
}

pub fn triangle_glb() -> Vec<u8> {
    glb(
        &triangle_doc(json!({ "byteLength": BUFFER_LENGTH })),
        &triangle_buffer(),
    )
}

/// Mark the triangle primitive as draco compressed. The plain accessors stay
/// in place as the uncompressed fallback.
pub fn with_draco(mut doc: Value, required: bool) -> Value {
    doc["meshes"][0]["primitives"][0]["extensions"] = json!({
        "KHR_draco_mesh_compression": {
            "bufferView": 3,
            "attributes": { "POSITION": 0 }
        }
    });
    doc["extensionsUsed"] = json!(["KHR_draco_mesh_compression"]);
    if required {
        doc["extensionsRequired"] = json!(["KHR_draco_mesh_compression"]);
    }
    doc
}

/// Animate the translation of the root node with the keyframes in the buffer.
pub fn with_animation(mut doc: Value) -> Value {
    doc["animations"] = json!([{
        "name": "bob",
        "channels": [{ "sampler": 0, "target": { "node": 0, "path": "translation" } }],
        "samplers": [{ "input": 2, "output": 3, "interpolation": "LINEAR" }]
    }]);
    doc
}

pub fn with_image(mut doc: Value, uri: &str) -> Value {
    doc["images"] = json!([{ "name": "albedo", "uri": uri }]);
    doc
}

/// A solid 2x2 PNG.
pub fn png(rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Bytes that look like a KTX2 container to the pipeline.
pub fn ktx2_stub() -> Vec<u8> {
    let mut bytes = vec![
        0xAB, 0x4B, 0x54, 0x58, 0x20, 0x32, 0x30, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
    ];
    bytes.extend_from_slice(&[0u8; 20]);
    bytes
}
