//! Data produced by the decode pipeline.
//!
//! - `animation` holds keyframe tracks read from glTF animation channels
//! - `instance` holds decomposed node transforms and their composition
//! - `mesh` contains vertices, meshes, models and materials
//! - `scene_graph` ties them together into a [`scene_graph::SceneFragment`]
//! - `texture` contains decoded, transcoded or passed-through image data

pub mod animation;
pub mod instance;
pub mod mesh;
pub mod scene_graph;
pub mod texture;
