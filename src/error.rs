//! Per-asset load errors.
//!
//! Every step of the decode pipeline returns `anyhow::Result` internally. At the
//! pipeline boundary a failure is tagged with the asset identifier and the
//! [`Stage`] it happened in. Errors never abort a batch: the queue reports them
//! to the observer and keeps draining.

use std::fmt;

use thiserror::Error;

/// The pipeline step a [`LoadError`] originates from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Fetching the container or one of its external resources.
    Transport,
    /// Parsing or validating the glTF/GLB container and its buffers.
    Container,
    /// Decompressing or reading primitive geometry.
    Geometry,
    /// Transcoding or decoding images.
    Texture,
    /// Building the scene fragment (nodes, materials, animations).
    Assembly,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Transport => "transport",
            Stage::Container => "container parse",
            Stage::Geometry => "geometry decode",
            Stage::Texture => "texture decode",
            Stage::Assembly => "scene assembly",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("failed to load `{id}` during {stage}: {source:#}")]
pub struct LoadError {
    pub id: String,
    pub stage: Stage,
    #[source]
    pub source: anyhow::Error,
}

impl LoadError {
    pub fn new(id: impl Into<String>, stage: Stage, source: anyhow::Error) -> Self {
        Self {
            id: id.into(),
            stage,
            source,
        }
    }

    /// Transport failures are the only ones a caller may reasonably retry
    /// as-is; everything else fails the same way on resubmission.
    pub fn is_transport(&self) -> bool {
        self.stage == Stage::Transport
    }

    pub fn is_decode(&self) -> bool {
        !self.is_transport()
    }
}

/// Tag an `anyhow::Result` with the stage it belongs to.
pub(crate) trait StageExt<T> {
    fn stage(self, id: &str, stage: Stage) -> Result<T, LoadError>;
}

impl<T> StageExt<T> for anyhow::Result<T> {
    fn stage(self, id: &str, stage: Stage) -> Result<T, LoadError> {
        self.map_err(|source| LoadError::new(id, stage, source))
    }
}
