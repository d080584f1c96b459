//! Per-asset notifications out of a [`crate::queue::QueueManager`].
//!
//! Implement [`LoadObserver`] for direct callbacks, or use a [`ChannelObserver`]
//! to receive the same notifications as [`LoadEvent`]s on a channel.

use futures::channel::mpsc;

use crate::{data_structures::scene_graph::DecodedAsset, error::LoadError, transport::Progress};

/// Callbacks fired by the queue. All methods default to doing nothing.
///
/// Completion callbacks do not arrive in submission order; only admission is
/// FIFO. Ownership of the decoded asset or the error moves to the observer.
pub trait LoadObserver {
    /// `id` left the pending queue and is being fetched.
    fn on_dispatched(&self, _id: &str) {}

    fn on_progress(&self, _id: &str, _progress: Progress) {}

    fn on_loaded(&self, _id: &str, _asset: DecodedAsset) {}

    fn on_failed(&self, _id: &str, _error: LoadError) {}
}

/// Ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl LoadObserver for NoopObserver {}

#[derive(Debug)]
pub enum LoadEvent {
    Dispatched { id: String },
    Progress { id: String, progress: Progress },
    Loaded { id: String, asset: DecodedAsset },
    Failed { id: String, error: LoadError },
}

impl LoadEvent {
    pub fn id(&self) -> &str {
        match self {
            LoadEvent::Dispatched { id }
            | LoadEvent::Progress { id, .. }
            | LoadEvent::Loaded { id, .. }
            | LoadEvent::Failed { id, .. } => id,
        }
    }

    /// Whether this event settles a request (success or failure).
    pub fn is_settled(&self) -> bool {
        matches!(self, LoadEvent::Loaded { .. } | LoadEvent::Failed { .. })
    }
}

/// Forwards notifications over an unbounded channel. Events sent after the
/// receiver is gone are dropped.
#[derive(Clone, Debug)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<LoadEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LoadEvent>) {
        let (sender, receiver) = mpsc::unbounded();
        (Self { sender }, receiver)
    }

    fn send(&self, event: LoadEvent) {
        if let Err(err) = self.sender.unbounded_send(event) {
            log::debug!("load event for {} dropped, receiver closed", err.into_inner().id());
        }
    }
}

impl LoadObserver for ChannelObserver {
    fn on_dispatched(&self, id: &str) {
        self.send(LoadEvent::Dispatched { id: id.to_string() });
    }

    fn on_progress(&self, id: &str, progress: Progress) {
        self.send(LoadEvent::Progress {
            id: id.to_string(),
            progress,
        });
    }

    fn on_loaded(&self, id: &str, asset: DecodedAsset) {
        self.send(LoadEvent::Loaded {
            id: id.to_string(),
            asset,
        });
    }

    fn on_failed(&self, id: &str, error: LoadError) {
        self.send(LoadEvent::Failed {
            id: id.to_string(),
            error,
        });
    }
}
