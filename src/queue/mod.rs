//! Admission control for asset loads.
//!
//! A [`QueueManager`] is one load session: a FIFO of pending identifiers, a
//! count of loads in flight, and the set of identifiers that loaded
//! successfully. It admits pending identifiers into the [`DecodePipeline`]
//! while fewer than [`CapabilityProfile::concurrency_cap`] are in flight, and
//! after every settled load it waits [`CapabilityProfile::pacing_delay`] before
//! admitting again.
//!
//! Everything runs cooperatively on one thread. The batch future returned by
//! [`QueueManager::submit_batch`] drives the in-flight loads and pacing timers
//! itself; nothing is spawned. While it is pending the session can still be
//! queried, cleared or used for [`QueueManager::submit_single`] from other
//! futures on the same thread:
//!
//! ```ignore
//! let queue = QueueManager::new(pipeline, profile).with_observer(observer);
//! let batch = queue.submit_batch(["tower_a.glb", "tower_b.glb"]);
//! let lobby = queue.submit_single("lobby.glb");
//! let (_, lobby) = futures::join!(batch, lobby);
//! ```
//!
//! Dropping a batch future drops the loads it has in flight and frees their
//! slots. [`QueueManager::clear_queue`] only discards what has not been
//! admitted yet.

use std::{
    cell::RefCell,
    collections::{HashSet, VecDeque},
};

use futures::{
    FutureExt, StreamExt,
    future::LocalBoxFuture,
    stream::FuturesUnordered,
};
use futures_intrusive::sync::LocalManualResetEvent;
use instant::Duration;

use crate::{
    capability::CapabilityProfile,
    data_structures::scene_graph::DecodedAsset,
    error::LoadError,
    pipeline::DecodePipeline,
    timer::{self, Instant},
};

pub mod observer;

pub use observer::{ChannelObserver, LoadEvent, LoadObserver, NoopObserver};

#[derive(Debug, Default)]
struct SessionState {
    pending: VecDeque<String>,
    in_flight: usize,
    completed: HashSet<String>,
    /// End of the pacing window opened by the latest settlement.
    paced_until: Option<Instant>,
}

impl SessionState {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }
}

enum Step {
    Settled {
        id: String,
        outcome: Result<DecodedAsset, LoadError>,
        elapsed: Duration,
    },
    SlotReady,
}

/// Gives the slot back when an in-flight load is dropped before it settles,
/// which happens when its batch future is dropped.
struct SlotGuard<'a> {
    queue: &'a QueueManager,
    armed: bool,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.queue.state.try_borrow_mut() {
            state.in_flight = state.in_flight.saturating_sub(1);
            log::debug!("in-flight load dropped before settling");
        }
        self.queue.released.set();
    }
}

/// Wakes batch futures waiting on this session when a draining batch goes
/// away, so one of them takes over its pending work.
struct ReleaseOnDrop<'a>(&'a LocalManualResetEvent);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set();
    }
}

pub struct QueueManager {
    pipeline: DecodePipeline,
    profile: CapabilityProfile,
    observer: Box<dyn LoadObserver>,
    state: RefCell<SessionState>,
    drained: LocalManualResetEvent,
    released: LocalManualResetEvent,
}

impl QueueManager {
    pub fn new(pipeline: DecodePipeline, profile: CapabilityProfile) -> Self {
        Self {
            pipeline,
            profile,
            observer: Box::new(NoopObserver),
            state: RefCell::new(SessionState::default()),
            drained: LocalManualResetEvent::new(true),
            released: LocalManualResetEvent::new(false),
        }
    }

    pub fn with_observer(mut self, observer: impl LoadObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn profile(&self) -> CapabilityProfile {
        self.profile
    }

    pub fn pipeline(&self) -> &DecodePipeline {
        &self.pipeline
    }

    /// Enqueue `ids` and drain the session.
    ///
    /// The identifiers are enqueued immediately, before the returned future is
    /// first polled; admission starts on the first poll. Duplicates are kept.
    /// The future resolves once nothing is pending and nothing is in flight,
    /// whatever the individual outcomes were. Calling this while an earlier
    /// batch is still draining appends to the same queue.
    pub fn submit_batch<I, S>(&self, ids: I) -> LocalBoxFuture<'_, ()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut state = self.state.borrow_mut();
            let before = state.pending.len();
            state.pending.extend(ids.into_iter().map(Into::into));
            let added = state.pending.len() - before;
            if added > 0 {
                log::debug!("queued {added} assets, {} pending", state.pending.len());
                self.drained.reset();
            }
        }
        self.drain().boxed_local()
    }

    /// Load one asset right away, outside the queue.
    ///
    /// This does not take a slot, so together with a running batch more than
    /// `concurrency_cap` loads can be in flight. Progress goes to the observer;
    /// the outcome is returned instead of being reported. Successful loads
    /// count towards [`Self::loaded_count`].
    pub async fn submit_single(&self, id: impl Into<String>) -> Result<DecodedAsset, LoadError> {
        let id = id.into();
        let started = Instant::now();
        let progress = |progress| self.observer.on_progress(&id, progress);
        let outcome = self.pipeline.load(&id, &progress).await;
        match &outcome {
            Ok(asset) => {
                log::info!(
                    "loaded {id} ({} bytes) in {:?} outside the queue",
                    asset.byte_length,
                    started.elapsed()
                );
                self.state.borrow_mut().completed.insert(id);
            }
            Err(err) => log::warn!("{err}"),
        }
        outcome
    }

    /// Distinct identifiers that loaded successfully during this session.
    pub fn loaded_count(&self) -> usize {
        self.state.borrow().completed.len()
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.state.borrow().completed.contains(id)
    }

    pub fn is_loading(&self) -> bool {
        !self.state.borrow().is_idle()
    }

    pub fn in_flight(&self) -> usize {
        self.state.borrow().in_flight
    }

    pub fn pending_len(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Drop every request that has not been admitted yet. Loads already in
    /// flight keep running and are reported as usual.
    pub fn clear_queue(&self) {
        let mut state = self.state.borrow_mut();
        let dropped = state.pending.len();
        state.pending.clear();
        if dropped > 0 {
            log::info!("cleared {dropped} pending assets, {} still in flight", state.in_flight);
        }
    }

    async fn drain(&self) {
        let _release = ReleaseOnDrop(&self.released);
        let mut tasks: FuturesUnordered<LocalBoxFuture<'_, Step>> = FuturesUnordered::new();
        self.admit_unpaced(&mut tasks);
        loop {
            if self.mark_if_idle() {
                return;
            }
            match tasks.next().await {
                Some(Step::Settled {
                    id,
                    outcome,
                    elapsed,
                }) => {
                    self.settle(id, outcome, elapsed);
                    let delay = self.profile.pacing_delay();
                    tasks.push(timer::sleep(delay).map(|_| Step::SlotReady).boxed_local());
                }
                Some(Step::SlotReady) => {
                    self.admit(&mut tasks);
                }
                None => {
                    // The remaining work belongs to another batch future on this session.
                    if self.admit_unpaced(&mut tasks) == 0 {
                        self.wait_for_session().await;
                    }
                }
            }
        }
    }

    /// Wait until the session drains, another batch future lets go of its
    /// work, or the current pacing window closes.
    async fn wait_for_session(&self) {
        let mut wake: Vec<LocalBoxFuture<'_, ()>> = vec![
            self.drained.wait().boxed_local(),
            self.released.wait().boxed_local(),
        ];
        if let Some(remaining) = self.pacing_remaining() {
            wake.push(timer::sleep(remaining).boxed_local());
        }
        futures::future::select_all(wake).await;
        self.released.reset();
    }

    fn pacing_remaining(&self) -> Option<Duration> {
        let until = self.state.borrow().paced_until?;
        let now = Instant::now();
        (until > now).then(|| until - now)
    }

    /// Admit only if no settlement is still inside its pacing window. Used by
    /// batch futures that do not own the pacing timers.
    fn admit_unpaced<'a>(&'a self, tasks: &mut FuturesUnordered<LocalBoxFuture<'a, Step>>) -> usize {
        if self.pacing_remaining().is_some() {
            return 0;
        }
        self.admit(tasks)
    }

    fn mark_if_idle(&self) -> bool {
        let idle = self.state.borrow().is_idle();
        if idle {
            self.drained.set();
        }
        idle
    }

    /// Admit pending requests until the cap is reached. Returns how many were
    /// admitted.
    fn admit<'a>(&'a self, tasks: &mut FuturesUnordered<LocalBoxFuture<'a, Step>>) -> usize {
        let mut admitted = 0;
        loop {
            let id = {
                let mut state = self.state.borrow_mut();
                if state.in_flight >= self.profile.concurrency_cap() {
                    break;
                }
                let Some(id) = state.pending.pop_front() else {
                    break;
                };
                state.in_flight += 1;
                log::debug!(
                    "dispatching {id} ({}/{} in flight)",
                    state.in_flight,
                    self.profile.concurrency_cap()
                );
                id
            };
            self.observer.on_dispatched(&id);
            tasks.push(self.dispatch(id).boxed_local());
            admitted += 1;
        }
        admitted
    }

    async fn dispatch(&self, id: String) -> Step {
        let mut slot = SlotGuard {
            queue: self,
            armed: true,
        };
        let started = Instant::now();
        let progress = |progress| self.observer.on_progress(&id, progress);
        let outcome = self.pipeline.load(&id, &progress).await;
        // settle() releases the slot from here on
        slot.armed = false;
        Step::Settled {
            id,
            outcome,
            elapsed: started.elapsed(),
        }
    }

    fn settle(&self, id: String, outcome: Result<DecodedAsset, LoadError>, elapsed: Duration) {
        {
            let mut state = self.state.borrow_mut();
            state.in_flight -= 1;
            let until = Instant::now() + self.profile.pacing_delay();
            state.paced_until = Some(state.paced_until.map_or(until, |current| current.max(until)));
            if outcome.is_ok() {
                state.completed.insert(id.clone());
            }
        }
        match outcome {
            Ok(asset) => {
                log::info!("loaded {id} ({} bytes) in {elapsed:?}", asset.byte_length);
                self.observer.on_loaded(&id, asset);
            }
            Err(err) => {
                log::warn!("{err}");
                self.observer.on_failed(&id, err);
            }
        }
    }
}
