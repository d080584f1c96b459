//! Device capability profiles.
//!
//! A [`CapabilityProfile`] bounds how many assets a [`crate::queue::QueueManager`]
//! keeps in flight and how long it waits after a settled load before admitting
//! the next one. Profiles are plain values: resolve one per process from a
//! [`DeviceClass`] and hand a copy to every session.

use instant::Duration;

/// Coarse classification of the host device.
///
/// The classification is supplied by whoever profiles the runtime (see
/// [`crate::config::probe_constrained`]). An unknown signal maps to
/// [`DeviceClass::Unconstrained`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// Low memory hosts such as phones or small tablets.
    Constrained,
    #[default]
    Unconstrained,
}

impl DeviceClass {
    pub fn from_signal(constrained: Option<bool>) -> Self {
        match constrained {
            Some(true) => Self::Constrained,
            Some(false) | None => Self::Unconstrained,
        }
    }

    pub fn is_constrained(self) -> bool {
        self == Self::Constrained
    }
}

/// Concurrency cap and inter-load pacing for one device class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapabilityProfile {
    concurrency_cap: usize,
    pacing_delay: Duration,
}

impl CapabilityProfile {
    pub const CONSTRAINED: Self = Self {
        concurrency_cap: 2,
        pacing_delay: Duration::from_millis(250),
    };

    pub const UNCONSTRAINED: Self = Self {
        concurrency_cap: 4,
        pacing_delay: Duration::from_millis(100),
    };

    /// Map a device class to its profile.
    ///
    /// Safe to call repeatedly, but callers should keep the result for the
    /// lifetime of their sessions rather than re-resolving per batch.
    pub fn resolve(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Constrained => Self::CONSTRAINED,
            DeviceClass::Unconstrained => Self::UNCONSTRAINED,
        }
    }

    /// Shorthand for `resolve(DeviceClass::from_signal(constrained))`.
    pub fn for_signal(constrained: Option<bool>) -> Self {
        Self::resolve(DeviceClass::from_signal(constrained))
    }

    /// Build a profile outside the two presets. A cap of zero is raised to one
    /// so a session can always make progress.
    pub fn custom(concurrency_cap: usize, pacing_delay: Duration) -> Self {
        Self {
            concurrency_cap: concurrency_cap.max(1),
            pacing_delay,
        }
    }

    pub fn concurrency_cap(&self) -> usize {
        self.concurrency_cap
    }

    pub fn pacing_delay(&self) -> Duration {
        self.pacing_delay
    }

    pub fn with_concurrency_cap(self, concurrency_cap: usize) -> Self {
        Self::custom(concurrency_cap, self.pacing_delay)
    }

    pub fn with_pacing_delay(self, pacing_delay: Duration) -> Self {
        Self::custom(self.concurrency_cap, pacing_delay)
    }
}

impl Default for CapabilityProfile {
    fn default() -> Self {
        Self::UNCONSTRAINED
    }
}
