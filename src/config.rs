//! Loader configuration.
//!
//! Every field is optional. Unset values fall back to the platform defaults:
//! the `./assets` directory (or `<origin>/assets/` on the web) and the profile
//! of the probed device class.

use std::path::PathBuf;

use anyhow::Context;
use instant::Duration;

use crate::{
    capability::{CapabilityProfile, DeviceClass},
    transport::Transport,
};

pub const ASSET_ROOT_VAR: &str = "FLOW_STREAM_ASSET_ROOT";
pub const BASE_URL_VAR: &str = "FLOW_STREAM_BASE_URL";
pub const CONSTRAINED_VAR: &str = "FLOW_STREAM_CONSTRAINED";
pub const MAX_CONCURRENT_VAR: &str = "FLOW_STREAM_MAX_CONCURRENT";
pub const PACING_MS_VAR: &str = "FLOW_STREAM_PACING_MS";

/// Hosts with at most this much memory count as constrained.
const CONSTRAINED_MEMORY_BYTES: u64 = 4 * 1024 * 1024 * 1024;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Directory the native file transport reads from.
    pub asset_root: Option<PathBuf>,
    /// URL the web transport resolves identifiers against.
    pub base_url: Option<String>,
    /// Explicit device signal. `None` probes the host.
    pub constrained: Option<bool>,
    /// Overrides the profile's concurrency cap.
    pub max_concurrent: Option<usize>,
    /// Overrides the profile's pacing delay.
    pub pacing: Option<Duration>,
}

impl LoaderConfig {
    /// Read the `FLOW_STREAM_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let constrained = get(CONSTRAINED_VAR)
            .map(|value| parse_bool(&value).with_context(|| format!("invalid {CONSTRAINED_VAR}")))
            .transpose()?;
        let max_concurrent = get(MAX_CONCURRENT_VAR)
            .map(|value| {
                value
                    .parse::<usize>()
                    .with_context(|| format!("invalid {MAX_CONCURRENT_VAR} `{value}`"))
            })
            .transpose()?;
        let pacing = get(PACING_MS_VAR)
            .map(|value| {
                value
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .with_context(|| format!("invalid {PACING_MS_VAR} `{value}`"))
            })
            .transpose()?;

        Ok(Self {
            asset_root: get(ASSET_ROOT_VAR).map(PathBuf::from),
            base_url: get(BASE_URL_VAR),
            constrained,
            max_concurrent,
            pacing,
        })
    }

    pub fn device_class(&self) -> DeviceClass {
        DeviceClass::from_signal(self.constrained.or_else(probe_constrained))
    }

    /// Resolve the profile for this host and apply the overrides.
    pub fn profile(&self) -> CapabilityProfile {
        let class = self.device_class();
        let mut profile = CapabilityProfile::resolve(class);
        if let Some(cap) = self.max_concurrent {
            profile = profile.with_concurrency_cap(cap);
        }
        if let Some(pacing) = self.pacing {
            profile = profile.with_pacing_delay(pacing);
        }
        log::info!(
            "{class:?} device: {} concurrent loads, {:?} pacing",
            profile.concurrency_cap(),
            profile.pacing_delay()
        );
        profile
    }

    /// The transport for this platform.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn transport(&self) -> anyhow::Result<impl Transport + 'static> {
        Ok(match &self.asset_root {
            Some(root) => crate::transport::FileTransport::new(root),
            None => crate::transport::FileTransport::default(),
        })
    }

    /// The transport for this platform.
    #[cfg(target_arch = "wasm32")]
    pub fn transport(&self) -> anyhow::Result<impl Transport + 'static> {
        match &self.base_url {
            Some(base) => crate::transport::HttpTransport::parse(base),
            None => crate::transport::HttpTransport::from_origin(),
        }
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got `{other}`"),
    }
}

/// Best-effort guess whether the host is memory constrained. `None` when the
/// platform does not tell.
#[cfg(not(target_arch = "wasm32"))]
pub fn probe_constrained() -> Option<bool> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    let total = mem_total_bytes(&meminfo)?;
    Some(total <= CONSTRAINED_MEMORY_BYTES)
}

/// Best-effort guess whether the host is memory constrained. `None` when the
/// browser does not expose `navigator.deviceMemory`.
#[cfg(target_arch = "wasm32")]
pub fn probe_constrained() -> Option<bool> {
    let navigator = web_sys::window()?.navigator();
    let memory = js_sys::Reflect::get(&navigator, &wasm_bindgen::JsValue::from_str("deviceMemory"))
        .ok()?
        .as_f64()?;
    // reported in GiB
    Some(memory * 1024.0 * 1024.0 * 1024.0 <= CONSTRAINED_MEMORY_BYTES as f64)
}

/// `MemTotal` from a `/proc/meminfo` dump, in bytes.
#[cfg_attr(target_arch = "wasm32", allow(dead_code))]
fn mem_total_bytes(meminfo: &str) -> Option<u64> {
    let line = meminfo.lines().find(|line| line.starts_with("MemTotal:"))?;
    let mut fields = line["MemTotal:".len()..].split_whitespace();
    let amount: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") | None => amount.checked_mul(1024),
        Some(_) => None,
    }
}
