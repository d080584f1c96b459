use std::{collections::HashMap, path::PathBuf, time::Duration};

use flow_stream::{
    CapabilityProfile, DeviceClass, LoaderConfig,
    config::{CONSTRAINED_VAR, MAX_CONCURRENT_VAR, PACING_MS_VAR},
};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn constrained_devices_get_two_slots_and_slow_pacing() {
    let profile = CapabilityProfile::resolve(DeviceClass::Constrained);
    assert_eq!(profile.concurrency_cap(), 2);
    assert_eq!(profile.pacing_delay(), Duration::from_millis(250));
}

#[test]
fn unconstrained_devices_get_four_slots_and_fast_pacing() {
    let profile = CapabilityProfile::resolve(DeviceClass::Unconstrained);
    assert_eq!(profile.concurrency_cap(), 4);
    assert_eq!(profile.pacing_delay(), Duration::from_millis(100));
}

#[test]
fn an_unknown_signal_is_unconstrained() {
    assert_eq!(DeviceClass::from_signal(None), DeviceClass::Unconstrained);
    assert_eq!(CapabilityProfile::for_signal(None), CapabilityProfile::UNCONSTRAINED);
    assert_eq!(CapabilityProfile::for_signal(Some(true)), CapabilityProfile::CONSTRAINED);
    assert_eq!(CapabilityProfile::default(), CapabilityProfile::UNCONSTRAINED);
    assert!(DeviceClass::Constrained.is_constrained());
}

#[test]
fn resolving_twice_gives_the_same_profile() {
    let class = DeviceClass::from_signal(Some(true));
    assert_eq!(CapabilityProfile::resolve(class), CapabilityProfile::resolve(class));
}

#[test]
fn custom_profiles_keep_at_least_one_slot() {
    let profile = CapabilityProfile::custom(0, Duration::ZERO);
    assert_eq!(profile.concurrency_cap(), 1);
    let profile = CapabilityProfile::CONSTRAINED.with_concurrency_cap(8);
    assert_eq!(profile.concurrency_cap(), 8);
    assert_eq!(profile.pacing_delay(), Duration::from_millis(250));
}

#[test]
fn empty_lookup_gives_the_default_config() {
    let config = LoaderConfig::from_lookup(|_| None).unwrap();
    assert_eq!(config, LoaderConfig::default());
}

#[test]
fn config_reads_every_variable() {
    let config = LoaderConfig::from_lookup(lookup(&[
        ("FLOW_STREAM_ASSET_ROOT", "/srv/assets"),
        ("FLOW_STREAM_BASE_URL", "https://cdn.example.com/scenes/"),
        (CONSTRAINED_VAR, "yes"),
        (MAX_CONCURRENT_VAR, " 3 "),
        (PACING_MS_VAR, "40"),
    ]))
    .unwrap();

    assert_eq!(config.asset_root, Some(PathBuf::from("/srv/assets")));
    assert_eq!(config.base_url.as_deref(), Some("https://cdn.example.com/scenes/"));
    assert_eq!(config.constrained, Some(true));
    assert_eq!(config.max_concurrent, Some(3));
    assert_eq!(config.pacing, Some(Duration::from_millis(40)));
}

#[test]
fn explicit_signal_and_overrides_shape_the_profile() {
    let config = LoaderConfig::from_lookup(lookup(&[(CONSTRAINED_VAR, "true")])).unwrap();
    assert_eq!(config.device_class(), DeviceClass::Constrained);
    assert_eq!(config.profile(), CapabilityProfile::CONSTRAINED);

    let config = LoaderConfig::from_lookup(lookup(&[
        (CONSTRAINED_VAR, "false"),
        (PACING_MS_VAR, "0"),
    ]))
    .unwrap();
    assert_eq!(config.profile(), CapabilityProfile::custom(4, Duration::ZERO));

    let config = LoaderConfig {
        constrained: Some(true),
        max_concurrent: Some(0),
        ..Default::default()
    };
    assert_eq!(config.profile().concurrency_cap(), 1);
}

#[test]
fn blank_values_count_as_unset() {
    let config = LoaderConfig::from_lookup(lookup(&[(CONSTRAINED_VAR, "  "), (PACING_MS_VAR, "")])).unwrap();
    assert_eq!(config.constrained, None);
    assert_eq!(config.pacing, None);
}

#[test]
fn malformed_values_are_rejected() {
    let err = LoaderConfig::from_lookup(lookup(&[(MAX_CONCURRENT_VAR, "many")])).unwrap_err();
    assert!(format!("{err}").contains(MAX_CONCURRENT_VAR));
    assert!(LoaderConfig::from_lookup(lookup(&[(CONSTRAINED_VAR, "sometimes")])).is_err());
    assert!(LoaderConfig::from_lookup(lookup(&[(PACING_MS_VAR, "-5")])).is_err());
}

#[test]
fn configured_asset_root_is_used_by_the_transport() {
    let config = LoaderConfig {
        asset_root: Some(PathBuf::from("/srv/assets")),
        ..Default::default()
    };
    // only checks construction, reading is covered by the file transport tests
    assert!(config.transport().is_ok());
}
