//! Memory-pressure driven reclamation.

mod common;

use cext_bridge::{BridgeConfig, ObjectRef};
use common::{start_bridge, start_bridge_with, wait_for_passes};

#[tokio::test]
async fn test_each_clear_event_triggers_one_pass() {
    let (bridge, native) = start_bridge();
    assert!(bridge.reaper().is_armed());

    let obj = ObjectRef::new("pressured");
    bridge.create_handle(&obj).unwrap();
    native.reclaim(&obj);

    // First clearing event
    assert_eq!(bridge.pressure().signal(), 1);
    let stats = wait_for_passes(bridge.coordinator(), 1).await;
    assert_eq!(stats.passes_run(), 1);
    assert!(bridge.lookup(&obj).is_none());
    assert!(!bridge.reaper().is_armed());

    // Leaving native code re-arms the reaper
    drop(bridge.enter_native());
    assert!(bridge.reaper().is_armed());

    // Second clearing event
    assert_eq!(bridge.pressure().signal(), 1);
    let stats = wait_for_passes(bridge.coordinator(), 2).await;
    assert_eq!(stats.passes_run(), 2);

    assert_eq!(bridge.reaper().fired(), 2);
    assert_eq!(native.steps(), 2);
    assert_eq!(bridge.coordinator().stats().passes_run(), 2);
}

#[tokio::test]
async fn test_clear_without_rearm_does_not_trigger() {
    let (bridge, native) = start_bridge();

    bridge.pressure().signal();
    wait_for_passes(bridge.coordinator(), 1).await;

    // Not re-armed: a second signal finds nothing to clear
    assert_eq!(bridge.pressure().signal(), 0);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(bridge.reaper().fired(), 1);
    assert_eq!(native.steps(), 1);
}

#[tokio::test]
async fn test_external_memory_over_soft_limit_triggers_pass() {
    let (bridge, native) = start_bridge_with(BridgeConfig::default().with_pressure_soft_limit(4096));
    let obj = ObjectRef::new([0u8; 8]);
    bridge.create_handle(&obj).unwrap();
    native.reclaim(&obj);

    let first = bridge.track_external_memory(2048);
    assert!(bridge.reaper().is_armed());
    assert_eq!(bridge.coordinator().stats().passes_run(), 0);

    let second = bridge.track_external_memory(2048);
    assert_eq!(bridge.pressure().tracked_bytes(), 4096);

    let stats = wait_for_passes(bridge.coordinator(), 1).await;
    assert_eq!(stats.objects_reclaimed, 1);
    assert!(bridge.lookup(&obj).is_none());

    drop(first);
    drop(second);
    assert_eq!(bridge.pressure().tracked_bytes(), 0);
}

#[tokio::test]
async fn test_zero_soft_limit_disables_automatic_clearing() {
    let (bridge, native) = start_bridge_with(BridgeConfig::default().with_pressure_soft_limit(0));

    let _guard = bridge.track_external_memory(1 << 30);
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    assert!(bridge.reaper().is_armed());
    assert_eq!(native.steps(), 0);
}
