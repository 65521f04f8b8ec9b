//! Registry behaviour with real symlinks and concurrent hotplug.

#![cfg(unix)]

mod common;

use common::{DevTree, identify, next_event, remote_for};
use lockerlink_hardware::mock::MockPortOpener;
use lockerlink_hardware::{
    DeviceEvent, DeviceEvents, DeviceRegistry, PortOpener, TagCommand, event_channel,
};
use std::sync::Arc;

fn registry(tree: &DevTree) -> (Arc<MockPortOpener>, Arc<DeviceRegistry>, DeviceEvents) {
    let opener = Arc::new(MockPortOpener::new());
    let (sink, events) = event_channel(32);
    let registry = DeviceRegistry::new(
        tree.config(),
        Arc::clone(&opener) as Arc<dyn PortOpener>,
        sink,
    );
    (opener, registry, events)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_connects_through_two_links_keep_one_port() {
    let tree = DevTree::new();
    let first = tree.plug("ttyACM0", "platform-usb-0:1.2:1.0");
    let second = tree.plug("ttyACM0", "platform-usb-0:1.2:1.0-alias");
    let (_opener, registry, _events) = registry(&tree);

    let mut tasks = Vec::new();
    for i in 0..8 {
        let registry = Arc::clone(&registry);
        let link = if i % 2 == 0 { first.clone() } else { second.clone() };
        tasks.push(tokio::spawn(async move { registry.handle_connect(&link).await }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(registry.open_port_count().await, 1);
    let devices = registry.devices().await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].real_path, tree.root.join("ttyACM0"));
    assert_eq!(devices[0].links, vec![first, second]);
}

#[tokio::test]
async fn two_readers_are_tracked_independently() {
    let tree = DevTree::new();
    let (opener, registry, mut events) = registry(&tree);
    tree.plug("ttyACM0", "usb-1");
    tree.plug("ttyACM1", "usb-2");

    assert_eq!(registry.enumerate(&tree.links).await, 2);

    let mut a = remote_for(&opener, &tree.root.join("ttyACM0")).await;
    let mut b = remote_for(&opener, &tree.root.join("ttyACM1")).await;
    identify(&mut a, "AAAA").await;
    next_event(&mut events).await;
    identify(&mut b, "BBBB").await;
    next_event(&mut events).await;

    registry
        .send_command("BBBB", TagCommand::GetBatteryCharge)
        .await
        .unwrap();
    assert_eq!(b.read_line().await.as_deref(), Some("GBATTCHARGE"));

    b.send("BATTCHARGE=55;").await.unwrap();
    assert_eq!(
        next_event(&mut events).await,
        DeviceEvent::ChargeReceived {
            identity: Some("BBBB".to_string()),
            charge: "55".to_string(),
        }
    );
}

#[tokio::test]
async fn removing_one_alias_forgets_the_device() {
    let tree = DevTree::new();
    let (opener, registry, mut events) = registry(&tree);
    let first = tree.plug("ttyACM0", "usb-1");
    let second = tree.plug("ttyACM0", "usb-1-alias");
    registry.connect(&first).await.unwrap();
    registry.connect(&second).await.unwrap();

    let mut remote = remote_for(&opener, &tree.root.join("ttyACM0")).await;
    identify(&mut remote, "T-1").await;
    next_event(&mut events).await;

    registry.handle_disconnect(&first).await;
    assert!(matches!(
        next_event(&mut events).await,
        DeviceEvent::Disconnected { identity, .. } if identity == "T-1"
    ));
    assert!(registry.devices().await.is_empty());

    // The other alias is already forgotten, so its removal is silent
    registry.handle_disconnect(&second).await;
    assert!(events.try_recv().is_none());
}

#[tokio::test]
async fn reconnect_after_unplug_reprobes() {
    let tree = DevTree::new();
    let (opener, registry, mut events) = registry(&tree);
    let link = tree.plug("ttyACM0", "usb-1");
    let real = tree.root.join("ttyACM0");

    registry.handle_connect(&link).await;
    let mut remote = remote_for(&opener, &real).await;
    identify(&mut remote, "T-1").await;
    next_event(&mut events).await;

    tree.unplug("usb-1");
    registry.handle_disconnect(&link).await;
    next_event(&mut events).await;

    let link = tree.plug("ttyACM0", "usb-1");
    registry.handle_connect(&link).await;
    let mut remote = remote_for(&opener, &real).await;
    identify(&mut remote, "T-1").await;
    assert!(matches!(
        next_event(&mut events).await,
        DeviceEvent::Connected { identity, .. } if identity == "T-1"
    ));
    assert_eq!(opener.open_count_for(&real), 2);
}
