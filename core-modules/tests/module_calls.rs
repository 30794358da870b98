//! Typed module calls against the in-process host.

use std::sync::{Arc, Mutex};

use bridge_desktop::{HostReply, InProcessHost};
use bridge_traits::{BridgeError, HostPrimitive, StaticHostLocator};
use core_bridge::events::ModuleEventBus;
use core_bridge::Error;
use core_modules::ble::{
    BleCharacteristicReceivedPayload, BleConnectionState, BleEvents, BleModule,
    CharacteristicReceived, ConnectOptions, ConnectionStateChanged, ScanOptions,
};
use core_modules::permission::{PermissionModule, PermissionName, PermissionStatus};
use core_modules::theme::{
    ResolvedTheme, ThemeChange, ThemeChangePayload, ThemeEvents, ThemeMode, ThemeModule,
};
use core_modules::InvocationResult;
use serde_json::{json, Value};

type Calls = Arc<Mutex<Vec<Vec<Value>>>>;

fn host_with_locator() -> (Arc<InProcessHost>, Arc<StaticHostLocator>) {
    let host = Arc::new(InProcessHost::new());
    let locator = Arc::new(StaticHostLocator::new(host.clone()));
    (host, locator)
}

fn record_calls(host: &InProcessHost, module: &str, method: &str, reply: Value) -> Calls {
    let calls: Calls = Arc::default();
    let sink = Arc::clone(&calls);
    host.register_method(module, method, move |args| {
        sink.lock().unwrap().push(args);
        let reply = reply.clone();
        async move { Ok(reply) }
    });
    calls
}

#[tokio::test]
async fn test_start_scan_sends_options_and_resolves_unit() {
    let (host, locator) = host_with_locator();
    let calls = record_calls(&host, "Ble", "startScan", json!({ "type": "ok" }));
    let ble = BleModule::with_locator(locator);

    let result = ble
        .start_scan(Some(ScanOptions {
            with_names: Some(vec!["HR Strap".into()]),
            timeout: Some(5),
            ..Default::default()
        }))
        .await
        .unwrap();

    assert_eq!(result, InvocationResult::Success(()));
    assert_eq!(
        *calls.lock().unwrap(),
        vec![vec![json!({ "withNames": ["HR Strap"], "timeout": 5 })]]
    );
}

#[tokio::test]
async fn test_absent_options_are_sent_as_null() {
    let (host, locator) = host_with_locator();
    let calls = record_calls(&host, "Ble", "connect", json!({ "type": "ok", "value": null }));
    let ble = BleModule::with_locator(locator);

    ble.connect("AA:BB", None).await.unwrap();
    ble.connect(
        "AA:BB",
        Some(ConnectOptions {
            mtu: Some(247),
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            vec![json!("AA:BB"), Value::Null],
            vec![json!("AA:BB"), json!({ "mtu": 247 })]
        ]
    );
}

#[tokio::test]
async fn test_read_and_write_characteristic_bytes() {
    let (host, locator) = host_with_locator();
    host.register_method("Ble", "readCharacteristic", |_| async {
        HostReply::ok(vec![0x01u8, 0x5a])
    });
    let writes = record_calls(&host, "Ble", "writeCharacteristic", json!({ "type": "ok" }));
    let ble = BleModule::with_locator(locator);

    let read = ble
        .read_characteristic("AA:BB", "180d", "2a37", None)
        .await
        .unwrap();
    ble.write_characteristic("AA:BB", "180d", "2a39", &[1, 0], None)
        .await
        .unwrap();

    assert_eq!(read, InvocationResult::Success(vec![0x01, 0x5a]));
    assert_eq!(
        writes.lock().unwrap()[0],
        vec![json!("AA:BB"), json!("180d"), json!("2a39"), json!([1, 0]), Value::Null]
    );
}

#[tokio::test]
async fn test_module_failures_are_values() {
    let (host, locator) = host_with_locator();
    host.register_method("Ble", "turnOn", |_| async { HostReply::err("Bluetooth permission denied") });
    host.register_method("Ble", "getAdapterState", |_| async { Ok(json!({ "type": "err" })) });
    host.register_method("Ble", "isSupported", |_| async { Ok(json!("yes")) });
    let ble = BleModule::with_locator(locator);

    assert_eq!(
        ble.turn_on().await.unwrap(),
        InvocationResult::failure("Bluetooth permission denied")
    );
    assert_eq!(
        ble.get_adapter_state().await.unwrap(),
        InvocationResult::failure("Unknown error")
    );
    assert_eq!(
        ble.is_supported().await.unwrap(),
        InvocationResult::failure("Invalid response")
    );
    assert_eq!(
        ble.stop_scan().await.unwrap(),
        InvocationResult::failure("Method not found: Ble.stopScan")
    );
}

#[tokio::test]
async fn test_wrongly_typed_value_is_invalid_response() {
    let (host, locator) = host_with_locator();
    host.register_method("Ble", "getConnectedDevices", |_| async {
        HostReply::ok(json!([{ "remoteId": "AA:BB" }]))
    });
    let ble = BleModule::with_locator(locator);

    assert_eq!(
        ble.get_connected_devices().await.unwrap(),
        InvocationResult::failure("Invalid response")
    );
}

#[tokio::test]
async fn test_transport_failure_is_an_error() {
    let (host, locator) = host_with_locator();
    host.register_method("Theme", "getTheme", |_| async {
        Err(BridgeError::OperationFailed("engine detached".into()))
    });
    let theme = ThemeModule::with_locator(locator);

    let result = theme.get_theme().await;
    assert!(matches!(result, Err(Error::Transport(_))));
}

#[tokio::test]
async fn test_host_without_invoke_primitive() {
    let host = Arc::new(InProcessHost::new().without_primitive(HostPrimitive::InvokeModuleAsync));
    let theme = ThemeModule::with_locator(Arc::new(StaticHostLocator::new(host)));

    assert_eq!(
        theme.get_system_theme().await.unwrap(),
        InvocationResult::failure("WebF invokeModuleAsync is not available")
    );
}

#[tokio::test]
async fn test_theme_calls() {
    let (host, locator) = host_with_locator();
    host.register_method("Theme", "getSystemTheme", |_| async { HostReply::ok("dark") });
    let set_calls = record_calls(&host, "Theme", "setTheme", json!({ "type": "ok" }));
    let theme = ThemeModule::with_locator(locator);

    assert_eq!(
        theme.get_system_theme().await.unwrap(),
        InvocationResult::Success(ResolvedTheme::Dark)
    );
    assert!(theme.set_theme(ThemeMode::System).await.unwrap().is_success());
    assert_eq!(*set_calls.lock().unwrap(), vec![vec![json!("system")]]);
}

#[tokio::test]
async fn test_permission_calls() {
    let (host, locator) = host_with_locator();
    let checks = record_calls(
        &host,
        "PermissionHandler",
        "checkStatus",
        json!({ "type": "ok", "value": "permanentlyDenied" }),
    );
    let multiple = record_calls(
        &host,
        "PermissionHandler",
        "requestMultiple",
        json!({ "type": "ok", "value": { "camera": "granted", "com.vendor.x": "denied" } }),
    );
    let permissions = PermissionModule::with_locator(locator);

    let status = permissions
        .check_status(PermissionName::BluetoothConnect)
        .await
        .unwrap();
    let statuses = permissions
        .request_multiple(["camera", "com.vendor.x"])
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(status, InvocationResult::Success(PermissionStatus::PermanentlyDenied));
    assert_eq!(*checks.lock().unwrap(), vec![vec![json!("bluetoothConnect")]]);
    assert_eq!(
        *multiple.lock().unwrap(),
        vec![vec![json!(["camera", "com.vendor.x"])]]
    );
    assert_eq!(statuses["camera"], PermissionStatus::Granted);
    assert_eq!(statuses["com.vendor.x"], PermissionStatus::Denied);
}

#[test]
fn test_ble_events_are_typed() {
    let (host, locator) = host_with_locator();
    let bus = ModuleEventBus::<BleEvents>::with_locator(locator);
    let states = Arc::new(Mutex::new(Vec::new()));
    let packets: Arc<Mutex<Vec<BleCharacteristicReceivedPayload>>> = Arc::default();

    let sink = Arc::clone(&states);
    bus.add_listener::<ConnectionStateChanged, _>(move |change| {
        sink.lock().unwrap().push(change.connection_state);
    });
    let sink = Arc::clone(&packets);
    bus.add_listener::<CharacteristicReceived, _>(move |packet| sink.lock().unwrap().push(packet));

    host.emit(
        "Ble",
        "connectionStateChanged",
        json!({ "deviceId": "AA:BB", "connectionState": "connected" }),
    );
    host.emit(
        "Ble",
        "characteristicReceived",
        json!({ "deviceId": "AA:BB", "serviceUuid": "180d", "characteristicUuid": "2a37", "value": [0, 72] }),
    );
    host.emit_event(
        "Ble",
        bridge_traits::ModuleEvent::without_detail("connectionStateChanged"),
    );

    assert_eq!(*states.lock().unwrap(), vec![BleConnectionState::Connected]);
    assert_eq!(packets.lock().unwrap()[0].value, vec![0, 72]);
    bus.dispose();
}

#[test]
fn test_theme_change_is_delivered_once_as_sent() {
    let (host, locator) = host_with_locator();
    let bus = ModuleEventBus::<ThemeEvents>::with_locator(locator);
    let changes: Arc<Mutex<Vec<ThemeChangePayload>>> = Arc::default();

    let sink = Arc::clone(&changes);
    bus.add_listener::<ThemeChange, _>(move |change| sink.lock().unwrap().push(change));
    assert!(host.emit("Theme", "themechange", json!({ "theme": "dark" })));

    let changes = changes.lock().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].theme, Some(ThemeMode::Dark));
    assert_eq!(serde_json::to_value(changes[0]).unwrap(), json!({ "theme": "dark" }));
    drop(changes);
    bus.dispose();
}
