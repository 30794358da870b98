//! # Bluetooth Low Energy
//!
//! Typed bindings for the host's `Ble` module: adapter control, scanning,
//! connections and GATT access, plus the module's connection and
//! notification events.
//!
//! ## Usage
//!
//! ```ignore
//! use core_modules::ble::{self, ScanOptions, ConnectionStateChanged};
//!
//! ble::start_scan(Some(ScanOptions {
//!     with_services: Some(vec!["180d".into()]),
//!     timeout: Some(15),
//!     ..Default::default()
//! }))
//! .await?;
//!
//! let subscription = ble::add_ble_listener::<ConnectionStateChanged, _>(|change| {
//!     tracing::info!(device = %change.device_id, state = ?change.connection_state, "BLE state");
//! });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bridge_traits::host::HostLocator;
use core_bridge::events::{MissingPayload, ModuleEventKind, ModuleEventMap, Subscription};
use core_bridge::{module_args, shared_event_bus, BridgeConfig, ModuleInvoker};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::ModuleResult;

/// Host module name.
pub const MODULE_NAME: &str = "Ble";

// ============================================================================
// Device and GATT types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertisementData {
    pub adv_name: String,
    pub tx_power_level: Option<i32>,
    pub appearance: Option<i32>,
    pub connectable: bool,
    /// Keyed by manufacturer id
    #[serde(default)]
    pub manufacturer_data: HashMap<String, Vec<u8>>,
    /// Keyed by service UUID
    #[serde(default)]
    pub service_data: HashMap<String, Vec<u8>>,
    #[serde(default)]
    pub service_uuids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub remote_id: String,
    pub rssi: i32,
    pub advertisement_data: AdvertisementData,
    #[serde(rename = "timestamp_ms")]
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BluetoothDevice {
    pub remote_id: String,
    pub platform_name: String,
    pub adv_name: String,
    pub is_connected: bool,
    pub mtu_now: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectReason {
    pub platform: String,
    pub code: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacteristicProperties {
    pub broadcast: bool,
    pub read: bool,
    pub write_without_response: bool,
    pub write: bool,
    pub notify: bool,
    pub indicate: bool,
    pub authenticated_signed_writes: bool,
    pub extended_properties: bool,
    pub notify_encryption_required: bool,
    pub indicate_encryption_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BluetoothDescriptor {
    pub uuid: String,
    pub remote_id: String,
    pub service_uuid: String,
    pub characteristic_uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_service_uuid: Option<String>,
    #[serde(default)]
    pub last_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BluetoothCharacteristic {
    pub uuid: String,
    pub remote_id: String,
    pub service_uuid: String,
    pub properties: CharacteristicProperties,
    #[serde(default)]
    pub descriptors: Vec<BluetoothDescriptor>,
    pub is_notifying: bool,
    #[serde(default)]
    pub last_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BluetoothService {
    pub uuid: String,
    pub remote_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_service_uuid: Option<String>,
    #[serde(default)]
    pub characteristics: Vec<BluetoothCharacteristic>,
}

// ============================================================================
// Call options
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MsdFilter {
    pub manufacturer_id: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDataFilter {
    pub service_uuid: String,
    pub data: Vec<u8>,
}

/// Android scan mode, sent as its integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum AndroidScanMode {
    Opportunistic = -1,
    LowPower = 0,
    Balanced = 1,
    LowLatency = 2,
}

impl TryFrom<i8> for AndroidScanMode {
    type Error = i8;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Opportunistic),
            0 => Ok(Self::LowPower),
            1 => Ok(Self::Balanced),
            2 => Ok(Self::LowLatency),
            other => Err(other),
        }
    }
}

impl Serialize for AndroidScanMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(*self as i8)
    }
}

impl<'de> Deserialize<'de> for AndroidScanMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i8::deserialize(deserializer)?;
        Self::try_from(raw)
            .map_err(|value| de::Error::custom(format!("unknown android scan mode {value}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_services: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_remote_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_msd: Option<Vec<MsdFilter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_service_data: Option<Vec<ServiceDataFilter>>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    /// Milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_if_gone: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuous_updates: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuous_divisor: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_by_one: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_legacy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_scan_mode: Option<AndroidScanMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_uses_fine_location: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_check_location_services: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_optional_services: Option<Vec<String>>,
}

/// Adapter options. Not taken by any call of the module yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_power_alert: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_state: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum License {
    Free,
    Commercial,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_connect: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_delay: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverServicesOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe_to_services_changed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadCharacteristicOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteCharacteristicOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub without_response: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_long_write: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyCharacteristicOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_indications: Option<bool>,
}

// ============================================================================
// Module calls
// ============================================================================

/// Client for the host's `Ble` module.
#[derive(Debug, Clone)]
pub struct BleModule {
    invoker: ModuleInvoker,
}

impl Default for BleModule {
    fn default() -> Self {
        Self::new()
    }
}

impl BleModule {
    pub fn new() -> Self {
        Self {
            invoker: ModuleInvoker::new(MODULE_NAME),
        }
    }

    pub fn with_locator(locator: Arc<dyn HostLocator>) -> Self {
        Self {
            invoker: ModuleInvoker::with_locator(MODULE_NAME, locator),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            invoker: ModuleInvoker::from_config(MODULE_NAME, config),
        }
    }

    pub async fn is_supported(&self) -> ModuleResult<bool> {
        self.invoker.invoke("isSupported", module_args![]).await
    }

    /// Adapter state as reported by the platform (e.g. "on", "off").
    pub async fn get_adapter_state(&self) -> ModuleResult<String> {
        self.invoker.invoke("getAdapterState", module_args![]).await
    }

    pub async fn get_scan_results(&self) -> ModuleResult<Vec<ScanResult>> {
        self.invoker.invoke("getScanResults", module_args![]).await
    }

    pub async fn is_scanning(&self) -> ModuleResult<bool> {
        self.invoker.invoke("isScanning", module_args![]).await
    }

    pub async fn get_connected_devices(&self) -> ModuleResult<Vec<BluetoothDevice>> {
        self.invoker.invoke("getConnectedDevices", module_args![]).await
    }

    pub async fn turn_on(&self) -> ModuleResult<()> {
        self.invoker.invoke("turnOn", module_args![]).await
    }

    pub async fn start_scan(&self, options: Option<ScanOptions>) -> ModuleResult<()> {
        self.invoker.invoke("startScan", module_args![options]).await
    }

    pub async fn stop_scan(&self) -> ModuleResult<()> {
        self.invoker.invoke("stopScan", module_args![]).await
    }

    pub async fn connect(&self, device_id: &str, options: Option<ConnectOptions>) -> ModuleResult<()> {
        self.invoker
            .invoke("connect", module_args![device_id, options])
            .await
    }

    pub async fn disconnect(
        &self,
        device_id: &str,
        options: Option<DisconnectOptions>,
    ) -> ModuleResult<()> {
        self.invoker
            .invoke("disconnect", module_args![device_id, options])
            .await
    }

    pub async fn discover_services(
        &self,
        device_id: &str,
        options: Option<DiscoverServicesOptions>,
    ) -> ModuleResult<Vec<BluetoothService>> {
        self.invoker
            .invoke("discoverServices", module_args![device_id, options])
            .await
    }

    /// Read a characteristic value as raw bytes.
    pub async fn read_characteristic(
        &self,
        device_id: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
        options: Option<ReadCharacteristicOptions>,
    ) -> ModuleResult<Vec<u8>> {
        let args = module_args![device_id, service_uuid, characteristic_uuid, options];
        self.invoker.invoke("readCharacteristic", args).await
    }

    pub async fn write_characteristic(
        &self,
        device_id: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
        data: &[u8],
        options: Option<WriteCharacteristicOptions>,
    ) -> ModuleResult<()> {
        let args = module_args![device_id, service_uuid, characteristic_uuid, data, options];
        self.invoker.invoke("writeCharacteristic", args).await
    }

    pub async fn set_notify_value(
        &self,
        device_id: &str,
        service_uuid: &str,
        characteristic_uuid: &str,
        enable: bool,
        options: Option<NotifyCharacteristicOptions>,
    ) -> ModuleResult<()> {
        let args = module_args![device_id, service_uuid, characteristic_uuid, enable, options];
        self.invoker.invoke("setNotifyValue", args).await
    }
}

pub async fn is_supported() -> ModuleResult<bool> {
    BleModule::new().is_supported().await
}

pub async fn get_adapter_state() -> ModuleResult<String> {
    BleModule::new().get_adapter_state().await
}

pub async fn get_scan_results() -> ModuleResult<Vec<ScanResult>> {
    BleModule::new().get_scan_results().await
}

pub async fn is_scanning() -> ModuleResult<bool> {
    BleModule::new().is_scanning().await
}

pub async fn get_connected_devices() -> ModuleResult<Vec<BluetoothDevice>> {
    BleModule::new().get_connected_devices().await
}

pub async fn turn_on() -> ModuleResult<()> {
    BleModule::new().turn_on().await
}

pub async fn start_scan(options: Option<ScanOptions>) -> ModuleResult<()> {
    BleModule::new().start_scan(options).await
}

pub async fn stop_scan() -> ModuleResult<()> {
    BleModule::new().stop_scan().await
}

pub async fn connect(device_id: &str, options: Option<ConnectOptions>) -> ModuleResult<()> {
    BleModule::new().connect(device_id, options).await
}

pub async fn disconnect(device_id: &str, options: Option<DisconnectOptions>) -> ModuleResult<()> {
    BleModule::new().disconnect(device_id, options).await
}

pub async fn discover_services(
    device_id: &str,
    options: Option<DiscoverServicesOptions>,
) -> ModuleResult<Vec<BluetoothService>> {
    BleModule::new().discover_services(device_id, options).await
}

pub async fn read_characteristic(
    device_id: &str,
    service_uuid: &str,
    characteristic_uuid: &str,
    options: Option<ReadCharacteristicOptions>,
) -> ModuleResult<Vec<u8>> {
    BleModule::new()
        .read_characteristic(device_id, service_uuid, characteristic_uuid, options)
        .await
}

pub async fn write_characteristic(
    device_id: &str,
    service_uuid: &str,
    characteristic_uuid: &str,
    data: &[u8],
    options: Option<WriteCharacteristicOptions>,
) -> ModuleResult<()> {
    BleModule::new()
        .write_characteristic(device_id, service_uuid, characteristic_uuid, data, options)
        .await
}

pub async fn set_notify_value(
    device_id: &str,
    service_uuid: &str,
    characteristic_uuid: &str,
    enable: bool,
    options: Option<NotifyCharacteristicOptions>,
) -> ModuleResult<()> {
    BleModule::new()
        .set_notify_value(device_id, service_uuid, characteristic_uuid, enable, options)
        .await
}

// ============================================================================
// Events
// ============================================================================

/// Event map of the `Ble` module.
#[derive(Debug)]
pub struct BleEvents;

impl ModuleEventMap for BleEvents {
    const MODULE_NAME: &'static str = MODULE_NAME;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BleConnectionState {
    Connected,
    Disconnected,
    Disconnecting,
}

impl fmt::Display for BleConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BleConnectionState::Connected => "connected",
            BleConnectionState::Disconnected => "disconnected",
            BleConnectionState::Disconnecting => "disconnecting",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BleConnectionStateChangedPayload {
    pub device_id: String,
    pub connection_state: BleConnectionState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BleCharacteristicReceivedPayload {
    pub device_id: String,
    pub service_uuid: String,
    pub characteristic_uuid: String,
    pub value: Vec<u8>,
}

/// `connectionStateChanged`
#[derive(Debug)]
pub struct ConnectionStateChanged;

impl ModuleEventKind<BleEvents> for ConnectionStateChanged {
    const EVENT_TYPE: &'static str = "connectionStateChanged";
    type Payload = BleConnectionStateChangedPayload;
    const MISSING_PAYLOAD: MissingPayload = MissingPayload::Ignore;
}

/// `characteristicReceived`
#[derive(Debug)]
pub struct CharacteristicReceived;

impl ModuleEventKind<BleEvents> for CharacteristicReceived {
    const EVENT_TYPE: &'static str = "characteristicReceived";
    type Payload = BleCharacteristicReceivedPayload;
    const MISSING_PAYLOAD: MissingPayload = MissingPayload::Ignore;
}

shared_event_bus!(
    /// Process-wide `Ble` event bus.
    pub fn ble_events() -> BleEvents
);

/// Subscribe to a `Ble` event on the process-wide bus.
pub fn add_ble_listener<K, F>(handler: F) -> Subscription
where
    K: ModuleEventKind<BleEvents> + 'static,
    F: Fn(K::Payload) + bridge_traits::PlatformSendSync + 'static,
{
    ble_events().add_listener::<K, F>(handler)
}
