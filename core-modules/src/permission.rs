//! Runtime permissions through the host's `PermissionHandler` module.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bridge_traits::host::HostLocator;
use core_bridge::{module_args, BridgeConfig, ModuleInvoker};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ModuleResult;

pub const MODULE_NAME: &str = "PermissionHandler";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    PermanentlyDenied,
    Restricted,
    Limited,
    Provisional,
}

impl PermissionStatus {
    /// Whether the app may use the feature, possibly in a reduced form.
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            PermissionStatus::Granted | PermissionStatus::Limited | PermissionStatus::Provisional
        )
    }
}

macro_rules! permission_names {
    ($($variant:ident => $wire:literal),+ $(,)?) => {
        /// Permission identifiers understood by the host.
        ///
        /// Names outside the known set are passed through as [`PermissionName::Other`].
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum PermissionName {
            $($variant,)+
            Other(String),
        }

        impl PermissionName {
            pub fn as_str(&self) -> &str {
                match self {
                    $(PermissionName::$variant => $wire,)+
                    PermissionName::Other(name) => name,
                }
            }
        }

        impl From<&str> for PermissionName {
            fn from(name: &str) -> Self {
                match name {
                    $($wire => PermissionName::$variant,)+
                    other => PermissionName::Other(other.to_string()),
                }
            }
        }
    };
}

permission_names! {
    Camera => "camera",
    Microphone => "microphone",
    Bluetooth => "bluetooth",
    BluetoothScan => "bluetoothScan",
    BluetoothConnect => "bluetoothConnect",
    BluetoothAdvertise => "bluetoothAdvertise",
    Location => "location",
    LocationWhenInUse => "locationWhenInUse",
    LocationAlways => "locationAlways",
    Notification => "notification",
    Photos => "photos",
    PhotosAddOnly => "photosAddOnly",
    Storage => "storage",
    ManageExternalStorage => "manageExternalStorage",
    Contacts => "contacts",
    CalendarFullAccess => "calendarFullAccess",
    CalendarWriteOnly => "calendarWriteOnly",
    Sms => "sms",
    Phone => "phone",
    MediaLibrary => "mediaLibrary",
    Speech => "speech",
    Sensors => "sensors",
    SensorsAlways => "sensorsAlways",
    IgnoreBatteryOptimizations => "ignoreBatteryOptimizations",
    ActivityRecognition => "activityRecognition",
    Reminders => "reminders",
    CriticalAlerts => "criticalAlerts",
    AppTrackingTransparency => "appTrackingTransparency",
    SystemAlertWindow => "systemAlertWindow",
    RequestInstallPackages => "requestInstallPackages",
    ScheduleExactAlarm => "scheduleExactAlarm",
    NearbyWifiDevices => "nearbyWifiDevices",
    Videos => "videos",
    Audio => "audio",
    AccessMediaLocation => "accessMediaLocation",
    AccessNotificationPolicy => "accessNotificationPolicy",
    Assistant => "assistant",
    BackgroundRefresh => "backgroundRefresh",
}

impl From<String> for PermissionName {
    fn from(name: String) -> Self {
        PermissionName::from(name.as_str())
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PermissionName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PermissionName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(PermissionName::from)
    }
}

/// Client for the host's `PermissionHandler` module.
#[derive(Debug, Clone)]
pub struct PermissionModule {
    invoker: ModuleInvoker,
}

impl Default for PermissionModule {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionModule {
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

    pub async fn check_status(
        &self,
        permission: impl Into<PermissionName>,
    ) -> ModuleResult<PermissionStatus> {
        let permission = permission.into();
        self.invoker
            .invoke("checkStatus", module_args![permission])
            .await
    }

    pub async fn request(
        &self,
        permission: impl Into<PermissionName>,
    ) -> ModuleResult<PermissionStatus> {
        let permission = permission.into();
        self.invoker.invoke("request", module_args![permission]).await
    }

    /// Request several permissions at once, keyed by permission name.
    pub async fn request_multiple<I>(
        &self,
        permissions: I,
    ) -> ModuleResult<HashMap<String, PermissionStatus>>
    where
        I: IntoIterator,
        I::Item: Into<PermissionName>,
    {
        let permissions: Vec<PermissionName> = permissions.into_iter().map(Into::into).collect();
        self.invoker
            .invoke("requestMultiple", module_args![permissions])
            .await
    }

    /// Open the platform's settings page for this app.
    pub async fn open_app_settings(&self) -> ModuleResult<bool> {
        self.invoker.invoke("openAppSettings", module_args![]).await
    }

    pub async fn should_show_request_rationale(
        &self,
        permission: impl Into<PermissionName>,
    ) -> ModuleResult<bool> {
        let permission = permission.into();
        self.invoker
            .invoke("shouldShowRequestRationale", module_args![permission])
            .await
    }
}

pub async fn check_status(permission: impl Into<PermissionName>) -> ModuleResult<PermissionStatus> {
    PermissionModule::new().check_status(permission).await
}

pub async fn request(permission: impl Into<PermissionName>) -> ModuleResult<PermissionStatus> {
    PermissionModule::new().request(permission).await
}

pub async fn request_multiple<I>(permissions: I) -> ModuleResult<HashMap<String, PermissionStatus>>
where
    I: IntoIterator,
    I::Item: Into<PermissionName>,
{
    PermissionModule::new().request_multiple(permissions).await
}

pub async fn open_app_settings() -> ModuleResult<bool> {
    PermissionModule::new().open_app_settings().await
}

pub async fn should_show_request_rationale(
    permission: impl Into<PermissionName>,
) -> ModuleResult<bool> {
    PermissionModule::new()
        .should_show_request_rationale(permission)
        .await
}
