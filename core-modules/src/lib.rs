//! # Core Modules
//!
//! Typed bindings for the host's native modules, built on `core-bridge`:
//!
//! | Module | Host name | Events |
//! |--------|-----------|--------|
//! | [`ble`] | `Ble` | `connectionStateChanged`, `characteristicReceived` |
//! | [`permission`] | `PermissionHandler` | - |
//! | [`theme`] | `Theme` | `themechange` |
//!
//! Every call returns [`ModuleResult`]: the outer `Result` carries transport
//! failures, the inner [`InvocationResult`] carries what the module answered.
//! Each module offers free functions using the platform's default host
//! locator, plus a client struct (`BleModule`, ...) for an explicit locator
//! or [`BridgeConfig`](core_bridge::BridgeConfig).

pub mod ble;
pub mod permission;
pub mod theme;

pub use core_bridge::InvocationResult;

/// Outcome of a typed module call.
pub type ModuleResult<T> = core_bridge::Result<InvocationResult<T>>;

pub use ble::{add_ble_listener, BleModule};
pub use permission::{PermissionModule, PermissionName, PermissionStatus};
pub use theme::{add_theme_change_listener, ThemeChangePayload, ThemeModule, ThemeState};
