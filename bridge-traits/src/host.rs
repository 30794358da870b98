//! Module Host Abstraction
//!
//! The host is the surrounding runtime object that performs native module
//! invocation and emits module events. In a WebF page this is the `webf`
//! global; native shells provide an in-process equivalent.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::Result,
    platform::{ModuleListener, PlatformSendSync},
};

/// Generic primitives a host may expose.
///
/// Hosts are allowed to ship without any of them (for example an older
/// runtime without module events), so callers query [`ModuleHost::supports`]
/// before relying on one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostPrimitive {
    /// `invokeModuleAsync(moduleName, method, ...args)`
    InvokeModuleAsync,
    /// `addWebfModuleListener(moduleName, callback)`
    AddModuleListener,
    /// `removeWebfModuleListener(moduleName)`
    RemoveModuleListener,
}

impl HostPrimitive {
    /// Name of the primitive as exposed on the host object.
    pub fn js_name(&self) -> &'static str {
        match self {
            HostPrimitive::InvokeModuleAsync => "invokeModuleAsync",
            HostPrimitive::AddModuleListener => "addWebfModuleListener",
            HostPrimitive::RemoveModuleListener => "removeWebfModuleListener",
        }
    }
}

impl fmt::Display for HostPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.js_name())
    }
}

/// Generic module event as delivered by the host.
///
/// Both fields are optional on the wire: hosts have been observed to emit
/// events without a `detail`, and a missing `type` simply matches no handler.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleEvent {
    /// Event-type tag, e.g. `"themechange"`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Opaque payload; `None` when the host sent `undefined`/`null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl ModuleEvent {
    pub fn new(event_type: impl Into<String>, detail: Value) -> Self {
        Self {
            event_type: Some(event_type.into()),
            detail: match detail {
                Value::Null => None,
                other => Some(other),
            },
        }
    }

    pub fn without_detail(event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            detail: None,
        }
    }
}

/// Host bridge trait
///
/// Exposes the generic "invoke a native module method" and "listen to native
/// module events" primitives. Every typed feature module is layered on these
/// four calls.
///
/// # Contract
///
/// - `invoke_module_async` resolves with the raw tagged response
///   (`{ "type": "ok", "value": .. }` or `{ "type": "err", "message": .. }`).
///   Hosts are not trusted to respect that shape; normalization happens in
///   the caller. An `Err` means the call itself broke (transport failure).
/// - At most one listener per module name is held by the host. Registering a
///   second one replaces the first.
/// - `add_module_listener` and `remove_module_listener` must not dispatch
///   events synchronously.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::host::{HostPrimitive, ModuleHost};
///
/// async fn adapter_state(host: &dyn ModuleHost) -> Option<serde_json::Value> {
///     if !host.supports(HostPrimitive::InvokeModuleAsync) {
///         return None;
///     }
///     host.invoke_module_async("Ble", "getAdapterState", vec![]).await.ok()
/// }
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait ModuleHost: PlatformSendSync {
    /// Whether the host currently exposes `primitive`.
    fn supports(&self, primitive: HostPrimitive) -> bool;

    /// Invoke `method` on `module_name` and return the raw host response.
    ///
    /// A host response of `undefined` is reported as `Value::Null`.
    async fn invoke_module_async(
        &self,
        module_name: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value>;

    /// Attach the single host-level listener for `module_name`.
    fn add_module_listener(&self, module_name: &str, listener: ModuleListener) -> Result<()>;

    /// Detach the host-level listener for `module_name`, if any.
    fn remove_module_listener(&self, module_name: &str) -> Result<()>;
}

/// Locates the host in the ambient environment.
///
/// Implementations must not cache: the host may attach itself after the
/// locator is created, or disappear again.
pub trait HostLocator: PlatformSendSync {
    fn locate_host(&self) -> Option<Arc<dyn ModuleHost>>;
}

/// Locator that always yields the same handle (or none).
///
/// Useful for embedding a host that is known up front, and in tests.
#[derive(Clone, Default)]
pub struct StaticHostLocator {
    host: Option<Arc<dyn ModuleHost>>,
}

impl StaticHostLocator {
    pub fn new(host: Arc<dyn ModuleHost>) -> Self {
        Self { host: Some(host) }
    }

    /// A locator for an environment without any host.
    pub fn absent() -> Self {
        Self { host: None }
    }
}

impl HostLocator for StaticHostLocator {
    fn locate_host(&self) -> Option<Arc<dyn ModuleHost>> {
        self.host.clone()
    }
}

impl fmt::Debug for StaticHostLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticHostLocator")
            .field("host", &self.host.as_ref().map(|_| "ModuleHost { ... }"))
            .finish()
    }
}
