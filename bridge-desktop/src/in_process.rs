//! In-process module host
//!
//! Native shells have no WebF runtime, so modules are registered as Rust
//! handlers and events are emitted by calling [`InProcessHost::emit`]. The
//! host speaks the same tagged response protocol as WebF, which keeps the
//! normalization path in `core-bridge` identical on every platform.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    host::{HostPrimitive, ModuleEvent, ModuleHost},
    platform::ModuleListener,
};
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

type MethodHandler = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Builders for the tagged responses a module handler returns.
pub struct HostReply;

impl HostReply {
    /// `{ "type": "ok", "value": value }`
    pub fn ok<T: Serialize>(value: T) -> Result<Value> {
        Ok(json!({ "type": "ok", "value": serde_json::to_value(value)? }))
    }

    /// `{ "type": "err", "message": message }`
    pub fn err(message: impl Into<String>) -> Result<Value> {
        Ok(json!({ "type": "err", "message": message.into() }))
    }
}

/// Counters of host-level listener registrations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerActivity {
    pub added: usize,
    pub removed: usize,
}

/// In-process implementation of [`ModuleHost`].
///
/// # Example
///
/// ```ignore
/// use bridge_desktop::{HostReply, InProcessHost};
///
/// let host = InProcessHost::new();
/// host.register_method("Theme", "getSystemTheme", |_args| async { HostReply::ok("dark") });
/// host.emit("Theme", "themechange", serde_json::json!({ "theme": "dark" }));
/// ```
#[derive(Default)]
pub struct InProcessHost {
    methods: RwLock<HashMap<(String, String), MethodHandler>>,
    listeners: Mutex<HashMap<String, ModuleListener>>,
    activity: Mutex<HashMap<String, ListenerActivity>>,
    disabled: HashSet<HostPrimitive>,
}

impl InProcessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a host that does not expose `primitive`.
    pub fn without_primitive(mut self, primitive: HostPrimitive) -> Self {
        self.disabled.insert(primitive);
        self
    }

    /// Register the handler answering `module.method`.
    ///
    /// The handler returns the raw host response; use [`HostReply`] for the
    /// regular shapes. Returning `Err` simulates a transport failure.
    pub fn register_method<F, Fut>(&self, module: &str, method: &str, handler: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let handler: MethodHandler = Arc::new(move |args| Box::pin(handler(args)));
        self.methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((module.to_string(), method.to_string()), handler);
    }

    /// Emit a module event to the listener registered for `module`.
    ///
    /// Dispatch is synchronous. Returns `false` when no listener is attached.
    pub fn emit(&self, module: &str, event_type: &str, detail: Value) -> bool {
        self.emit_event(module, ModuleEvent::new(event_type, detail))
    }

    /// Emit a pre-built event, e.g. one without a `detail`.
    pub fn emit_event(&self, module: &str, event: ModuleEvent) -> bool {
        // Released before dispatch: listeners may detach themselves.
        let listener = self.listeners().get(module).cloned();

        match listener {
            Some(listener) => {
                trace!(module, event_type = ?event.event_type, "Dispatching module event");
                listener(event);
                true
            }
            None => {
                trace!(module, "No listener attached, dropping module event");
                false
            }
        }
    }

    /// Whether a host-level listener is attached for `module`.
    pub fn has_listener(&self, module: &str) -> bool {
        self.listeners().contains_key(module)
    }

    /// How often a listener for `module` was attached and detached.
    pub fn listener_activity(&self, module: &str) -> ListenerActivity {
        self.activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(module)
            .copied()
            .unwrap_or_default()
    }

    fn listeners(&self) -> MutexGuard<'_, HashMap<String, ModuleListener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, module: &str, update: impl FnOnce(&mut ListenerActivity)) {
        let mut activity = self.activity.lock().unwrap_or_else(PoisonError::into_inner);
        update(activity.entry(module.to_string()).or_default());
    }

    fn require(&self, primitive: HostPrimitive) -> Result<()> {
        if self.disabled.contains(&primitive) {
            return Err(BridgeError::NotAvailable(primitive.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ModuleHost for InProcessHost {
    fn supports(&self, primitive: HostPrimitive) -> bool {
        !self.disabled.contains(&primitive)
    }

    async fn invoke_module_async(
        &self,
        module_name: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        self.require(HostPrimitive::InvokeModuleAsync)?;

        let handler = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(module_name.to_string(), method.to_string()))
            .cloned();

        match handler {
            Some(handler) => {
                debug!(module = module_name, method, "Invoking in-process module method");
                handler(args).await
            }
            None => HostReply::err(format!("Method not found: {module_name}.{method}")),
        }
    }

    fn add_module_listener(&self, module_name: &str, listener: ModuleListener) -> Result<()> {
        self.require(HostPrimitive::AddModuleListener)?;
        self.listeners().insert(module_name.to_string(), listener);
        self.record(module_name, |activity| activity.added += 1);
        Ok(())
    }

    fn remove_module_listener(&self, module_name: &str) -> Result<()> {
        self.require(HostPrimitive::RemoveModuleListener)?;
        self.listeners().remove(module_name);
        self.record(module_name, |activity| activity.removed += 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_registered_method_receives_arguments() {
        let host = InProcessHost::new();
        host.register_method("Ble", "connect", |args| async move {
            HostReply::ok(args.len())
        });

        let raw = host
            .invoke_module_async("Ble", "connect", vec![json!("AA:BB"), Value::Null])
            .await
            .unwrap();

        assert_eq!(raw, json!({ "type": "ok", "value": 2 }));
    }

    #[tokio::test]
    async fn test_unknown_method_answers_with_error_shape() {
        let host = InProcessHost::new();

        let raw = host
            .invoke_module_async("Ble", "explode", vec![])
            .await
            .unwrap();

        assert_eq!(
            raw,
            json!({ "type": "err", "message": "Method not found: Ble.explode" })
        );
    }

    #[tokio::test]
    async fn test_handler_error_is_a_transport_failure() {
        let host = InProcessHost::new();
        host.register_method("Ble", "turnOn", |_| async {
            Err(BridgeError::OperationFailed("channel closed".into()))
        });

        let result = host.invoke_module_async("Ble", "turnOn", vec![]).await;
        assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
    }

    #[tokio::test]
    async fn test_disabled_invoke_primitive() {
        let host = InProcessHost::new().without_primitive(HostPrimitive::InvokeModuleAsync);

        assert!(!host.supports(HostPrimitive::InvokeModuleAsync));
        assert!(host.supports(HostPrimitive::AddModuleListener));
        let result = host.invoke_module_async("Ble", "turnOn", vec![]).await;
        assert!(matches!(result, Err(BridgeError::NotAvailable(_))));
    }

    #[test]
    fn test_emit_reaches_listener_and_counts_activity() {
        let host = InProcessHost::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        host.add_module_listener(
            "Theme",
            Arc::new(move |event: ModuleEvent| {
                assert_eq!(event.event_type.as_deref(), Some("themechange"));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        assert!(host.emit("Theme", "themechange", json!({ "theme": "dark" })));
        assert!(!host.emit("Ble", "connectionStateChanged", json!({})));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        host.remove_module_listener("Theme").unwrap();
        assert!(!host.has_listener("Theme"));
        assert!(!host.emit("Theme", "themechange", json!({ "theme": "light" })));
        assert_eq!(
            host.listener_activity("Theme"),
            ListenerActivity {
                added: 1,
                removed: 1
            }
        );
    }

    #[test]
    fn test_listener_may_detach_itself_during_dispatch() {
        let host = Arc::new(InProcessHost::new());
        let weak = Arc::downgrade(&host);

        host.add_module_listener(
            "Theme",
            Arc::new(move |_event: ModuleEvent| {
                if let Some(host) = weak.upgrade() {
                    host.remove_module_listener("Theme").unwrap();
                }
            }),
        )
        .unwrap();

        assert!(host.emit("Theme", "themechange", Value::Null));
        assert!(!host.has_listener("Theme"));
    }
}
