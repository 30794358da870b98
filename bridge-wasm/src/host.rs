//! `ModuleHost` backed by the WebF global object.
//!
//! # Host Requirements
//!
//! The page must expose a `webf` object, either as `window.webf` or as a
//! top-level `webf` global, with some or all of:
//!
//! - `invokeModuleAsync(moduleName, method, ...args) -> Promise<response>`
//! - `addWebfModuleListener(moduleName, (event, extra) => void)`
//! - `removeWebfModuleListener(moduleName)`
//!
//! Arguments and responses cross the boundary through `serde_wasm_bindgen`
//! in JSON-compatible mode, so maps arrive as plain objects.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::{
    error::Result as BridgeResult,
    host::{HostLocator, HostPrimitive, ModuleEvent, ModuleHost},
    platform::ModuleListener,
};
use js_sys::{Array, Function, Object, Promise, Reflect};
use serde::Serialize;
use serde_json::Value;
use serde_wasm_bindgen::{from_value, Serializer};
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::error::{WasmError, WasmResult};

type EventClosure = Closure<dyn FnMut(JsValue, JsValue)>;

thread_local! {
    // The host only keeps a JS reference; the Rust side of each callback must
    // outlive any `WebfHost` wrapper.
    static MODULE_CALLBACKS: RefCell<HashMap<String, EventClosure>> = RefCell::new(HashMap::new());

    // Wrapper handed out for the `webf` object seen last, so that repeated
    // lookups of the same object yield the same `Arc`.
    static LOCATED_HOST: RefCell<Option<Arc<WebfHost>>> = RefCell::new(None);
}

/// Thin wrapper around the `webf` object.
pub struct WebfHost {
    webf: JsValue,
}

impl WebfHost {
    /// Wrap a `webf` object obtained from [`locate_webf`] or elsewhere.
    pub fn new(webf: JsValue) -> Self {
        Self { webf }
    }

    fn primitive(&self, primitive: HostPrimitive) -> WasmResult<Function> {
        Reflect::get(&self.webf, &JsValue::from_str(primitive.js_name()))
            .ok()
            .and_then(|value| value.dyn_into::<Function>().ok())
            .ok_or_else(|| WasmError::NotAvailable(primitive.to_string()))
    }

    async fn invoke(&self, module_name: &str, method: &str, args: Vec<Value>) -> WasmResult<Value> {
        let invoke = self.primitive(HostPrimitive::InvokeModuleAsync)?;

        let call_args = Array::new();
        call_args.push(&JsValue::from_str(module_name));
        call_args.push(&JsValue::from_str(method));
        for arg in &args {
            call_args.push(&to_js(arg)?);
        }

        let returned = invoke.apply(&self.webf, &call_args)?;
        let resolved = JsFuture::from(Promise::resolve(&returned)).await?;

        if resolved.is_undefined() || resolved.is_null() {
            return Ok(Value::Null);
        }
        // Anything that is not JSON-shaped is left for the caller to reject.
        Ok(from_value(resolved).unwrap_or(Value::Null))
    }
}

#[async_trait::async_trait(?Send)]
impl ModuleHost for WebfHost {
    fn supports(&self, primitive: HostPrimitive) -> bool {
        self.primitive(primitive).is_ok()
    }

    async fn invoke_module_async(
        &self,
        module_name: &str,
        method: &str,
        args: Vec<Value>,
    ) -> BridgeResult<Value> {
        Ok(self.invoke(module_name, method, args).await?)
    }

    fn add_module_listener(&self, module_name: &str, listener: ModuleListener) -> BridgeResult<()> {
        let add = self.primitive(HostPrimitive::AddModuleListener)?;

        let callback: EventClosure = Closure::wrap(Box::new(move |event: JsValue, _extra: JsValue| {
            listener(module_event_from_js(&event));
        }) as Box<dyn FnMut(JsValue, JsValue)>);

        add.call2(&self.webf, &JsValue::from_str(module_name), callback.as_ref())
            .map_err(WasmError::from)?;

        debug!(module = module_name, "Attached webf module listener");
        MODULE_CALLBACKS.with(|callbacks| {
            callbacks.borrow_mut().insert(module_name.to_string(), callback);
        });
        Ok(())
    }

    fn remove_module_listener(&self, module_name: &str) -> BridgeResult<()> {
        let remove = self.primitive(HostPrimitive::RemoveModuleListener)?;
        let result = remove.call1(&self.webf, &JsValue::from_str(module_name));

        MODULE_CALLBACKS.with(|callbacks| {
            callbacks.borrow_mut().remove(module_name);
        });

        result.map_err(WasmError::from)?;
        debug!(module = module_name, "Detached webf module listener");
        Ok(())
    }
}

/// Locator probing `window.webf`, then the top-level `webf` global.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebfGlobalLocator;

impl HostLocator for WebfGlobalLocator {
    fn locate_host(&self) -> Option<Arc<dyn ModuleHost>> {
        let webf = locate_webf()?;
        let host = LOCATED_HOST.with(|located| {
            let mut located = located.borrow_mut();
            match located.as_ref() {
                Some(host) if Object::is(&host.webf, &webf) => Arc::clone(host),
                _ => {
                    let host = Arc::new(WebfHost::new(webf));
                    *located = Some(Arc::clone(&host));
                    host
                }
            }
        });
        Some(host as Arc<dyn ModuleHost>)
    }
}

/// Find the raw `webf` object, if the page exposes one.
pub fn locate_webf() -> Option<JsValue> {
    let global: JsValue = js_sys::global().into();
    if !global.is_object() {
        return None;
    }

    object_property(&global, "window")
        .and_then(|window| object_property(&window, "webf"))
        .or_else(|| object_property(&global, "webf"))
}

fn object_property(target: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .filter(|value| value.is_object() || value.is_function())
}

fn to_js(value: &Value) -> WasmResult<JsValue> {
    Ok(value.serialize(&Serializer::json_compatible())?)
}

fn module_event_from_js(event: &JsValue) -> ModuleEvent {
    if !event.is_object() {
        return ModuleEvent::default();
    }

    let event_type = Reflect::get(event, &JsValue::from_str("type"))
        .ok()
        .and_then(|value| value.as_string());
    let detail = Reflect::get(event, &JsValue::from_str("detail"))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
        .and_then(|value| match from_value::<Value>(value) {
            Ok(detail) => Some(detail),
            Err(err) => {
                warn!(error = %err, "Dropping non-JSON module event detail");
                None
            }
        });

    ModuleEvent { event_type, detail }
}
