#![cfg(target_arch = "wasm32")]
//! Integration tests for the WebF host adapter
//!
//! Each test installs a fake `webf` global written in JavaScript and talks to
//! it through `WebfGlobalLocator`, exactly as the bridge does at runtime.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use bridge_traits::host::{HostLocator, HostPrimitive, ModuleEvent};
use bridge_wasm::{locate_webf, WebfGlobalLocator};
use serde_json::json;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn run_js(body: &str) -> JsValue {
    js_sys::Function::new_no_args(body)
        .call0(&JsValue::NULL)
        .expect("script should run")
}

fn install_fake_webf() {
    run_js(
        r#"
        globalThis.webf = {
            listeners: {},
            invokeModuleAsync: async (module, method, ...args) => {
                if (method === 'explode') { throw new Error('bridge down'); }
                if (method === 'nothing') { return undefined; }
                return { type: 'ok', value: { module, method, args } };
            },
            addWebfModuleListener: (module, cb) => { globalThis.webf.listeners[module] = cb; },
            removeWebfModuleListener: (module) => { delete globalThis.webf.listeners[module]; },
        };
        "#,
    );
}

fn remove_fake_webf() {
    run_js("delete globalThis.webf;");
}

#[wasm_bindgen_test]
fn test_absent_host() {
    remove_fake_webf();
    assert!(locate_webf().is_none());
    assert!(WebfGlobalLocator.locate_host().is_none());
}

#[wasm_bindgen_test]
async fn test_invoke_round_trip() {
    install_fake_webf();
    let host = WebfGlobalLocator.locate_host().unwrap();
    assert!(host.supports(HostPrimitive::InvokeModuleAsync));

    let raw = host
        .invoke_module_async("Ble", "startScan", vec![json!({ "timeout": 5000 })])
        .await
        .unwrap();

    assert_eq!(
        raw,
        json!({
            "type": "ok",
            "value": { "module": "Ble", "method": "startScan", "args": [{ "timeout": 5000 }] }
        })
    );
    remove_fake_webf();
}

#[wasm_bindgen_test]
async fn test_undefined_response_is_null() {
    install_fake_webf();
    let host = WebfGlobalLocator.locate_host().unwrap();

    let raw = host.invoke_module_async("Ble", "nothing", vec![]).await.unwrap();
    assert_eq!(raw, serde_json::Value::Null);
    remove_fake_webf();
}

#[wasm_bindgen_test]
async fn test_rejection_is_a_transport_error() {
    install_fake_webf();
    let host = WebfGlobalLocator.locate_host().unwrap();

    let result = host.invoke_module_async("Ble", "explode", vec![]).await;
    let message = result.unwrap_err().to_string();
    assert!(message.contains("bridge down"));
    remove_fake_webf();
}

#[wasm_bindgen_test]
fn test_missing_primitive_is_reported() {
    run_js("globalThis.webf = {};");
    let host = WebfGlobalLocator.locate_host().unwrap();

    assert!(!host.supports(HostPrimitive::InvokeModuleAsync));
    assert!(!host.supports(HostPrimitive::AddModuleListener));
    remove_fake_webf();
}

#[wasm_bindgen_test]
fn test_listener_receives_module_events() {
    install_fake_webf();
    let host = WebfGlobalLocator.locate_host().unwrap();
    let received: Rc<RefCell<Vec<ModuleEvent>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);

    host.add_module_listener(
        "Theme",
        Arc::new(move |event: ModuleEvent| sink.borrow_mut().push(event)),
    )
    .unwrap();

    run_js(
        r#"
        const cb = globalThis.webf.listeners['Theme'];
        cb({ type: 'themechange', detail: { theme: 'dark' } }, undefined);
        cb({ type: 'themechange' }, undefined);
        "#,
    );

    assert_eq!(
        *received.borrow(),
        vec![
            ModuleEvent::new("themechange", json!({ "theme": "dark" })),
            ModuleEvent::without_detail("themechange"),
        ]
    );

    host.remove_module_listener("Theme").unwrap();
    let still_registered = run_js("return 'Theme' in globalThis.webf.listeners;");
    assert_eq!(still_registered.as_bool(), Some(false));
    remove_fake_webf();
}

#[wasm_bindgen_test]
fn test_same_webf_object_yields_same_host() {
    install_fake_webf();
    let first = WebfGlobalLocator.locate_host().unwrap();
    let second = WebfGlobalLocator.locate_host().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // a replaced global is a different host
    install_fake_webf();
    let third = WebfGlobalLocator.locate_host().unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    remove_fake_webf();
}
