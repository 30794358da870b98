//! Error types for the WebF host adapter

use thiserror::Error;
use wasm_bindgen::JsCast;

/// Result type for WebF host operations
pub type WasmResult<T> = Result<T, WasmError>;

/// Errors raised while talking to the `webf` global
#[derive(Error, Debug)]
pub enum WasmError {
    /// The host threw or rejected
    #[error("JavaScript error: {0}")]
    JavaScript(String),

    /// A primitive is missing from the host object
    #[error("{0} is not available")]
    NotAvailable(String),

    /// A value could not cross the JS/Rust boundary
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<WasmError> for bridge_traits::error::BridgeError {
    fn from(err: WasmError) -> Self {
        match err {
            WasmError::NotAvailable(primitive) => {
                bridge_traits::error::BridgeError::NotAvailable(primitive)
            }
            other => bridge_traits::error::BridgeError::OperationFailed(other.to_string()),
        }
    }
}

impl From<wasm_bindgen::JsValue> for WasmError {
    fn from(js_value: wasm_bindgen::JsValue) -> Self {
        let msg = if js_value.is_string() {
            js_value
                .as_string()
                .unwrap_or_else(|| "Unknown error".to_string())
        } else if let Some(error) = js_value.dyn_ref::<js_sys::Error>() {
            error.message().into()
        } else {
            format!("{:?}", js_value)
        };
        WasmError::JavaScript(msg)
    }
}

impl From<serde_wasm_bindgen::Error> for WasmError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        WasmError::Serialization(err.to_string())
    }
}
