//! WebAssembly Bridge Implementation
//!
//! This crate provides the WebF implementation of the bridge traits defined
//! in `bridge-traits`. It talks to the `webf` global the page exposes through
//! `js-sys` reflection and `wasm-bindgen` closures.
//!
//! # Platform Support
//!
//! This crate is designed exclusively for the `wasm32-unknown-unknown` target.
//! It will not compile for native targets.
//!
//! # Implementations
//!
//! - `WebfHost`: `ModuleHost` over the `webf` object
//! - `WebfGlobalLocator`: `HostLocator` probing `window.webf`, then `webf`
//!
//! # Examples
//!
//! ```ignore
//! use bridge_traits::host::{HostLocator, HostPrimitive};
//! use bridge_wasm::WebfGlobalLocator;
//!
//! if let Some(host) = WebfGlobalLocator.locate_host() {
//!     let raw = host.invoke_module_async("Theme", "getTheme", vec![]).await?;
//! }
//! ```

#![cfg(target_arch = "wasm32")]
#![warn(missing_docs)]

pub mod error;
pub mod host;

// Re-export commonly used types
pub use error::{WasmError, WasmResult};
pub use host::{locate_webf, WebfGlobalLocator, WebfHost};
