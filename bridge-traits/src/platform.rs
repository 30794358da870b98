//! Platform-specific helper abstractions used to keep trait bounds aligned with
//! the threading guarantees of each target.
//!
//! Native targets require `Send + Sync` so hosts and event buses can be shared
//! freely across threads. WebAssembly builds run on a single thread and hold
//! `JsValue` handles that cannot satisfy those bounds, so the helper traits
//! below make the required bounds conditional without duplicating every trait
//! definition.

use std::sync::Arc;

use crate::host::ModuleEvent;

/// Marker trait that applies `Send + Sync` on native targets while becoming a
/// no-op on `wasm32`.
#[cfg(not(target_arch = "wasm32"))]
pub trait PlatformSendSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<T> PlatformSendSync for T where T: Send + Sync {}

#[cfg(target_arch = "wasm32")]
pub trait PlatformSendSync {}

#[cfg(target_arch = "wasm32")]
impl<T> PlatformSendSync for T {}

/// Callback a host invokes for every event of the module it was registered for.
#[cfg(not(target_arch = "wasm32"))]
pub type ModuleListener = Arc<dyn Fn(ModuleEvent) + Send + Sync>;

#[cfg(target_arch = "wasm32")]
pub type ModuleListener = Arc<dyn Fn(ModuleEvent)>;
