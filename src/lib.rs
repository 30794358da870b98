//! Workspace facade crate.
//!
//! Host applications depend on `webfly-workspace` and pick a host backend
//! through features instead of wiring each crate individually:
//!
//! - `desktop-shims` (default): in-process host for native shells and tests
//! - `wasm`: the `webf` global backend for WebF pages

pub use bridge_traits;
pub use core_bridge;
pub use core_modules;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

#[cfg(feature = "wasm")]
pub use bridge_wasm;
