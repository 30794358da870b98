//! # Host Bridge Traits
//!
//! Contract between the typed module bridge and the runtime that hosts it.
//!
//! ## Overview
//!
//! Application code never talks to native modules directly. It goes through a
//! host object that exposes three generic primitives:
//!
//! - `invokeModuleAsync(moduleName, method, ...args)` - request/response
//! - `addWebfModuleListener(moduleName, callback)` - module event channel
//! - `removeWebfModuleListener(moduleName)` - channel teardown
//!
//! This crate models that object as the [`ModuleHost`](host::ModuleHost) trait
//! and its discovery as [`HostLocator`](host::HostLocator). Each host
//! environment ships an implementation:
//!
//! | Environment | Implementation Crate | Host |
//! |-------------|---------------------|------|
//! | WebF (wasm32) | `bridge-wasm`     | `window.webf` / `webf` global |
//! | Native shells | `bridge-desktop`  | `InProcessHost` |
//!
//! ## Error Handling
//!
//! Host calls report failures of the call itself through
//! [`BridgeError`](error::BridgeError). Protocol-level outcomes (a module
//! answering `{ "type": "err" }`) are regular values and are normalized by
//! `core-bridge`.
//!
//! ## Thread Safety
//!
//! Native implementations must be `Send + Sync`; on `wasm32` the bounds are
//! lifted through [`PlatformSendSync`](platform::PlatformSendSync) because
//! JavaScript handles are single-threaded.

pub mod error;
pub mod host;
pub mod platform;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use host::{HostLocator, HostPrimitive, ModuleEvent, ModuleHost, StaticHostLocator};
pub use platform::{ModuleListener, PlatformSendSync};
pub use time::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
