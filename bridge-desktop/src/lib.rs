//! # Desktop Bridge Implementations
//!
//! Native implementations of the bridge traits for shells that embed the
//! module bridge without a WebF runtime (desktop apps, integration tests).
//!
//! ## Overview
//!
//! - `InProcessHost` implements `ModuleHost` with Rust handlers registered per
//!   `(module, method)` and synchronous event emission.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{HostReply, InProcessHost};
//! use std::sync::Arc;
//!
//! let host = Arc::new(InProcessHost::new());
//! host.register_method("Ble", "isSupported", |_args| async { HostReply::ok(true) });
//!
//! // Make it discoverable the same way the WebF global is.
//! core_bridge::host::install_host(core_bridge::host::HostSlot::Window, host.clone());
//! ```

mod in_process;

pub use in_process::{HostReply, InProcessHost, ListenerActivity};
