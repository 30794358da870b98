//! # Core Bridge
//!
//! Generic plumbing between typed feature modules and the host's native
//! module bridge:
//! - Host discovery (`window.webf`, then `webf`)
//! - Request/response invocation with normalized results
//! - Per-module event buses with idempotent host (de)registration
//! - Configuration and logging
//!
//! ## Overview
//!
//! ```text
//!  typed call ──> ModuleInvoker ──> host.invokeModuleAsync ──> normalize ──> InvocationResult<T>
//!
//!  host event ──> ModuleEventBus (one host listener per module) ──> handlers for event.type
//! ```
//!
//! Feature modules (see `core-modules`) are thin typed layers over these two
//! primitives and never see raw host response shapes.

pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod invoker;
pub mod logging;
pub mod result;

pub use config::{BridgeConfig, DuplicateBusPolicy, HandlerPanicPolicy};
pub use error::{Error, Result};
pub use events::{
    MissingPayload, ModuleEventBus, ModuleEventKind, ModuleEventMap, ScopedEventBus, Subscription,
    SubscriptionGuard,
};
pub use host::{default_locator, locate_host};
pub use invoker::{create_invoker, ModuleInvoker};
pub use result::InvocationResult;

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
    pub use serde_json::Value;
}
