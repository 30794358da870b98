//! # Bridge Configuration
//!
//! Settings shared by module invokers and event buses.
//!
//! ## Overview
//!
//! The defaults reproduce the behavior of the plain WebF bindings: the host is
//! located through the platform's ambient scope, a panicking event handler is
//! logged and skipped, and a second bus claiming an already-claimed module
//! name wins with a warning. Everything can be overridden through
//! [`BridgeConfig::builder`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_bridge::config::{BridgeConfig, DuplicateBusPolicy};
//! use bridge_traits::StaticHostLocator;
//! use std::sync::Arc;
//!
//! let config = BridgeConfig::builder()
//!     .host_locator(Arc::new(StaticHostLocator::new(host)))
//!     .duplicate_bus_policy(DuplicateBusPolicy::Reject)
//!     .require_host(true)
//!     .build()
//!     .expect("host must be reachable");
//! ```
//!
//! ## Error Handling
//!
//! `require_host(true)` makes [`BridgeConfigBuilder::build`] fail fast with
//! [`Error::CapabilityMissing`] when no host is reachable at build time,
//! instead of every call degrading to a failure result later on.

use std::sync::Arc;

use bridge_traits::host::{HostLocator, HostPrimitive};

use crate::error::{Error, Result};
use crate::host::default_locator;

/// What happens when an event handler panics during dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerPanicPolicy {
    /// Log the panic at `error` level and keep dispatching to the other handlers.
    #[default]
    CatchAndLog,
    /// Let the panic unwind into the host's emission call.
    Propagate,
}

/// What happens when two buses attach to the same module name.
///
/// The host keeps a single listener per module, so the later attach silently
/// replaces the earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateBusPolicy {
    /// Attach anyway and log a warning; the last registration wins.
    #[default]
    Warn,
    /// Refuse to attach; the second bus stays unregistered.
    Reject,
}

/// Configuration for invokers and event buses.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Strategy used to find the host on every call
    pub host_locator: Arc<dyn HostLocator>,

    pub handler_panic_policy: HandlerPanicPolicy,

    pub duplicate_bus_policy: DuplicateBusPolicy,
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("host_locator", &"HostLocator { ... }")
            .field("handler_panic_policy", &self.handler_panic_policy)
            .field("duplicate_bus_policy", &self.duplicate_bus_policy)
            .finish()
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host_locator: default_locator(),
            handler_panic_policy: HandlerPanicPolicy::default(),
            duplicate_bus_policy: DuplicateBusPolicy::default(),
        }
    }
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Verify a host with at least one usable primitive is reachable right now.
    pub fn validate_host(&self) -> Result<()> {
        let host = self
            .host_locator
            .locate_host()
            .ok_or_else(host_missing_error)?;

        let primitives = [
            HostPrimitive::InvokeModuleAsync,
            HostPrimitive::AddModuleListener,
        ];
        if primitives.iter().any(|primitive| host.supports(*primitive)) {
            Ok(())
        } else {
            Err(Error::CapabilityMissing {
                capability: "ModuleHost".to_string(),
                message: format!(
                    "Host was found but exposes neither {} nor {}.",
                    HostPrimitive::InvokeModuleAsync,
                    HostPrimitive::AddModuleListener
                ),
            })
        }
    }
}

fn host_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "ModuleHost".to_string(),
        message: "No module host is reachable. \
                 WebF: make sure the page runs inside a WebF runtime exposing `webf`. \
                 Native: install a host with core_bridge::host::install_host \
                 or provide a custom HostLocator."
            .to_string(),
    }
}

/// Builder for [`BridgeConfig`].
#[derive(Default)]
pub struct BridgeConfigBuilder {
    host_locator: Option<Arc<dyn HostLocator>>,
    handler_panic_policy: Option<HandlerPanicPolicy>,
    duplicate_bus_policy: Option<DuplicateBusPolicy>,
    require_host: bool,
}

impl BridgeConfigBuilder {
    /// Replace the platform's default host locator.
    pub fn host_locator(mut self, locator: Arc<dyn HostLocator>) -> Self {
        self.host_locator = Some(locator);
        self
    }

    pub fn handler_panic_policy(mut self, policy: HandlerPanicPolicy) -> Self {
        self.handler_panic_policy = Some(policy);
        self
    }

    pub fn duplicate_bus_policy(mut self, policy: DuplicateBusPolicy) -> Self {
        self.duplicate_bus_policy = Some(policy);
        self
    }

    /// Fail [`build`](Self::build) when no host is reachable.
    pub fn require_host(mut self, required: bool) -> Self {
        self.require_host = required;
        self
    }

    pub fn build(self) -> Result<BridgeConfig> {
        let config = BridgeConfig {
            host_locator: self.host_locator.unwrap_or_else(default_locator),
            handler_panic_policy: self.handler_panic_policy.unwrap_or_default(),
            duplicate_bus_policy: self.duplicate_bus_policy.unwrap_or_default(),
        };

        if self.require_host {
            config.validate_host()?;
        }

        Ok(config)
    }
}
