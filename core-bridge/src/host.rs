//! # Host Accessor
//!
//! Finds the host bridge in the ambient environment. Lookups are never
//! cached: the host may attach itself after this crate is loaded, or never.
//!
//! ## Probe order
//!
//! 1. `window.webf`
//! 2. top-level `webf`
//!
//! On `wasm32` the probe goes through the real JavaScript global object (see
//! `bridge_wasm::WebfGlobalLocator`). Native shells have no such object, so
//! they fill the same two slots of a process-wide ambient scope:
//!
//! ```ignore
//! use core_bridge::host::{install_host, HostSlot};
//! use std::sync::Arc;
//!
//! install_host(HostSlot::Window, Arc::new(bridge_desktop::InProcessHost::new()));
//! assert!(core_bridge::host::locate_host().is_some());
//! ```

use std::sync::Arc;

use bridge_traits::host::{HostLocator, ModuleHost};

/// The platform's default locator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHostLocator;

impl HostLocator for DefaultHostLocator {
    #[cfg(target_arch = "wasm32")]
    fn locate_host(&self) -> Option<Arc<dyn ModuleHost>> {
        bridge_wasm::WebfGlobalLocator.locate_host()
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn locate_host(&self) -> Option<Arc<dyn ModuleHost>> {
        ambient::probe()
    }
}

/// Locate the host with the platform's default locator.
///
/// Absence is a normal outcome, not an error.
pub fn locate_host() -> Option<Arc<dyn ModuleHost>> {
    DefaultHostLocator.locate_host()
}

/// The default locator as a shareable trait object.
pub fn default_locator() -> Arc<dyn HostLocator> {
    Arc::new(DefaultHostLocator)
}

#[cfg(not(target_arch = "wasm32"))]
pub use ambient::{install_host, remove_host, HostSlot};

#[cfg(not(target_arch = "wasm32"))]
mod ambient {
    use std::sync::{Arc, PoisonError, RwLock};

    use bridge_traits::host::ModuleHost;
    use tracing::debug;

    /// Well-known places a host can attach itself to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum HostSlot {
        /// Nested `window.webf`, probed first
        Window,
        /// Top-level `webf`
        Global,
    }

    struct AmbientScope {
        window: Option<Arc<dyn ModuleHost>>,
        global: Option<Arc<dyn ModuleHost>>,
    }

    impl AmbientScope {
        fn slot(&mut self, slot: HostSlot) -> &mut Option<Arc<dyn ModuleHost>> {
            match slot {
                HostSlot::Window => &mut self.window,
                HostSlot::Global => &mut self.global,
            }
        }
    }

    static AMBIENT_SCOPE: RwLock<AmbientScope> = RwLock::new(AmbientScope {
        window: None,
        global: None,
    });

    /// Attach `host` to `slot`, returning whatever was there before.
    pub fn install_host(slot: HostSlot, host: Arc<dyn ModuleHost>) -> Option<Arc<dyn ModuleHost>> {
        debug!(?slot, "Installing module host");
        let mut scope = AMBIENT_SCOPE.write().unwrap_or_else(PoisonError::into_inner);
        scope.slot(slot).replace(host)
    }

    /// Detach the host in `slot`.
    pub fn remove_host(slot: HostSlot) -> Option<Arc<dyn ModuleHost>> {
        debug!(?slot, "Removing module host");
        let mut scope = AMBIENT_SCOPE.write().unwrap_or_else(PoisonError::into_inner);
        scope.slot(slot).take()
    }

    pub(super) fn probe() -> Option<Arc<dyn ModuleHost>> {
        let scope = AMBIENT_SCOPE.read().unwrap_or_else(PoisonError::into_inner);
        scope.window.clone().or_else(|| scope.global.clone())
    }

}
